//! Getting packages and feeds onto local disk.
//!
//! Downloads land in `<dest>.part` and are renamed to `dest` only once the
//! whole body has been written, so an interrupted fetch never leaves a
//! truncated package where the applier would pick it up.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::FetchError;

/// Copies or downloads the package at `location` to `dest`.
pub trait PackageFetcher {
    fn fetch(&self, location: &str, dest: &Path) -> Result<(), FetchError>;
}

pub fn is_remote(location: &str) -> bool {
    let lower = location.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Reads from the local filesystem; relative locations resolve against
/// `base`.
#[derive(Debug, Clone)]
pub struct LocalFetcher {
    base: PathBuf,
}

impl LocalFetcher {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn resolve(&self, location: &str) -> PathBuf {
        let path = Path::new(location);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base.join(path)
        }
    }

    pub fn read_text(&self, location: &str) -> Result<String, FetchError> {
        let path = self.resolve(location);
        fs::read_to_string(&path).map_err(|source| FetchError::Io { path, source })
    }
}

impl PackageFetcher for LocalFetcher {
    fn fetch(&self, location: &str, dest: &Path) -> Result<(), FetchError> {
        let source = self.resolve(location);
        let file = File::open(&source).map_err(|e| FetchError::Io {
            path: source.clone(),
            source: e,
        })?;
        write_then_rename(file, dest)
    }
}

/// Downloads over HTTP(S). The timeout covers the whole request.
#[derive(Clone)]
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl std::fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher").finish_non_exhaustive()
    }
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    fn get(&self, url: &str) -> Result<impl Read + Send, FetchError> {
        tracing::debug!(%url, "GET");
        let response = self.agent.get(url).call().map_err(|e| FetchError::Http {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(response.into_reader())
    }

    pub fn read_text(&self, url: &str) -> Result<String, FetchError> {
        let mut body = String::new();
        self.get(url)?
            .read_to_string(&mut body)
            .map_err(|e| FetchError::Http {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(body)
    }
}

impl PackageFetcher for HttpFetcher {
    fn fetch(&self, location: &str, dest: &Path) -> Result<(), FetchError> {
        let body = self.get(location)?;
        write_then_rename(body, dest)
    }
}

/// Dispatches on the location: URLs go to [`HttpFetcher`], everything else
/// to [`LocalFetcher`].
#[derive(Debug, Clone)]
pub struct LocationFetcher {
    pub local: LocalFetcher,
    pub http: HttpFetcher,
}

impl LocationFetcher {
    pub fn new(base: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            local: LocalFetcher::new(base),
            http: HttpFetcher::new(timeout),
        }
    }

    /// Read a transition feed.
    pub fn read_text(&self, location: &str) -> Result<String, FetchError> {
        if is_remote(location) {
            self.http.read_text(location)
        } else {
            self.local.read_text(location)
        }
    }
}

impl PackageFetcher for LocationFetcher {
    fn fetch(&self, location: &str, dest: &Path) -> Result<(), FetchError> {
        if is_remote(location) {
            self.http.fetch(location, dest)
        } else {
            self.local.fetch(location, dest)
        }
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

fn write_then_rename(mut body: impl Read, dest: &Path) -> Result<(), FetchError> {
    let io_err = |path: &Path, source: io::Error| FetchError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let part = part_path(dest);
    let copied = File::create(&part)
        .and_then(|mut out| io::copy(&mut body, &mut out).and_then(|n| out.sync_all().map(|_| n)));
    let bytes = match copied {
        Ok(n) => n,
        Err(e) => {
            let _ = fs::remove_file(&part);
            return Err(io_err(&part, e));
        }
    };
    fs::rename(&part, dest).map_err(|e| {
        let _ = fs::remove_file(&part);
        io_err(dest, e)
    })?;
    tracing::info!(dest = %dest.display(), bytes, "fetched package");
    Ok(())
}
