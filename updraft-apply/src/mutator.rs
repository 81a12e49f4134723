//! Filesystem primitives used while applying a package.
//!
//! - [`force_remove`] deletes a file or a whole directory, clearing read-only
//!   permissions and retrying once if the first attempt fails.
//! - [`Extractor`] writes archive entries under a root, refusing any entry
//!   that would land outside it, is reserved, or sits inside a hidden
//!   directory. Files are always removed first and then written fresh.

use std::fs::{self, File};
use std::io::{self, ErrorKind, Read};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use updraft_core::paths::is_reserved_root_path;
use updraft_core::RelPath;
use updraft_package::ReservedNames;

use crate::error::{ExtractError, RemovalError};

// ---------------------------------------------------------------------------
// Removal
// ---------------------------------------------------------------------------

/// Remove `path` whatever it is. Returns `false` if nothing was there.
///
/// Symlinks are removed, never followed.
pub fn force_remove(path: &Path) -> Result<bool, RemovalError> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(source) => {
            return Err(RemovalError {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let first = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    let Err(first) = first else {
        return Ok(true);
    };

    tracing::debug!(path = %path.display(), error = %first, "removal failed; clearing read-only permissions");
    if meta.is_dir() {
        make_tree_writable(path);
    } else {
        make_writable(path);
        if let Some(parent) = path.parent() {
            make_writable(parent);
        }
    }

    let retry = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match retry {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(true),
        Err(source) => Err(RemovalError {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn make_tree_writable(root: &Path) {
    // Directories are yielded before their contents are read, so fixing a
    // directory's mode here makes its listing readable for the next step.
    for entry in WalkDir::new(root).follow_links(false).into_iter().flatten() {
        if !entry.file_type().is_symlink() {
            make_writable(entry.path());
        }
    }
}

#[cfg(unix)]
fn make_writable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    let Ok(meta) = fs::symlink_metadata(path) else { return };
    if meta.file_type().is_symlink() {
        return;
    }
    let extra = if meta.is_dir() { 0o700 } else { 0o200 };
    let mode = meta.permissions().mode();
    if mode & extra != extra {
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(mode | extra));
    }
}

#[cfg(not(unix))]
fn make_writable(path: &Path) {
    let Ok(meta) = fs::symlink_metadata(path) else { return };
    let mut perms = meta.permissions();
    if perms.readonly() {
        #[allow(clippy::permissions_set_readonly_false)]
        perms.set_readonly(false);
        let _ = fs::set_permissions(path, perms);
    }
}

// ---------------------------------------------------------------------------
// Containment
// ---------------------------------------------------------------------------

/// `true` if the nearest existing ancestor of `path` (or `path` itself)
/// resolves inside `canonical_root`. Catches symlinked directories that
/// point out of the tree.
pub(crate) fn resolves_within(canonical_root: &Path, path: &Path) -> io::Result<bool> {
    let mut cursor = Some(path);
    while let Some(candidate) = cursor {
        match fs::canonicalize(candidate) {
            Ok(resolved) => return Ok(resolved.starts_with(canonical_root)),
            Err(e) if e.kind() == ErrorKind::NotFound => cursor = candidate.parent(),
            Err(e) => return Err(e),
        }
    }
    Ok(false)
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Why an entry was not extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Metadata, embedded snapshot, or part of the installation layout
    /// (version marker, configuration, snapshot store, downloads).
    Reserved,
    /// Absolute, `..`-bearing, or otherwise unusable name.
    InvalidPath,
    /// Would resolve outside the root through a symlink.
    Escapes,
    /// Inside a directory whose name starts with a hidden prefix.
    Hidden,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SkipReason::Reserved => "reserved entry",
            SkipReason::InvalidPath => "invalid path",
            SkipReason::Escapes => "escapes root",
            SkipReason::Hidden => "hidden directory",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractOutcome {
    Written(RelPath),
    Directory(RelPath),
    Skipped { name: String, reason: SkipReason },
}

/// Extracts archive entries beneath one root.
#[derive(Debug)]
pub struct Extractor<'a> {
    root: PathBuf,
    canonical_root: PathBuf,
    reserved: &'a ReservedNames,
    hidden_prefixes: &'a [String],
}

impl<'a> Extractor<'a> {
    /// `root` must already exist.
    pub fn new(
        root: &Path,
        reserved: &'a ReservedNames,
        hidden_prefixes: &'a [String],
    ) -> Result<Self, ExtractError> {
        let canonical_root = fs::canonicalize(root).map_err(|source| ExtractError::Io {
            path: root.to_path_buf(),
            source,
        })?;
        Ok(Self {
            root: root.to_path_buf(),
            canonical_root,
            reserved,
            hidden_prefixes,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Extract one entry named `name` (as stored in the archive).
    ///
    /// Rejected entries are logged and reported as
    /// [`ExtractOutcome::Skipped`]; only filesystem failures are errors.
    pub fn extract(
        &self,
        name: &str,
        is_dir: bool,
        reader: &mut dyn Read,
    ) -> Result<ExtractOutcome, ExtractError> {
        let skip = |reason: SkipReason| {
            tracing::warn!(entry = %name, %reason, "skipping archive entry");
            Ok(ExtractOutcome::Skipped {
                name: name.to_string(),
                reason,
            })
        };

        if self.reserved.contains(name) {
            tracing::debug!(entry = %name, "reserved entry not extracted");
            return Ok(ExtractOutcome::Skipped {
                name: name.to_string(),
                reason: SkipReason::Reserved,
            });
        }

        let rel = match RelPath::new(name) {
            Ok(rel) => rel,
            Err(_) => return skip(SkipReason::InvalidPath),
        };
        if is_reserved_root_path(&rel) {
            return skip(SkipReason::Reserved);
        }
        if self.in_hidden_directory(&rel, is_dir) {
            return skip(SkipReason::Hidden);
        }

        let target = rel.to_path_under(&self.root);
        let parent = target.parent().unwrap_or(&self.root);
        if !self.contained(parent)? {
            return skip(SkipReason::Escapes);
        }

        if is_dir {
            self.ensure_dir(&target)?;
            return Ok(ExtractOutcome::Directory(rel));
        }

        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        // Re-check: creation may have walked through a symlink planted by
        // an earlier entry.
        if !self.contained(parent)? {
            return skip(SkipReason::Escapes);
        }

        force_remove(&target)?;
        let mut out = File::create(&target).map_err(|e| io_err(&target, e))?;
        io::copy(reader, &mut out).map_err(|e| io_err(&target, e))?;
        tracing::debug!(path = %rel, "extracted");
        Ok(ExtractOutcome::Written(rel))
    }

    /// Create `target` as a directory if it is not one already. A file in
    /// the way is removed first.
    pub fn ensure_dir(&self, target: &Path) -> Result<(), ExtractError> {
        match fs::symlink_metadata(target) {
            Ok(meta) if meta.is_dir() => return Ok(()),
            Ok(_) => {
                force_remove(target)?;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(io_err(target, e)),
        }
        fs::create_dir_all(target).map_err(|e| io_err(target, e))
    }

    /// `true` if `path` stays inside the root once symlinks are resolved.
    pub fn contained(&self, path: &Path) -> Result<bool, ExtractError> {
        resolves_within(&self.canonical_root, path).map_err(|e| io_err(path, e))
    }

    fn in_hidden_directory(&self, rel: &RelPath, is_dir: bool) -> bool {
        let segments: Vec<&str> = rel.segments().collect();
        let dirs = if is_dir {
            &segments[..]
        } else {
            &segments[..segments.len().saturating_sub(1)]
        };
        dirs.iter().any(|segment| {
            self.hidden_prefixes
                .iter()
                .any(|prefix| !prefix.is_empty() && segment.starts_with(prefix.as_str()))
        })
    }
}

fn io_err(path: &Path, source: io::Error) -> ExtractError {
    ExtractError::Io {
        path: path.to_path_buf(),
        source,
    }
}
