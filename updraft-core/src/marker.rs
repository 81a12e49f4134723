//! The committed version marker: a single line holding the installed version.
//!
//! Writes use the `.tmp` + rename pattern so a crash never leaves a truncated
//! marker behind.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::MarkerError;
use crate::paths::version_marker_at;
use crate::types::Version;

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> MarkerError {
    MarkerError::Io {
        path: path.into(),
        source,
    }
}

/// Read the marker under `root`. `Ok(None)` if it does not exist.
pub fn read_at(root: &Path) -> Result<Option<Version>, MarkerError> {
    let path = version_marker_at(root);
    let contents = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err(&path, e)),
    };
    contents
        .trim()
        .parse()
        .map(Some)
        .map_err(|source| MarkerError::Invalid { path, source })
}

/// Commit `version` as the installed version.
pub fn write_at(root: &Path, version: &Version) -> Result<(), MarkerError> {
    let path = version_marker_at(root);
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, format!("{version}\n")).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(&path, e));
    }
    Ok(())
}
