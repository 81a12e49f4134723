//! Error types for updraft-package.

use std::path::PathBuf;

use thiserror::Error;

use updraft_snapshot::SnapshotError;

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Missing or malformed metadata / snapshot entry.
    #[error("malformed package {path}: {reason}")]
    Format { path: PathBuf, reason: String },

    /// A requested baseline that cannot produce a forward package.
    #[error("unusable baseline {path}: {reason}")]
    Baseline { path: PathBuf, reason: String },

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("package JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> PackageError {
    PackageError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn format_err(path: impl Into<PathBuf>, reason: impl Into<String>) -> PackageError {
    PackageError::Format {
        path: path.into(),
        reason: reason.into(),
    }
}
