//! Error types for updraft-snapshot.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while capturing, storing or loading snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Unreadable file or directory during walk, hash or capture.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed snapshot document.
    #[error("malformed snapshot at {path}: {reason}")]
    Format { path: PathBuf, reason: String },

    /// An exclusion glob did not compile.
    #[error("invalid exclusion pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// The dependency lister could not produce a list.
    #[error("dependency listing failed: {0}")]
    Dependencies(String),

    #[error("snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience constructor for [`SnapshotError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SnapshotError {
    SnapshotError::Io {
        path: path.into(),
        source,
    }
}
