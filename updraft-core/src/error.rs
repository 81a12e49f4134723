//! Error types for updraft-core.

use std::path::PathBuf;

use thiserror::Error;

/// A string could not be accepted as a tree-relative path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("relative path is empty")]
    Empty,

    #[error("path '{0}' is absolute")]
    Absolute(String),

    #[error("path '{0}' escapes the tree root")]
    Escapes(String),

    #[error("path '{0}' is not valid UTF-8")]
    NonUtf8(String),

    #[error("path '{0}' contains a backslash")]
    Backslash(String),

    #[error("path '{0}' contains a NUL byte")]
    Nul(String),
}

/// A version string is not a dotted sequence of non-negative integers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid version '{raw}': expected dotted integers such as 1.4.2")]
pub struct VersionError {
    pub raw: String,
}

/// Errors loading `updraft.yaml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load, with serde_yaml's line context.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Errors reading or committing the version marker.
#[derive(Debug, Error)]
pub enum MarkerError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("version marker at {path} is unreadable: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: VersionError,
    },
}
