//! Error types for updraft-apply.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use updraft_core::{MarkerError, Version};
use updraft_package::PackageError;

/// A path could not be removed even after clearing restrictive permissions.
#[derive(Debug, Error)]
#[error("cannot remove {path}: {source}")]
pub struct RemovalError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Removal(#[from] RemovalError),
}

/// Applier phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ApplyPhase {
    Loading,
    Deleting,
    Extracting,
    RecreatingDirs,
    ReconcilingDependencies,
    CommittingVersion,
}

impl fmt::Display for ApplyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApplyPhase::Loading => "loading",
            ApplyPhase::Deleting => "deleting",
            ApplyPhase::Extracting => "extracting",
            ApplyPhase::RecreatingDirs => "recreating directories",
            ApplyPhase::ReconcilingDependencies => "reconciling dependencies",
            ApplyPhase::CommittingVersion => "committing version",
        };
        f.write_str(name)
    }
}

/// The underlying failure of an [`ApplyError`].
#[derive(Debug, Error)]
pub enum ApplyCause {
    #[error(transparent)]
    Package(#[from] PackageError),

    #[error(transparent)]
    Removal(#[from] RemovalError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Marker(#[from] MarkerError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A package failed to apply. `to_version` is `None` only when the package
/// could not be read far enough to know its target.
#[derive(Debug, Error)]
#[error("applying {} failed while {phase}: {cause}", target_label(.to_version))]
pub struct ApplyError {
    pub phase: ApplyPhase,
    pub to_version: Option<Version>,
    pub package: PathBuf,
    #[source]
    pub cause: ApplyCause,
}

fn target_label(to_version: &Option<Version>) -> String {
    match to_version {
        Some(v) => format!("update to {v}"),
        None => "update".to_string(),
    }
}

/// A transition feed line that could not be understood.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed transition on line {line} ({text:?}): {reason}")]
pub struct ChainResolutionError {
    pub line: usize,
    pub text: String,
    pub reason: String,
}

/// One dependency could not be installed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("installing {requirement} failed: {reason}")]
pub struct InstallError {
    pub requirement: String,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("download of {url} failed: {reason}")]
    Http { url: String, reason: String },
}

/// Why one chain step was abandoned.
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Apply(#[from] ApplyError),
}

/// Failures that stop the chain driver before any step is attempted.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Marker(#[from] MarkerError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
