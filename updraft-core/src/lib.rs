//! updraft core library: domain types, installation layout, configuration,
//! version marker, errors.
//!
//! - [`types`]: relative paths, fingerprints, versions, snapshots, change sets
//! - [`paths`]: reserved directory and file names under an installation root
//! - [`config`]: `updraft.yaml` loading
//! - [`marker`]: the committed version marker file
//! - [`error`]: error enums shared by the other crates

pub mod config;
pub mod error;
pub mod marker;
pub mod paths;
pub mod types;

pub use config::UpdraftConfig;
pub use error::{ConfigError, MarkerError, PathError, VersionError};
pub use types::{
    BaseVersion, ChangeSet, Fingerprint, PackageMetadata, RelPath, Snapshot, Version,
};
