//! # updraft-apply
//!
//! Applies update packages to an installation root and drives chains of
//! them.
//!
//! - [`mutator`]: force-removal and path-checked extraction
//! - [`applier`]: the per-package phase sequence, ending in a version commit
//! - [`chain`]: transition feeds and chain resolution
//! - [`driver`]: fetch + apply each resolved step under a [`RetryPolicy`]

pub mod applier;
pub mod chain;
pub mod dependencies;
pub mod driver;
pub mod error;
pub mod fetch;
pub mod mutator;
pub mod retry;

pub use applier::{ApplyReport, Applier, SkippedEntry};
pub use chain::{resolve, Transition, TransitionMap};
pub use dependencies::{
    CommandInstaller, DependencyInstaller, InstallReport, NoopInstaller,
};
pub use driver::{feed_base, ChainDriver, ChainReport, StepFailure};
pub use error::{
    ApplyCause, ApplyError, ApplyPhase, ChainResolutionError, DriverError, ExtractError,
    FetchError, InstallError, RemovalError, StepError,
};
pub use fetch::{is_remote, HttpFetcher, LocalFetcher, LocationFetcher, PackageFetcher};
pub use mutator::{force_remove, ExtractOutcome, Extractor, SkipReason};
pub use retry::RetryPolicy;
