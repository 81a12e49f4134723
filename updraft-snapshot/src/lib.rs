//! # updraft-snapshot
//!
//! Content hashing, tree walking with exclusions, snapshot persistence and
//! snapshot diffing.
//!
//! Call [`store::capture`] to fingerprint a tree, [`store::persist_at`] to
//! record it under `_snapshots/`, and [`diff::diff`] to compare two
//! snapshots.

pub mod dependencies;
pub mod diff;
pub mod error;
pub mod hasher;
pub mod store;
pub mod walker;

pub use dependencies::{CommandLister, DependencyLister, NoDependencies, StaticDependencies};
pub use diff::{diff, diff_full, diff_with_mode, DiffMode};
pub use error::SnapshotError;
pub use store::{capture, SnapshotEntry};
pub use walker::{walk, ExclusionPolicy, WalkEntry};
