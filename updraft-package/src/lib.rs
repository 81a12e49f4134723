//! # updraft-package
//!
//! Builds update packages (zip archives carrying a change set's payload, the
//! new snapshot and a metadata document) and reads them back.
//!
//! [`builder::build`] writes a package from two snapshots;
//! [`archive::PackageArchive::open`] parses one and resolves the archive
//! names that are not payload.

pub mod archive;
pub mod builder;
pub mod error;

pub use archive::{ArchiveEntry, PackageArchive, ReservedNames};
pub use builder::{build, capture_and_build, BaselineChoice, BuiltPackage, PackageRun};
pub use error::PackageError;
