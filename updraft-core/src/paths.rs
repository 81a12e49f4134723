//! Reserved names under an installation root.
//!
//! ```text
//! <root>/
//!   version                  (committed version marker)
//!   updraft.yaml             (optional configuration)
//!   _snapshots/              (one JSON document per captured snapshot)
//!   _snapshots_backup/       (copies of overwritten snapshot documents)
//!   _update_ver/             (built packages)
//!   _downloads/              (packages fetched by the chain driver)
//! ```
//!
//! All helpers are pure: nothing here touches the filesystem.

use std::path::{Path, PathBuf};

use crate::types::{RelPath, Version};

pub const VERSION_MARKER: &str = "version";
pub const CONFIG_FILE: &str = "updraft.yaml";
pub const SNAPSHOT_DIR: &str = "_snapshots";
pub const SNAPSHOT_BACKUP_DIR: &str = "_snapshots_backup";
pub const PACKAGE_DIR: &str = "_update_ver";
pub const DOWNLOAD_DIR: &str = "_downloads";

/// Archive entry holding the package metadata document.
pub const METADATA_ENTRY: &str = "update_metadata.json";

const SNAPSHOT_PREFIX: &str = "snapshot_";
const SNAPSHOT_SUFFIX: &str = ".json";

/// Top-level names that are never part of a snapshot.
pub const RESERVED_ROOT_ENTRIES: [&str; 6] = [
    VERSION_MARKER,
    CONFIG_FILE,
    SNAPSHOT_DIR,
    SNAPSHOT_BACKUP_DIR,
    PACKAGE_DIR,
    DOWNLOAD_DIR,
];

/// `true` if `rel` is one of [`RESERVED_ROOT_ENTRIES`] or lies beneath one.
pub fn is_reserved_root_path(rel: &RelPath) -> bool {
    rel.segments()
        .next()
        .is_some_and(|first| RESERVED_ROOT_ENTRIES.contains(&first))
}

pub fn version_marker_at(root: &Path) -> PathBuf {
    root.join(VERSION_MARKER)
}

pub fn config_path_at(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn snapshot_dir_at(root: &Path) -> PathBuf {
    root.join(SNAPSHOT_DIR)
}

pub fn snapshot_backup_dir_at(root: &Path) -> PathBuf {
    root.join(SNAPSHOT_BACKUP_DIR)
}

pub fn package_dir_at(root: &Path) -> PathBuf {
    root.join(PACKAGE_DIR)
}

pub fn download_dir_at(root: &Path) -> PathBuf {
    root.join(DOWNLOAD_DIR)
}

/// `snapshot_<version>_<unix_ts>.json`
pub fn snapshot_file_name(version: &Version, unix_ts: i64) -> String {
    format!("{SNAPSHOT_PREFIX}{version}_{unix_ts}{SNAPSHOT_SUFFIX}")
}

/// `snapshot_<version>_<unix_ts>_backup.json`
pub fn snapshot_backup_name(version: &Version, unix_ts: i64) -> String {
    format!("{SNAPSHOT_PREFIX}{version}_{unix_ts}_backup{SNAPSHOT_SUFFIX}")
}

/// `true` for a top-level archive entry or file name shaped like a snapshot
/// document.
pub fn is_snapshot_name(name: &str) -> bool {
    !name.contains('/')
        && name.len() > SNAPSHOT_PREFIX.len() + SNAPSHOT_SUFFIX.len()
        && name.starts_with(SNAPSHOT_PREFIX)
        && name.ends_with(SNAPSHOT_SUFFIX)
}

/// `update_<to_version>_<full|delta>_<unix_ts>.zip`
pub fn package_file_name(to_version: &Version, full: bool, unix_ts: i64) -> String {
    let kind = if full { "full" } else { "delta" };
    format!("update_{to_version}_{kind}_{unix_ts}.zip")
}
