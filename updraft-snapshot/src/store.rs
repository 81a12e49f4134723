//! Snapshot store: capture, persist, list and load snapshot documents.
//!
//! Documents live at `<root>/_snapshots/snapshot_<version>_<unix_ts>.json`.
//! Writes use the `.tmp` + rename pattern; a document that would be
//! overwritten is first copied into `<root>/_snapshots_backup/`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use updraft_core::paths::{
    is_snapshot_name, snapshot_backup_dir_at, snapshot_backup_name, snapshot_dir_at,
    snapshot_file_name,
};
use updraft_core::{Snapshot, Version};

use crate::dependencies::DependencyLister;
use crate::error::{io_err, SnapshotError};
use crate::hasher::fingerprint_file;
use crate::walker::{walk, ExclusionPolicy};

// ---------------------------------------------------------------------------
// Capture
// ---------------------------------------------------------------------------

/// Fingerprint every non-excluded file under `root` and record every
/// non-excluded directory.
///
/// All or nothing: the first unreadable path aborts the capture.
pub fn capture(
    root: &Path,
    version: &Version,
    policy: &ExclusionPolicy,
    lister: &dyn DependencyLister,
) -> Result<Snapshot, SnapshotError> {
    let meta = std::fs::metadata(root).map_err(|e| io_err(root, e))?;
    if !meta.is_dir() {
        return Err(io_err(
            root,
            std::io::Error::other("snapshot root is not a directory"),
        ));
    }

    let mut snapshot = Snapshot::new(version.clone());
    for entry in walk(root, policy) {
        let entry = entry?;
        if entry.is_dir {
            snapshot.directories.insert(entry.rel);
        } else {
            let fingerprint = fingerprint_file(&entry.path)?;
            snapshot.files.insert(entry.rel, fingerprint);
        }
    }
    snapshot.dependencies = lister.list()?;

    tracing::info!(
        version = %version,
        files = snapshot.files.len(),
        directories = snapshot.directories.len(),
        dependencies = snapshot.dependencies.len(),
        "captured snapshot"
    );
    Ok(snapshot)
}

// ---------------------------------------------------------------------------
// Persist
// ---------------------------------------------------------------------------

/// Write `snapshot` into the store under `root`, returning its location.
pub fn persist_at(root: &Path, snapshot: &Snapshot) -> Result<PathBuf, SnapshotError> {
    let dir = snapshot_dir_at(root);
    std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;

    let path = dir.join(snapshot_file_name(
        &snapshot.version,
        snapshot.timestamp.timestamp(),
    ));
    if path.exists() {
        backup_existing(root, &path, &snapshot.version)?;
    }

    let json = serde_json::to_string_pretty(snapshot)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(&path, e));
    }

    tracing::info!(path = %path.display(), "persisted snapshot");
    Ok(path)
}

fn backup_existing(root: &Path, existing: &Path, version: &Version) -> Result<(), SnapshotError> {
    let backup_dir = snapshot_backup_dir_at(root);
    std::fs::create_dir_all(&backup_dir).map_err(|e| io_err(&backup_dir, e))?;

    let mut stamp = Utc::now().timestamp();
    let mut backup = backup_dir.join(snapshot_backup_name(version, stamp));
    while backup.exists() {
        stamp += 1;
        backup = backup_dir.join(snapshot_backup_name(version, stamp));
    }
    std::fs::copy(existing, &backup).map_err(|e| io_err(&backup, e))?;
    tracing::info!(from = %existing.display(), to = %backup.display(), "backed up existing snapshot");
    Ok(())
}

// ---------------------------------------------------------------------------
// Load / list
// ---------------------------------------------------------------------------

/// Load one snapshot document.
pub fn load(path: &Path) -> Result<Snapshot, SnapshotError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_json::from_str(&contents).map_err(|e| SnapshotError::Format {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// A persisted snapshot as seen by [`list_at`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub path: PathBuf,
    pub version: Version,
    pub timestamp: DateTime<Utc>,
}

/// Every readable snapshot under `root`, newest first.
///
/// Unreadable or corrupt documents are skipped with a warning.
pub fn list_at(root: &Path) -> Result<Vec<SnapshotEntry>, SnapshotError> {
    Ok(scan(root)?.into_iter().map(|(entry, _)| entry).collect())
}

fn scan(root: &Path) -> Result<Vec<(SnapshotEntry, Snapshot)>, SnapshotError> {
    let dir = snapshot_dir_at(root);
    let read_dir = match std::fs::read_dir(&dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_err(&dir, e)),
    };

    let mut found = Vec::new();
    for dir_entry in read_dir.filter_map(|e| e.ok()) {
        let name = dir_entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !is_snapshot_name(name) {
            continue;
        }
        let path = dir_entry.path();
        match load(&path) {
            Ok(snapshot) => found.push((
                SnapshotEntry {
                    path,
                    version: snapshot.version.clone(),
                    timestamp: snapshot.timestamp,
                },
                snapshot,
            )),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping unreadable snapshot");
            }
        }
    }

    found.sort_by(|(a, _), (b, _)| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| b.path.cmp(&a.path))
    });
    Ok(found)
}

/// Pick the diff baseline for a new capture of `new_version`.
///
/// The newest snapshot of the greatest version strictly below `new_version`.
/// Snapshots at or above `new_version` would yield a package that does not
/// advance, so they are never chosen. `exclude` names a document that must
/// not be chosen, typically the one just persisted.
pub fn latest_baseline_at(
    root: &Path,
    new_version: &Version,
    exclude: Option<&Path>,
) -> Result<Option<(SnapshotEntry, Snapshot)>, SnapshotError> {
    // Candidates are newest first; strict `>` keeps the newest among equals.
    let mut best: Option<(SnapshotEntry, Snapshot)> = None;
    for candidate in scan(root)? {
        if exclude == Some(candidate.0.path.as_path()) || &candidate.0.version >= new_version {
            continue;
        }
        let better = match &best {
            None => true,
            Some((current, _)) => candidate.0.version > current.version,
        };
        if better {
            best = Some(candidate);
        }
    }
    Ok(best)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
