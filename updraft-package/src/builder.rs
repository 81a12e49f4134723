//! Package builder.
//!
//! Archive layout:
//!
//! ```text
//! update_metadata.json            PackageMetadata
//! snapshot_<ver>_<ts>.json        the new Snapshot
//! <dir>/                          one entry per added directory
//! <path>                          one entry per added or modified file
//! ```
//!
//! The archive is written to `<name>.zip.tmp` and renamed into place once
//! finished, so a half-written package is never visible under its final name.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use updraft_core::paths::{package_dir_at, package_file_name, snapshot_file_name, METADATA_ENTRY};
use updraft_core::{BaseVersion, PackageMetadata, RelPath, Snapshot, Version};
use updraft_snapshot::store::{self, capture, latest_baseline_at, persist_at, SnapshotEntry};
use updraft_snapshot::{diff_with_mode, DependencyLister, DiffMode, ExclusionPolicy};

use crate::archive::ReservedNames;
use crate::error::{io_err, PackageError};

/// A package written to disk.
#[derive(Debug, Clone)]
pub struct BuiltPackage {
    pub path: PathBuf,
    pub metadata: PackageMetadata,
}

impl BuiltPackage {
    /// Payload files that made it into the archive.
    pub fn embedded_count(&self) -> usize {
        self.metadata.change_set.payload_paths().count() - self.metadata.omitted_files.len()
    }
}

/// Build a package bringing a tree from `old` to `new` and write it into
/// `out_dir`.
///
/// Payload bytes are read from `root`. A payload file that can no longer be
/// opened is logged, left out of the archive and listed in
/// `omitted_files`; the package is then knowingly incomplete for that path.
pub fn build(
    root: &Path,
    old: Option<&Snapshot>,
    new: &Snapshot,
    full: bool,
    out_dir: &Path,
) -> Result<BuiltPackage, PackageError> {
    let mode = if full { DiffMode::Full } else { DiffMode::Incremental };
    let change_set = diff_with_mode(old, new, mode);
    let from_version = match old {
        Some(old) if !full => BaseVersion::Exact(old.version.clone()),
        _ => BaseVersion::Any,
    };

    let created = Utc::now();
    let snapshot_entry = snapshot_file_name(&new.version, new.timestamp.timestamp());
    let reserved = ReservedNames::new(Some(snapshot_entry.as_str()));

    std::fs::create_dir_all(out_dir).map_err(|e| io_err(out_dir, e))?;
    let path = out_dir.join(package_file_name(
        &new.version,
        full,
        created.timestamp(),
    ));
    let tmp = path.with_extension("zip.tmp");

    let file = File::create(&tmp).map_err(|e| io_err(&tmp, e))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let written = (|| -> Result<Vec<RelPath>, PackageError> {
        for dir in &change_set.added_dirs {
            zip.add_directory(format!("{dir}/"), options)?;
        }

        let mut omitted = Vec::new();
        for rel in change_set.payload_paths() {
            if reserved.contains(rel.as_str()) {
                tracing::warn!(path = %rel, "payload path collides with a reserved archive name; omitted");
                omitted.push(rel.clone());
                continue;
            }
            let source = rel.to_path_under(root);
            let mut input = match File::open(&source) {
                Ok(f) => f,
                Err(err) => {
                    tracing::warn!(path = %rel, error = %err, "payload file vanished since capture; omitted");
                    omitted.push(rel.clone());
                    continue;
                }
            };
            zip.start_file(rel.as_str(), options)?;
            io::copy(&mut input, &mut zip).map_err(|e| io_err(&source, e))?;
        }

        zip.start_file(snapshot_entry.as_str(), options)?;
        zip.write_all(&serde_json::to_vec_pretty(new)?)
            .map_err(|e| io_err(&tmp, e))?;
        Ok(omitted)
    })();

    let omitted = match written {
        Ok(omitted) => omitted,
        Err(err) => {
            drop(zip);
            let _ = std::fs::remove_file(&tmp);
            return Err(err);
        }
    };

    let metadata = PackageMetadata {
        from_version,
        to_version: new.version.clone(),
        timestamp: created,
        full,
        snapshot_entry: Some(snapshot_entry),
        change_set,
        old_dependencies: old.map(|s| s.dependencies.clone()).unwrap_or_default(),
        new_dependencies: new.dependencies.clone(),
        omitted_files: omitted,
    };

    let finished = (|| -> Result<(), PackageError> {
        zip.start_file(METADATA_ENTRY, options)?;
        zip.write_all(&serde_json::to_vec_pretty(&metadata)?)
            .map_err(|e| io_err(&tmp, e))?;
        let mut out = zip.finish()?;
        out.flush().map_err(|e| io_err(&tmp, e))?;
        Ok(())
    })();
    if let Err(err) = finished {
        let _ = std::fs::remove_file(&tmp);
        return Err(err);
    }

    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(&path, e));
    }

    tracing::info!(
        path = %path.display(),
        from = %metadata.from_version,
        to = %metadata.to_version,
        full,
        added = metadata.change_set.added_files.len(),
        modified = metadata.change_set.modified_files.len(),
        deleted = metadata.change_set.deleted_files.len(),
        omitted = metadata.omitted_files.len(),
        "built package"
    );
    Ok(BuiltPackage { path, metadata })
}

/// Outcome of [`capture_and_build`].
#[derive(Debug, Clone)]
pub struct PackageRun {
    pub snapshot_path: PathBuf,
    pub baseline: Option<PathBuf>,
    pub package: BuiltPackage,
}

/// Where [`capture_and_build`] takes its diff baseline from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaselineChoice<'a> {
    /// The newest stored snapshot of the greatest version below the one
    /// being built. With none stored, every file is packaged.
    Latest,
    /// This snapshot document. Its version must be below the one being
    /// built.
    Explicit(&'a Path),
    /// No baseline: a full package based on `any`.
    Full,
}

/// Capture `root` as `version`, persist the snapshot and package it
/// against the chosen baseline into `_update_ver/`.
///
/// The baseline is resolved before the new snapshot is persisted.
pub fn capture_and_build(
    root: &Path,
    version: &Version,
    policy: &ExclusionPolicy,
    lister: &dyn DependencyLister,
    choice: BaselineChoice<'_>,
) -> Result<PackageRun, PackageError> {
    let full = choice == BaselineChoice::Full;
    let baseline = match choice {
        BaselineChoice::Full => None,
        BaselineChoice::Latest => latest_baseline_at(root, version, None)?,
        BaselineChoice::Explicit(path) => Some(explicit_baseline(path, version)?),
    };
    match &baseline {
        Some((entry, _)) => {
            tracing::info!(baseline = %entry.path.display(), version = %entry.version, "diffing against baseline")
        }
        None if !full => tracing::info!("no baseline snapshot; packaging every file"),
        None => {}
    }

    let snapshot = capture(root, version, policy, lister)?;
    let snapshot_path = persist_at(root, &snapshot)?;
    let package = build(
        root,
        baseline.as_ref().map(|(_, s)| s),
        &snapshot,
        full,
        &package_dir_at(root),
    )?;

    Ok(PackageRun {
        snapshot_path,
        baseline: baseline.map(|(entry, _)| entry.path),
        package,
    })
}

fn explicit_baseline(
    path: &Path,
    version: &Version,
) -> Result<(SnapshotEntry, Snapshot), PackageError> {
    let snapshot = store::load(path)?;
    if &snapshot.version >= version {
        return Err(PackageError::Baseline {
            path: path.to_path_buf(),
            reason: format!(
                "baseline version {} is not below {version}",
                snapshot.version
            ),
        });
    }
    let entry = SnapshotEntry {
        path: path.to_path_buf(),
        version: snapshot.version.clone(),
        timestamp: snapshot.timestamp,
    };
    Ok((entry, snapshot))
}
