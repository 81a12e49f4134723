//! Applying one package to an installation root.
//!
//! Phases run strictly in order:
//!
//! ```text
//! Loading -> Deleting -> Extracting -> RecreatingDirs
//!         -> ReconcilingDependencies -> CommittingVersion
//! ```
//!
//! A failure in any phase up to `RecreatingDirs` aborts the apply with an
//! [`ApplyError`] naming that phase; files already touched stay touched.
//! The version marker is only written in the last phase, so a failed apply
//! always leaves the previously committed version in place.

use std::path::{Path, PathBuf};

use updraft_core::config::UpdraftConfig;
use updraft_core::paths::is_reserved_root_path;
use updraft_core::{marker, BaseVersion, RelPath, Version};
use updraft_package::PackageArchive;

use crate::dependencies::{reconcile, DependencyInstaller, InstallReport};
use crate::error::{ApplyCause, ApplyError, ApplyPhase};
use crate::mutator::{force_remove, ExtractOutcome, Extractor, SkipReason};

/// An archive entry that was not extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub name: String,
    pub reason: SkipReason,
}

/// Summary of a successful apply.
#[derive(Debug, Clone)]
pub struct ApplyReport {
    pub package: PathBuf,
    pub from_version: BaseVersion,
    pub to_version: Version,
    pub removed: usize,
    pub written: usize,
    pub directories: usize,
    /// Non-reserved entries that were refused.
    pub skipped: Vec<SkippedEntry>,
    pub dependencies: InstallReport,
}

/// Applies packages to one root.
pub struct Applier<'a> {
    root: PathBuf,
    hidden_prefixes: Vec<String>,
    installer: &'a dyn DependencyInstaller,
}

impl<'a> Applier<'a> {
    pub fn new(root: &Path, installer: &'a dyn DependencyInstaller) -> Self {
        Self {
            root: root.to_path_buf(),
            hidden_prefixes: Vec::new(),
            installer,
        }
    }

    pub fn from_config(
        root: &Path,
        config: &UpdraftConfig,
        installer: &'a dyn DependencyInstaller,
    ) -> Self {
        Self::new(root, installer).with_hidden_prefixes(config.extract.reserved_prefixes.clone())
    }

    /// Directory-name prefixes whose contents are never extracted.
    pub fn with_hidden_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.hidden_prefixes = prefixes;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Apply the package at `package` and commit its `to_version`.
    pub fn apply(&self, package: &Path) -> Result<ApplyReport, ApplyError> {
        let fail = |phase: ApplyPhase, to: Option<&Version>, cause: ApplyCause| ApplyError {
            phase,
            to_version: to.cloned(),
            package: package.to_path_buf(),
            cause,
        };

        // Loading
        enter(ApplyPhase::Loading, package);
        let mut archive =
            PackageArchive::open(package).map_err(|e| fail(ApplyPhase::Loading, None, e.into()))?;
        let meta = archive.metadata().clone();
        let to = Some(&meta.to_version);
        let reserved = archive.reserved().clone();
        let extractor = Extractor::new(&self.root, &reserved, &self.hidden_prefixes)
            .map_err(|e| fail(ApplyPhase::Loading, to, e.into()))?;
        self.check_base(&meta.from_version, &meta.to_version);

        let mut report = ApplyReport {
            package: package.to_path_buf(),
            from_version: meta.from_version.clone(),
            to_version: meta.to_version.clone(),
            removed: 0,
            written: 0,
            directories: 0,
            skipped: Vec::new(),
            dependencies: InstallReport::default(),
        };

        // Deleting
        enter(ApplyPhase::Deleting, package);
        let doomed = meta
            .change_set
            .deleted_files
            .iter()
            .chain(meta.change_set.deleted_dirs.iter());
        for rel in doomed {
            if self
                .delete(&extractor, rel)
                .map_err(|e| fail(ApplyPhase::Deleting, to, e))?
            {
                report.removed += 1;
            }
        }

        // Extracting
        enter(ApplyPhase::Extracting, package);
        for index in 0..archive.len() {
            let mut entry = archive
                .entry(index)
                .map_err(|e| fail(ApplyPhase::Extracting, to, e.into()))?;
            let outcome = extractor
                .extract(&entry.name, entry.is_dir, &mut entry.reader)
                .map_err(|e| fail(ApplyPhase::Extracting, to, e.into()))?;
            match outcome {
                ExtractOutcome::Written(_) => report.written += 1,
                ExtractOutcome::Directory(_) => report.directories += 1,
                ExtractOutcome::Skipped {
                    reason: SkipReason::Reserved,
                    ..
                } => {}
                ExtractOutcome::Skipped { name, reason } => {
                    report.skipped.push(SkippedEntry { name, reason })
                }
            }
        }

        // RecreatingDirs
        enter(ApplyPhase::RecreatingDirs, package);
        for rel in &meta.change_set.added_dirs {
            if is_reserved_root_path(rel) {
                tracing::warn!(path = %rel, "added directory is part of the installation layout; skipped");
                continue;
            }
            let target = rel.to_path_under(&self.root);
            let contained = extractor
                .contained(&target)
                .map_err(|e| fail(ApplyPhase::RecreatingDirs, to, e.into()))?;
            if !contained {
                tracing::warn!(path = %rel, "added directory resolves outside the root; skipped");
                continue;
            }
            extractor
                .ensure_dir(&target)
                .map_err(|e| fail(ApplyPhase::RecreatingDirs, to, e.into()))?;
        }

        // ReconcilingDependencies
        enter(ApplyPhase::ReconcilingDependencies, package);
        report.dependencies = reconcile(
            self.installer,
            &meta.old_dependencies,
            &meta.new_dependencies,
        );

        // CommittingVersion
        enter(ApplyPhase::CommittingVersion, package);
        marker::write_at(&self.root, &meta.to_version)
            .map_err(|e| fail(ApplyPhase::CommittingVersion, to, e.into()))?;

        tracing::info!(
            package = %package.display(),
            to = %meta.to_version,
            removed = report.removed,
            written = report.written,
            skipped = report.skipped.len(),
            "package applied"
        );
        Ok(report)
    }

    fn delete(&self, extractor: &Extractor<'_>, rel: &RelPath) -> Result<bool, ApplyCause> {
        if is_reserved_root_path(rel) {
            tracing::warn!(path = %rel, "deletion target is part of the installation layout; skipped");
            return Ok(false);
        }
        let target = rel.to_path_under(&self.root);
        let parent = target.parent().unwrap_or(&self.root);
        if !extractor.contained(parent)? {
            tracing::warn!(path = %rel, "deletion target resolves outside the root; skipped");
            return Ok(false);
        }
        let removed = force_remove(&target)?;
        if removed {
            tracing::debug!(path = %rel, "removed");
        }
        Ok(removed)
    }

    fn check_base(&self, from: &BaseVersion, to: &Version) {
        let BaseVersion::Exact(expected) = from else {
            return;
        };
        match marker::read_at(&self.root) {
            Ok(Some(current)) if &current == expected => {}
            Ok(Some(current)) => {
                tracing::warn!(current = %current, expected = %expected, to = %to, "installed version differs from package base; applying anyway")
            }
            Ok(None) => {
                tracing::warn!(expected = %expected, to = %to, "no version marker; applying anyway")
            }
            Err(err) => tracing::warn!(error = %err, "cannot read version marker"),
        }
    }
}

fn enter(phase: ApplyPhase, package: &Path) {
    tracing::info!(%phase, package = %package.display(), "apply phase");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependencies::NoopInstaller;
    use std::fs;
    use tempfile::TempDir;
    use updraft_package::build;
    use updraft_snapshot::{capture, ExclusionPolicy, NoDependencies};

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn unreadable_package_fails_in_loading_and_touches_nothing() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("a.txt"), "a").unwrap();
        marker::write_at(root.path(), &v("1.0.0")).unwrap();
        let bogus = root.path().join("bogus.zip");
        fs::write(&bogus, "not a zip").unwrap();

        let err = Applier::new(root.path(), &NoopInstaller)
            .apply(&bogus)
            .unwrap_err();
        assert_eq!(err.phase, ApplyPhase::Loading);
        assert!(err.to_version.is_none());
        assert_eq!(marker::read_at(root.path()).unwrap(), Some(v("1.0.0")));
        assert!(root.path().join("a.txt").exists());
    }

    #[test]
    fn deletes_then_extracts_then_commits() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let policy = ExclusionPolicy::reserved_only();
        fs::create_dir(src.path().join("old_dir")).unwrap();
        fs::write(src.path().join("gone.txt"), "g").unwrap();
        fs::write(src.path().join("kept.txt"), "v1").unwrap();
        let old = capture(src.path(), &v("1.0.0"), &policy, &NoDependencies).unwrap();

        let target = TempDir::new().unwrap();
        for entry in ["gone.txt", "kept.txt"] {
            fs::copy(src.path().join(entry), target.path().join(entry)).unwrap();
        }
        fs::create_dir(target.path().join("old_dir")).unwrap();
        marker::write_at(target.path(), &v("1.0.0")).unwrap();

        fs::remove_file(src.path().join("gone.txt")).unwrap();
        fs::remove_dir(src.path().join("old_dir")).unwrap();
        fs::write(src.path().join("kept.txt"), "v2").unwrap();
        let new = capture(src.path(), &v("1.1.0"), &policy, &NoDependencies).unwrap();
        let package = build(src.path(), Some(&old), &new, false, out.path()).unwrap();

        let report = Applier::new(target.path(), &NoopInstaller)
            .apply(&package.path)
            .unwrap();
        assert_eq!(report.removed, 2);
        assert_eq!(report.written, 1);
        assert!(report.skipped.is_empty());
        assert!(!target.path().join("gone.txt").exists());
        assert!(!target.path().join("old_dir").exists());
        assert_eq!(fs::read_to_string(target.path().join("kept.txt")).unwrap(), "v2");
        assert_eq!(marker::read_at(target.path()).unwrap(), Some(v("1.1.0")));
    }
}
