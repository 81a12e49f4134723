//! Tree walking with exclusion pruning.
//!
//! Rules, applied to every candidate before it is yielded or descended into:
//!
//! 1. Reserved layout entries at the root (`_snapshots/`, `version`, ...)
//! 2. `directories`: a relative path excludes itself and everything below;
//!    a bare name additionally matches that segment at any depth
//! 3. `name_patterns`: globs against the basename
//! 4. `filenames`: exact basenames
//!
//! A candidate whose path cannot be evaluated (not under the root, not valid
//! UTF-8, unrepresentable as a relative path) is excluded and logged.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use glob::Pattern;
use walkdir::{DirEntry, WalkDir};

use updraft_core::config::ExcludeConfig;
use updraft_core::paths::is_reserved_root_path;
use updraft_core::RelPath;

use crate::error::{io_err, SnapshotError};

/// Compiled exclusion rules.
#[derive(Debug, Clone, Default)]
pub struct ExclusionPolicy {
    directories: Vec<RelPath>,
    name_patterns: Vec<Pattern>,
    filenames: BTreeSet<String>,
}

impl ExclusionPolicy {
    /// Only the reserved layout entries are excluded.
    pub fn reserved_only() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ExcludeConfig) -> Result<Self, SnapshotError> {
        let mut directories = Vec::new();
        for raw in &config.directories {
            match RelPath::new(raw.as_str()) {
                Ok(dir) => directories.push(dir),
                Err(err) => {
                    tracing::warn!(entry = %raw, error = %err, "ignoring unusable excluded directory");
                }
            }
        }

        let name_patterns = config
            .name_patterns
            .iter()
            .map(|raw| {
                Pattern::new(raw).map_err(|source| SnapshotError::Pattern {
                    pattern: raw.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            directories,
            name_patterns,
            filenames: config.filenames.iter().cloned().collect(),
        })
    }

    /// `true` if `rel` (file or directory) must not appear in a snapshot.
    pub fn is_excluded(&self, rel: &RelPath) -> bool {
        if is_reserved_root_path(rel) {
            return true;
        }

        for dir in &self.directories {
            if rel.is_within(dir) {
                return true;
            }
            if !dir.as_str().contains('/') && rel.segments().any(|s| s == dir.as_str()) {
                return true;
            }
        }

        let name = rel.file_name();
        if self.filenames.contains(name) {
            return true;
        }
        self.name_patterns.iter().any(|p| p.matches(name))
    }

    /// Relative path for `path` under `root`, or `None` if it is excluded
    /// or cannot be evaluated.
    fn admit(&self, root: &Path, path: &Path) -> Option<RelPath> {
        let relative = match path.strip_prefix(root) {
            Ok(r) => r,
            Err(_) => {
                tracing::warn!(path = %path.display(), "excluding path outside the walk root");
                return None;
            }
        };
        match RelPath::from_path(relative) {
            Ok(rel) if self.is_excluded(&rel) => {
                tracing::debug!(path = %rel, "excluded");
                None
            }
            Ok(rel) => Some(rel),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "excluding unrepresentable path");
                None
            }
        }
    }
}

/// One non-excluded file or directory beneath the walk root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub rel: RelPath,
    pub path: PathBuf,
    pub is_dir: bool,
}

/// Lazily enumerate `root`, pruning excluded directories before descent.
///
/// Entries come in file-name order. The root itself is not yielded.
/// Symlinked directories are not followed. Symlinks to files are yielded as
/// files when their target lies inside `root`, and skipped otherwise. Read
/// errors are yielded as [`SnapshotError::Io`].
pub fn walk<'a>(
    root: &'a Path,
    policy: &'a ExclusionPolicy,
) -> impl Iterator<Item = Result<WalkEntry, SnapshotError>> + 'a {
    let canonical_root = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| entry.depth() == 0 || policy.admit(root, entry.path()).is_some())
        .filter_map(move |item| match item {
            Ok(entry) if entry.depth() == 0 => None,
            Ok(entry) => classify(root, &canonical_root, &entry).map(Ok),
            Err(err) => {
                let path = err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.to_path_buf());
                Some(Err(io_err(path, err.into())))
            }
        })
}

fn classify(root: &Path, canonical_root: &Path, entry: &DirEntry) -> Option<WalkEntry> {
    // Admission already succeeded in `filter_entry`.
    let rel = RelPath::from_path(entry.path().strip_prefix(root).ok()?).ok()?;
    let file_type = entry.file_type();

    let is_dir = if file_type.is_symlink() {
        match std::fs::metadata(entry.path()) {
            Ok(meta) if meta.is_file() => {
                let inside = std::fs::canonicalize(entry.path())
                    .map(|target| target.starts_with(canonical_root))
                    .unwrap_or(false);
                if !inside {
                    tracing::warn!(path = %rel, "skipping symlink to a file outside the root");
                    return None;
                }
                false
            }
            Ok(_) => {
                tracing::debug!(path = %rel, "not following symlinked directory");
                return None;
            }
            Err(err) => {
                tracing::warn!(path = %rel, error = %err, "skipping dangling symlink");
                return None;
            }
        }
    } else if file_type.is_dir() {
        true
    } else if file_type.is_file() {
        false
    } else {
        tracing::debug!(path = %rel, "skipping special file");
        return None;
    };

    Some(WalkEntry {
        rel,
        path: entry.path().to_path_buf(),
        is_dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn rel(s: &str) -> RelPath {
        RelPath::new(s).unwrap()
    }

    fn policy(dirs: &[&str], patterns: &[&str], files: &[&str]) -> ExclusionPolicy {
        let config = ExcludeConfig {
            directories: dirs.iter().map(|s| s.to_string()).collect(),
            name_patterns: patterns.iter().map(|s| s.to_string()).collect(),
            filenames: files.iter().map(|s| s.to_string()).collect(),
        };
        ExclusionPolicy::from_config(&config).unwrap()
    }

    fn collect(root: &Path, policy: &ExclusionPolicy) -> Vec<(String, bool)> {
        walk(root, policy)
            .map(|e| {
                let e = e.unwrap();
                (e.rel.to_string(), e.is_dir)
            })
            .collect()
    }

    #[test]
    fn directory_rules_match_paths_and_names() {
        let p = policy(&["venv", "browser/2"], &[], &[]);
        assert!(p.is_excluded(&rel("venv")));
        assert!(p.is_excluded(&rel("venv/lib/site.py")));
        assert!(p.is_excluded(&rel("tools/venv/bin/python")));
        assert!(p.is_excluded(&rel("browser/2/cache")));
        assert!(!p.is_excluded(&rel("browser/20/cache")));
        assert!(!p.is_excluded(&rel("venvs.txt")));
        assert!(!p.is_excluded(&rel("scrapers/2/x.py")));
    }

    #[test]
    fn patterns_and_filenames_match_basename() {
        let p = policy(&[], &["snapshot_*", "update_*"], &["config.json"]);
        assert!(p.is_excluded(&rel("deep/snapshot_1.0.0.json")));
        assert!(p.is_excluded(&rel("update_2.zip")));
        assert!(p.is_excluded(&rel("app/config.json")));
        assert!(!p.is_excluded(&rel("app/config.json.example")));
        assert!(!p.is_excluded(&rel("my_snapshot_notes.txt")));
    }

    #[test]
    fn reserved_layout_is_always_excluded() {
        let p = ExclusionPolicy::reserved_only();
        assert!(p.is_excluded(&rel("_snapshots/snapshot_1.json")));
        assert!(p.is_excluded(&rel("version")));
        assert!(p.is_excluded(&rel("updraft.yaml")));
        assert!(!p.is_excluded(&rel("docs/version")));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let config = ExcludeConfig {
            directories: vec![],
            name_patterns: vec!["[unclosed".to_string()],
            filenames: vec![],
        };
        let err = ExclusionPolicy::from_config(&config).unwrap_err();
        assert!(matches!(err, SnapshotError::Pattern { .. }), "got: {err}");
    }

    #[test]
    fn walk_prunes_excluded_directories() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::create_dir_all(root.join("venv/lib")).unwrap();
        fs::write(root.join("src/main.py"), "print(1)").unwrap();
        fs::write(root.join("src/nested/util.py"), "").unwrap();
        fs::write(root.join("venv/lib/site.py"), "").unwrap();
        fs::write(root.join("social.db"), "").unwrap();

        let p = policy(&["venv"], &[], &["social.db"]);
        let entries = collect(root, &p);
        assert_eq!(
            entries,
            vec![
                ("src".to_string(), true),
                ("src/main.py".to_string(), false),
                ("src/nested".to_string(), true),
                ("src/nested/util.py".to_string(), false),
            ]
        );
    }

    #[test]
    fn walk_of_missing_root_yields_io_error() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("absent");
        let p = ExclusionPolicy::reserved_only();
        let first = walk(&missing, &p).next().expect("an error item");
        assert!(matches!(first, Err(SnapshotError::Io { .. })));
    }

    #[test]
    #[cfg(unix)]
    fn walk_does_not_follow_directory_symlinks() {
        let tmp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.txt"), "x").unwrap();
        fs::write(tmp.path().join("real.txt"), "y").unwrap();
        std::os::unix::fs::symlink(outside.path(), tmp.path().join("link")).unwrap();
        std::os::unix::fs::symlink(tmp.path().join("real.txt"), tmp.path().join("alias.txt"))
            .unwrap();

        let entries = collect(tmp.path(), &ExclusionPolicy::reserved_only());
        assert_eq!(
            entries,
            vec![("alias.txt".to_string(), false), ("real.txt".to_string(), false)]
        );
    }

    #[test]
    #[cfg(unix)]
    fn walk_skips_file_symlinks_that_leave_the_root() {
        let tmp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.txt"), "x").unwrap();
        fs::write(tmp.path().join("real.txt"), "y").unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret.txt"), tmp.path().join("leak.txt"))
            .unwrap();

        let entries = collect(tmp.path(), &ExclusionPolicy::reserved_only());
        assert_eq!(entries, vec![("real.txt".to_string(), false)]);
    }
}
