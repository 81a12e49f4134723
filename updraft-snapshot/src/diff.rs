//! Snapshot comparison. Pure: no I/O.

use updraft_core::{ChangeSet, Snapshot};

/// How a change set is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiffMode {
    /// Compare against a baseline.
    #[default]
    Incremental,
    /// Ignore any baseline: every file and directory is added.
    Full,
}

/// Classify every path of `old` and `new`.
///
/// - in `new` only → added
/// - in both with differing fingerprints → modified
/// - in `old` only → deleted
pub fn diff(old: &Snapshot, new: &Snapshot) -> ChangeSet {
    let mut change_set = ChangeSet::default();

    for (path, fingerprint) in &new.files {
        match old.files.get(path) {
            None => {
                change_set.added_files.insert(path.clone());
            }
            Some(previous) if previous != fingerprint => {
                change_set.modified_files.insert(path.clone());
            }
            Some(_) => {}
        }
    }
    change_set.deleted_files = old
        .files
        .keys()
        .filter(|path| !new.files.contains_key(*path))
        .cloned()
        .collect();

    change_set.added_dirs = new.directories.difference(&old.directories).cloned().collect();
    change_set.deleted_dirs = old.directories.difference(&new.directories).cloned().collect();
    change_set
}

/// Full-package change set: everything in `new` is added.
pub fn diff_full(new: &Snapshot) -> ChangeSet {
    ChangeSet {
        added_files: new.files.keys().cloned().collect(),
        added_dirs: new.directories.clone(),
        ..ChangeSet::default()
    }
}

/// Change set for `mode`; a missing baseline behaves like an empty one.
pub fn diff_with_mode(old: Option<&Snapshot>, new: &Snapshot, mode: DiffMode) -> ChangeSet {
    match (mode, old) {
        (DiffMode::Full, _) | (DiffMode::Incremental, None) => diff_full(new),
        (DiffMode::Incremental, Some(old)) => diff(old, new),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use updraft_core::{Fingerprint, RelPath, Version};

    fn rel(s: &str) -> RelPath {
        RelPath::new(s).unwrap()
    }

    fn snapshot(files: &[(&str, &str)], dirs: &[&str]) -> Snapshot {
        let mut s = Snapshot::new(Version::new(vec![1, 0, 0]));
        for (path, hash) in files {
            s.files.insert(rel(path), Fingerprint::from(*hash));
        }
        for dir in dirs {
            s.directories.insert(rel(dir));
        }
        s
    }

    #[test]
    fn self_diff_is_empty() {
        let a = snapshot(&[("a.txt", "h1"), ("sub/b.txt", "h2")], &["sub"]);
        assert!(diff(&a, &a).is_empty());
    }

    #[test]
    fn classifies_added_modified_deleted() {
        let a = snapshot(&[("a.txt", "H1"), ("gone.txt", "H9")], &["old"]);
        let b = snapshot(&[("a.txt", "H2"), ("b.txt", "H3")], &["sub"]);
        let cs = diff(&a, &b);
        assert_eq!(cs.modified_files.iter().collect::<Vec<_>>(), vec![&rel("a.txt")]);
        assert_eq!(cs.added_files.iter().collect::<Vec<_>>(), vec![&rel("b.txt")]);
        assert_eq!(cs.deleted_files.iter().collect::<Vec<_>>(), vec![&rel("gone.txt")]);
        assert_eq!(cs.added_dirs.iter().collect::<Vec<_>>(), vec![&rel("sub")]);
        assert_eq!(cs.deleted_dirs.iter().collect::<Vec<_>>(), vec![&rel("old")]);
    }

    #[test]
    fn file_sets_are_disjoint() {
        let a = snapshot(&[("x", "1"), ("y", "2"), ("z", "3")], &[]);
        let b = snapshot(&[("x", "1"), ("y", "changed"), ("w", "4")], &[]);
        let cs = diff(&a, &b);
        for path in &cs.added_files {
            assert!(!cs.modified_files.contains(path) && !cs.deleted_files.contains(path));
        }
        for path in &cs.modified_files {
            assert!(!cs.deleted_files.contains(path));
        }
        assert_eq!(cs.added_files.len() + cs.modified_files.len() + cs.deleted_files.len(), 3);
    }

    #[test]
    fn full_mode_ignores_baseline() {
        let a = snapshot(&[("a.txt", "H1"), ("gone.txt", "H9")], &["old"]);
        let b = snapshot(&[("a.txt", "H1"), ("b.txt", "H3")], &["sub"]);
        let cs = diff_with_mode(Some(&a), &b, DiffMode::Full);
        assert_eq!(cs.added_files.len(), 2);
        assert!(cs.modified_files.is_empty());
        assert!(cs.deleted_files.is_empty());
        assert!(cs.deleted_dirs.is_empty());
        assert_eq!(cs.added_dirs.len(), 1);
    }

    #[test]
    fn missing_baseline_adds_everything() {
        let b = snapshot(&[("a.txt", "H1")], &["sub"]);
        assert_eq!(diff_with_mode(None, &b, DiffMode::Incremental), diff_full(&b));
    }
}
