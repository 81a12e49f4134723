//! Reading packages back.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use zip::result::ZipError;
use zip::ZipArchive;

use updraft_core::paths::{is_snapshot_name, METADATA_ENTRY};
use updraft_core::{PackageMetadata, Snapshot};

use crate::error::{format_err, io_err, PackageError};

/// Archive entry names that carry package bookkeeping rather than payload.
///
/// Resolved once per package and handed to extraction explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedNames {
    names: BTreeSet<String>,
}

impl ReservedNames {
    /// The metadata entry plus, if known, the embedded snapshot entry.
    pub fn new(snapshot_entry: Option<&str>) -> Self {
        let mut names = BTreeSet::new();
        names.insert(METADATA_ENTRY.to_string());
        if let Some(entry) = snapshot_entry {
            names.insert(entry.to_string());
        }
        Self { names }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// One raw archive entry. `name` is exactly as stored, unvalidated.
pub struct ArchiveEntry<R> {
    pub name: String,
    pub is_dir: bool,
    pub reader: R,
}

/// An opened package with its metadata and embedded snapshot parsed.
pub struct PackageArchive {
    path: PathBuf,
    zip: ZipArchive<BufReader<File>>,
    metadata: PackageMetadata,
    snapshot: Snapshot,
    reserved: ReservedNames,
}

impl std::fmt::Debug for PackageArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageArchive")
            .field("path", &self.path)
            .field("entries", &self.zip.len())
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl PackageArchive {
    /// Open `path` and parse its metadata and embedded snapshot.
    ///
    /// Packages whose metadata predates the `snapshot_entry` field are
    /// searched for a top-level `snapshot_*.json` entry instead.
    pub fn open(path: &Path) -> Result<Self, PackageError> {
        let file = File::open(path).map_err(|e| io_err(path, e))?;
        let mut zip = ZipArchive::new(BufReader::new(file))
            .map_err(|e| format_err(path, format!("not a readable zip archive: {e}")))?;

        let metadata: PackageMetadata = read_json(&mut zip, METADATA_ENTRY, path)?;

        let snapshot_entry = match &metadata.snapshot_entry {
            Some(name) => name.clone(),
            None => {
                let mut candidates: Vec<String> = zip
                    .file_names()
                    .filter(|name| is_snapshot_name(name))
                    .map(String::from)
                    .collect();
                candidates.sort();
                match candidates.pop() {
                    Some(name) => {
                        tracing::debug!(entry = %name, "located embedded snapshot by name");
                        name
                    }
                    None => return Err(format_err(path, "no embedded snapshot entry")),
                }
            }
        };
        let snapshot: Snapshot = read_json(&mut zip, &snapshot_entry, path)?;
        if snapshot.version != metadata.to_version {
            tracing::warn!(
                package = %path.display(),
                snapshot = %snapshot.version,
                to = %metadata.to_version,
                "embedded snapshot version differs from package target"
            );
        }

        Ok(Self {
            path: path.to_path_buf(),
            zip,
            reserved: ReservedNames::new(Some(&snapshot_entry)),
            metadata,
            snapshot,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn metadata(&self) -> &PackageMetadata {
        &self.metadata
    }

    /// The snapshot of the tree this package produces.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn reserved(&self) -> &ReservedNames {
        &self.reserved
    }

    /// Number of entries, reserved ones included.
    pub fn len(&self) -> usize {
        self.zip.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zip.len() == 0
    }

    /// Entry `index` in archive order.
    pub fn entry(&mut self, index: usize) -> Result<ArchiveEntry<impl Read + '_>, PackageError> {
        let file = self.zip.by_index(index)?;
        Ok(ArchiveEntry {
            name: file.name().to_string(),
            is_dir: file.is_dir(),
            reader: file,
        })
    }
}

fn read_json<T: DeserializeOwned>(
    zip: &mut ZipArchive<BufReader<File>>,
    name: &str,
    path: &Path,
) -> Result<T, PackageError> {
    let mut entry = match zip.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => {
            return Err(format_err(path, format!("missing entry {name}")));
        }
        Err(e) => return Err(e.into()),
    };
    let mut contents = String::new();
    entry
        .read_to_string(&mut contents)
        .map_err(|e| io_err(path, e))?;
    serde_json::from_str(&contents).map_err(|e| format_err(path, format!("{name}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;
    use updraft_core::{BaseVersion, RelPath, Version};
    use updraft_snapshot::{capture, ExclusionPolicy, NoDependencies};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, body) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    fn built_package(tmp: &TempDir) -> PathBuf {
        let tree = tmp.path().join("tree");
        fs::create_dir_all(tree.join("docs")).unwrap();
        fs::write(tree.join("a.txt"), "alpha").unwrap();
        let snap = capture(
            &tree,
            &v("2.0.0"),
            &ExclusionPolicy::reserved_only(),
            &NoDependencies,
        )
        .unwrap();
        build(&tree, None, &snap, true, &tmp.path().join("out"))
            .unwrap()
            .path
    }

    #[test]
    fn opens_built_package() {
        let tmp = TempDir::new().unwrap();
        let path = built_package(&tmp);
        let mut archive = PackageArchive::open(&path).unwrap();

        assert_eq!(archive.metadata().to_version, v("2.0.0"));
        assert_eq!(archive.metadata().from_version, BaseVersion::Any);
        assert_eq!(archive.snapshot().version, v("2.0.0"));
        assert!(archive.reserved().contains(METADATA_ENTRY));
        let snapshot_entry = archive.metadata().snapshot_entry.clone().unwrap();
        assert!(archive.reserved().contains(&snapshot_entry));

        let mut payload = Vec::new();
        for i in 0..archive.len() {
            let entry = archive.entry(i).unwrap();
            if !entry.is_dir && !archive_reserved(&snapshot_entry, &entry.name) {
                payload.push(entry.name.clone());
            }
        }
        assert_eq!(payload, vec!["a.txt"]);
    }

    fn archive_reserved(snapshot_entry: &str, name: &str) -> bool {
        name == METADATA_ENTRY || name == snapshot_entry
    }

    #[test]
    fn missing_metadata_is_a_format_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("p.zip");
        write_zip(&path, &[("a.txt", "x")]);
        let err = PackageArchive::open(&path).unwrap_err();
        assert!(matches!(err, PackageError::Format { .. }), "got: {err}");
    }

    #[test]
    fn non_zip_is_a_format_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("p.zip");
        fs::write(&path, "definitely not a zip").unwrap();
        let err = PackageArchive::open(&path).unwrap_err();
        assert!(matches!(err, PackageError::Format { .. }), "got: {err}");
    }

    #[test]
    fn legacy_metadata_finds_snapshot_by_name() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("legacy.zip");
        let meta = r#"{"from_version":"1.0.0","to_version":"1.1.0","timestamp":1700000000,
            "added_files":["b.txt"],"modified_files":[],"deleted_files":[],
            "added_dirs":[],"deleted_dirs":[],"old_pip":[],"new_pip":["x==1"]}"#;
        let snap = r#"{"version":"1.1.0","files":{"b.txt":"00"}}"#;
        write_zip(
            &path,
            &[
                ("b.txt", "bee"),
                ("snapshot_1.1.0.json", snap),
                (METADATA_ENTRY, meta),
            ],
        );

        let archive = PackageArchive::open(&path).unwrap();
        assert!(archive.reserved().contains("snapshot_1.1.0.json"));
        assert_eq!(archive.metadata().new_dependencies, vec!["x==1"]);
        assert!(archive
            .snapshot()
            .files
            .contains_key(&RelPath::new("b.txt").unwrap()));
    }

    #[test]
    fn escaping_deleted_path_is_rejected_at_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("evil.zip");
        let meta = r#"{"from_version":"any","to_version":"1.0.0","timestamp":0,
            "snapshot_entry":"snapshot_1.0.0_0.json","deleted_files":["../../etc/passwd"]}"#;
        let snap = r#"{"version":"1.0.0","files":{}}"#;
        write_zip(
            &path,
            &[("snapshot_1.0.0_0.json", snap), (METADATA_ENTRY, meta)],
        );
        let err = PackageArchive::open(&path).unwrap_err();
        assert!(matches!(err, PackageError::Format { .. }), "got: {err}");
    }
}
