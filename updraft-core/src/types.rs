//! Domain types shared by the snapshot, package and apply crates.
//!
//! Paths inside a tree are always [`RelPath`]s: `/`-separated, normalised,
//! never absolute and never containing `..`. A `RelPath` can therefore be
//! joined onto any root without leaving it lexically.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PathError, VersionError};

// ---------------------------------------------------------------------------
// RelPath
// ---------------------------------------------------------------------------

/// A normalised path relative to a tree root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelPath(String);

impl RelPath {
    /// Parse and normalise a `/`-separated relative path.
    ///
    /// Empty and `.` segments are dropped. Absolute paths, drive prefixes,
    /// `..` segments, backslashes and NUL bytes are rejected.
    pub fn new(raw: impl Into<String>) -> Result<Self, PathError> {
        let raw = raw.into();
        if raw.contains('\0') {
            return Err(PathError::Nul(raw));
        }
        if raw.contains('\\') {
            return Err(PathError::Backslash(raw));
        }
        if raw.starts_with('/') {
            return Err(PathError::Absolute(raw));
        }

        let mut segments: Vec<&str> = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => continue,
                ".." => return Err(PathError::Escapes(raw.clone())),
                s if segments.is_empty() && is_drive_prefix(s) => {
                    return Err(PathError::Absolute(raw.clone()))
                }
                s => segments.push(s),
            }
        }
        if segments.is_empty() {
            return Err(PathError::Empty);
        }
        Ok(Self(segments.join("/")))
    }

    /// Build from a filesystem path that is already relative to a root.
    pub fn from_path(path: &Path) -> Result<Self, PathError> {
        let mut segments = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => {
                    let Some(part) = part.to_str() else {
                        return Err(PathError::NonUtf8(path.to_string_lossy().into_owned()));
                    };
                    segments.push(part);
                }
                Component::CurDir => continue,
                Component::ParentDir => {
                    return Err(PathError::Escapes(path.to_string_lossy().into_owned()))
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(PathError::Absolute(path.to_string_lossy().into_owned()))
                }
            }
        }
        Self::new(segments.join("/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The final segment.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// `true` if `self` equals `ancestor` or lies beneath it.
    pub fn is_within(&self, ancestor: &RelPath) -> bool {
        self.0 == ancestor.0
            || (self.0.len() > ancestor.0.len()
                && self.0.starts_with(&ancestor.0)
                && self.0.as_bytes()[ancestor.0.len()] == b'/')
    }

    /// Join onto `root` segment by segment, yielding a native path.
    pub fn to_path_under(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for segment in self.segments() {
            path.push(segment);
        }
        path
    }
}

fn is_drive_prefix(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for RelPath {
    type Error = PathError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl TryFrom<&str> for RelPath {
    type Error = PathError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RelPath> for String {
    fn from(p: RelPath) -> Self {
        p.0
    }
}

// ---------------------------------------------------------------------------
// Fingerprint
// ---------------------------------------------------------------------------

/// Lowercase hex SHA-256 digest of a file's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub String);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Fingerprint {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Fingerprint {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// Dotted-integer application version (`1.4.2`).
///
/// Comparison pads the shorter side with zeros, so `1.0 == 1.0.0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    parts: Vec<u64>,
}

impl Version {
    pub fn new(parts: impl Into<Vec<u64>>) -> Self {
        let mut parts = parts.into();
        if parts.is_empty() {
            parts.push(0);
        }
        Self { parts }
    }

    /// `0.0.0`, the version assumed for an installation with no marker.
    pub fn zero() -> Self {
        Self::new(vec![0, 0, 0])
    }

    pub fn parts(&self) -> &[u64] {
        &self.parts
    }

    fn significant(&self) -> &[u64] {
        let end = self
            .parts
            .iter()
            .rposition(|p| *p != 0)
            .map_or(0, |i| i + 1);
        &self.parts[..end]
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || VersionError { raw: s.to_string() };
        if trimmed.is_empty() {
            return Err(invalid());
        }
        let parts = trimmed
            .split('.')
            .map(|part| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                part.parse::<u64>().map_err(|_| invalid())
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { parts })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for part in &self.parts {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{part}")?;
            first = false;
        }
        Ok(())
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        for i in 0..len {
            let a = self.parts.get(i).copied().unwrap_or(0);
            let b = other.parts.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant().hash(state);
    }
}

impl TryFrom<String> for Version {
    type Error = VersionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.to_string()
    }
}

/// The version a package was diffed against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BaseVersion {
    /// No baseline existed: the package carries every file.
    Any,
    Exact(Version),
}

impl BaseVersion {
    pub const WILDCARD: &'static str = "any";

    /// `true` if a package based on `self` may be applied on top of `current`.
    pub fn admits(&self, current: &Version) -> bool {
        match self {
            BaseVersion::Any => true,
            BaseVersion::Exact(v) => v <= current,
        }
    }
}

impl fmt::Display for BaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaseVersion::Any => f.write_str(Self::WILDCARD),
            BaseVersion::Exact(v) => v.fmt(f),
        }
    }
}

impl FromStr for BaseVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case(Self::WILDCARD) || trimmed == "*" {
            return Ok(BaseVersion::Any);
        }
        trimmed.parse().map(BaseVersion::Exact)
    }
}

impl TryFrom<String> for BaseVersion {
    type Error = VersionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<BaseVersion> for String {
    fn from(v: BaseVersion) -> Self {
        v.to_string()
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

fn unix_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::default()
}

/// Content-addressed description of a file tree at one point in time.
///
/// Documents written before timestamps existed load with the Unix epoch;
/// the legacy `pip` key is accepted for `dependencies`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: Version,
    #[serde(default = "unix_epoch")]
    pub timestamp: DateTime<Utc>,
    pub files: BTreeMap<RelPath, Fingerprint>,
    #[serde(default)]
    pub directories: BTreeSet<RelPath>,
    #[serde(default, alias = "pip")]
    pub dependencies: Vec<String>,
}

impl Snapshot {
    /// An empty snapshot of `version` taken now.
    pub fn new(version: Version) -> Self {
        Self {
            version,
            timestamp: Utc::now(),
            files: BTreeMap::new(),
            directories: BTreeSet::new(),
            dependencies: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// ChangeSet
// ---------------------------------------------------------------------------

/// Differences between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    #[serde(default)]
    pub added_files: BTreeSet<RelPath>,
    #[serde(default)]
    pub modified_files: BTreeSet<RelPath>,
    #[serde(default)]
    pub deleted_files: BTreeSet<RelPath>,
    #[serde(default)]
    pub added_dirs: BTreeSet<RelPath>,
    #[serde(default)]
    pub deleted_dirs: BTreeSet<RelPath>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added_files.is_empty()
            && self.modified_files.is_empty()
            && self.deleted_files.is_empty()
            && self.added_dirs.is_empty()
            && self.deleted_dirs.is_empty()
    }

    /// Files whose bytes travel in the package: added then modified.
    pub fn payload_paths(&self) -> impl Iterator<Item = &RelPath> {
        self.added_files.iter().chain(self.modified_files.iter())
    }
}

// ---------------------------------------------------------------------------
// Package metadata
// ---------------------------------------------------------------------------

/// The metadata document stored at a reserved name inside every package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub from_version: BaseVersion,
    pub to_version: Version,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub full: bool,
    /// Archive name of the embedded snapshot document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_entry: Option<String>,
    #[serde(flatten)]
    pub change_set: ChangeSet,
    #[serde(default, alias = "old_pip")]
    pub old_dependencies: Vec<String>,
    #[serde(default, alias = "new_pip")]
    pub new_dependencies: Vec<String>,
    /// Payload files that could not be read when the package was built.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub omitted_files: Vec<RelPath>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(s: &str) -> RelPath {
        RelPath::new(s).unwrap()
    }

    #[test]
    fn relpath_normalises_dot_and_empty_segments() {
        assert_eq!(rel("./a//b/./c.txt").as_str(), "a/b/c.txt");
    }

    #[test]
    fn relpath_rejects_escape_and_absolute() {
        assert!(matches!(RelPath::new("../x"), Err(PathError::Escapes(_))));
        assert!(matches!(RelPath::new("a/../../x"), Err(PathError::Escapes(_))));
        assert!(matches!(RelPath::new("/etc/passwd"), Err(PathError::Absolute(_))));
        assert!(matches!(RelPath::new("C:/Windows"), Err(PathError::Absolute(_))));
        assert!(matches!(RelPath::new("a\\..\\b"), Err(PathError::Backslash(_))));
        assert!(matches!(RelPath::new("./"), Err(PathError::Empty)));
    }

    #[test]
    fn relpath_is_within_respects_segment_boundaries() {
        assert!(rel("sub/a.txt").is_within(&rel("sub")));
        assert!(rel("sub").is_within(&rel("sub")));
        assert!(!rel("subway/a.txt").is_within(&rel("sub")));
    }

    #[test]
    fn relpath_from_native_path() {
        let p = Path::new("a").join("b").join("c.txt");
        assert_eq!(RelPath::from_path(&p).unwrap().as_str(), "a/b/c.txt");
        assert!(RelPath::from_path(Path::new("../c")).is_err());
    }

    #[test]
    fn version_ordering_is_numeric_not_lexical() {
        let v = |s: &str| s.parse::<Version>().unwrap();
        assert!(v("1.10.0") > v("1.9.0"));
        assert!(v("2.0.0") > v("1.99.99"));
        assert_eq!(v("1.0"), v("1.0.0"));
        assert!(v("1.0.1") > v("1.0"));
    }

    #[test]
    fn version_rejects_garbage() {
        for raw in ["", "1..0", "v1.0", "1.0-beta", "1.-1"] {
            assert!(raw.parse::<Version>().is_err(), "{raw} should not parse");
        }
    }

    #[test]
    fn base_version_wildcard() {
        let any: BaseVersion = "any".parse().unwrap();
        assert_eq!(any, BaseVersion::Any);
        assert!(any.admits(&Version::zero()));
        let exact: BaseVersion = "1.2.0".parse().unwrap();
        assert!(exact.admits(&"1.3".parse().unwrap()));
        assert!(!exact.admits(&"1.1.9".parse().unwrap()));
    }

    #[test]
    fn snapshot_accepts_legacy_document() {
        let json = r#"{"version":"1.0.0","files":{"a.txt":"ab"},"pip":["requests==2.0"]}"#;
        let snapshot: Snapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.timestamp, DateTime::<Utc>::default());
        assert_eq!(snapshot.dependencies, vec!["requests==2.0".to_string()]);
        assert!(snapshot.directories.is_empty());
    }

    #[test]
    fn snapshot_rejects_escaping_paths() {
        let json = r#"{"version":"1.0.0","files":{"../evil":"ab"}}"#;
        assert!(serde_json::from_str::<Snapshot>(json).is_err());
    }

    #[test]
    fn metadata_flattens_change_set() {
        let mut change_set = ChangeSet::default();
        change_set.added_files.insert(rel("b.txt"));
        let meta = PackageMetadata {
            from_version: BaseVersion::Any,
            to_version: "1.1.0".parse().unwrap(),
            timestamp: Utc::now(),
            full: true,
            snapshot_entry: Some("snapshot_1.1.0_1.json".into()),
            change_set,
            old_dependencies: vec![],
            new_dependencies: vec![],
            omitted_files: vec![],
        };
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["from_version"], "any");
        assert_eq!(value["added_files"][0], "b.txt");
        assert!(value["timestamp"].is_i64());
    }
}
