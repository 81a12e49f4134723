//! Streaming SHA-256 content fingerprints.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use updraft_core::Fingerprint;

use crate::error::{io_err, SnapshotError};

/// Bytes read per chunk; a file is never held in memory whole.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Fingerprint everything `reader` yields.
pub fn fingerprint<R: Read>(mut reader: R) -> io::Result<Fingerprint> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    Ok(Fingerprint(hex::encode(hasher.finalize())))
}

/// Fingerprint the file at `path`.
pub fn fingerprint_file(path: &Path) -> Result<Fingerprint, SnapshotError> {
    let file = File::open(path).map_err(|e| io_err(path, e))?;
    fingerprint(file).map_err(|e| io_err(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn identical_bytes_share_a_fingerprint() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a.bin");
        let b = tmp.path().join("b.bin");
        std::fs::write(&a, b"same bytes").unwrap();
        std::fs::write(&b, b"same bytes").unwrap();
        assert_eq!(fingerprint_file(&a).unwrap(), fingerprint_file(&b).unwrap());
    }

    #[test]
    fn distinct_bytes_differ() {
        let one = fingerprint(&b"one"[..]).unwrap();
        let two = fingerprint(&b"two"[..]).unwrap();
        assert_ne!(one, two);
    }

    #[test]
    fn known_digest_of_empty_input() {
        let empty = fingerprint(io::empty()).unwrap();
        assert_eq!(
            empty.0,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn multi_chunk_input_matches_single_update() {
        let data = vec![7u8; CHUNK_SIZE * 3 + 11];
        let streamed = fingerprint(&data[..]).unwrap();
        let direct = hex::encode(Sha256::digest(&data));
        assert_eq!(streamed.0, direct);
    }

    #[test]
    fn missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let err = fingerprint_file(&tmp.path().join("nope")).unwrap_err();
        assert!(matches!(err, SnapshotError::Io { .. }), "got: {err}");
    }
}
