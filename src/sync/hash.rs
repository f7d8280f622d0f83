//! Content hashing for archive integrity.
//!
//! Every image packed into an archive is fingerprinted with SHA-256 and the
//! digest recorded in the snapshot metadata. Unpacking recomputes the digest
//! so a truncated or tampered image is caught before it is promoted.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of a byte slice.
#[must_use]
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Hex-encoded SHA-256 of a file's contents, streamed.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn file_hash(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Whether `actual` differs from an expected digest. No expectation means
/// nothing to compare against, which is not a mismatch.
#[must_use]
pub fn has_changed(actual: &str, expected: Option<&str>) -> bool {
    expected.is_some_and(|e| !e.eq_ignore_ascii_case(actual))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_content_hash_deterministic() {
        let hash1 = content_hash(b"image bytes");
        let hash2 = content_hash(b"image bytes");

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64); // SHA256 produces 64 hex chars
    }

    #[test]
    fn test_content_hash_changes_with_content() {
        assert_ne!(content_hash(b"a"), content_hash(b"b"));
    }

    #[test]
    fn test_file_hash_matches_content_hash() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("photo.jpg");
        std::fs::write(&path, b"jpeg").unwrap();

        assert_eq!(file_hash(&path).unwrap(), content_hash(b"jpeg"));
    }

    #[test]
    fn test_has_changed() {
        let hash = content_hash(b"x");
        assert!(!has_changed(&hash, None));
        assert!(!has_changed(&hash, Some(&hash.to_uppercase())));
        assert!(has_changed(&hash, Some("deadbeef")));
    }
}
