//! Change-detection fingerprints.
//!
//! A fingerprint is a SHA-256 digest over the file size and whole-second
//! modification time. It never reads file content, so two files that share
//! size and mtime share a fingerprint.

use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Fingerprint of a file together with the size it was computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFingerprint {
    pub digest: String,
    pub size: u64,
}

/// Digest for a given size and modification time.
pub fn fingerprint(size: u64, modified_secs: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}{}", size, modified_secs).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Stat `path` and fingerprint it.
///
/// # Errors
///
/// Returns an error if the file cannot be stat'ed or has no modification time.
pub async fn fingerprint_file(path: &Path) -> std::io::Result<FileFingerprint> {
    let metadata = tokio::fs::metadata(path).await?;
    let modified = metadata.modified()?;
    let secs = match modified.duration_since(UNIX_EPOCH) {
        Ok(since) => since.as_secs() as i64,
        Err(before) => -(before.duration().as_secs() as i64),
    };

    Ok(FileFingerprint {
        digest: fingerprint(metadata.len(), secs),
        size: metadata.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    #[test]
    fn test_fingerprint_is_stable_hex() {
        let a = fingerprint(1024, 1_700_000_000);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a, fingerprint(1024, 1_700_000_000));
    }

    #[test]
    fn test_fingerprint_changes_with_size_or_mtime() {
        let base = fingerprint(1024, 1_700_000_000);
        assert_ne!(base, fingerprint(1025, 1_700_000_000));
        assert_ne!(base, fingerprint(1024, 1_700_000_001));
    }

    #[tokio::test]
    async fn test_fingerprint_file_tracks_mtime() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.flac");
        std::fs::write(&path, b"audio").unwrap();

        let first = fingerprint_file(&path).await.unwrap();
        assert_eq!(first.size, 5);

        let later = SystemTime::now() + Duration::from_secs(120);
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(later)
            .unwrap();

        let second = fingerprint_file(&path).await.unwrap();
        assert_eq!(second.size, 5);
        assert_ne!(first.digest, second.digest);
    }

    #[tokio::test]
    async fn test_fingerprint_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(fingerprint_file(&dir.path().join("missing.flac")).await.is_err());
    }
}
