use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use fdp_types::ContentDigest;
use rand::RngCore;
use sha1::{Digest, Sha1};
use tracing::debug;

use crate::error::{CryptoError, CryptoResult};

/// Length of tokens produced by [`ContentHasher::random_token`].
pub const TOKEN_LEN: usize = 24;

const READ_BUF: usize = 64 * 1024;

/// SHA-1 content hasher.
///
/// No domain separation is applied: the digest of a file must equal the
/// digest any other registry client computes for the same bytes.
pub struct ContentHasher;

impl ContentHasher {
    /// Digest raw bytes.
    pub fn hash_bytes(data: &[u8]) -> ContentDigest {
        ContentDigest::from_bytes(Sha1::digest(data).into())
    }

    /// Digest the UTF-8 bytes of a string.
    pub fn hash_string(s: &str) -> ContentDigest {
        Self::hash_bytes(s.as_bytes())
    }

    /// Stream a file through the digest.
    pub fn hash_file(path: &Path) -> CryptoResult<ContentDigest> {
        let mut file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => CryptoError::FileNotFound(path.to_path_buf()),
            _ => CryptoError::Io {
                path: path.to_path_buf(),
                source: e,
            },
        })?;

        let mut hasher = Sha1::new();
        let mut buf = vec![0u8; READ_BUF];
        let mut total = 0u64;
        loop {
            let n = match file.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(CryptoError::Io {
                        path: path.to_path_buf(),
                        source: e,
                    })
                }
            };
            hasher.update(&buf[..n]);
            total += n as u64;
        }

        let digest = ContentDigest::from_bytes(hasher.finalize().into());
        debug!(path = %path.display(), bytes = total, digest = %digest.short_hex(), "hashed file");
        Ok(digest)
    }

    /// Check that a file's content matches an expected digest.
    pub fn verify_file(path: &Path, expected: &ContentDigest) -> CryptoResult<bool> {
        Ok(Self::hash_file(path)? == *expected)
    }

    /// Unpredictable token for scratch file names.
    ///
    /// Mixes OS entropy with the high-resolution clock. Not a security
    /// boundary.
    pub fn random_token() -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let mut entropy = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut entropy);

        let mut hasher = Sha1::new();
        hasher.update(nanos.to_le_bytes());
        hasher.update(entropy);
        let mut token = hex::encode(hasher.finalize());
        token.truncate(TOKEN_LEN);
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn known_digests() {
        assert_eq!(
            ContentHasher::hash_string("").to_hex(),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
        assert_eq!(
            ContentHasher::hash_string("abc").to_hex(),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(
            ContentHasher::hash_string("test").to_hex(),
            "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3"
        );
    }

    #[test]
    fn hash_is_deterministic() {
        let a = ContentHasher::hash_bytes(b"hello world");
        let b = ContentHasher::hash_bytes(b"hello world");
        assert_eq!(a, b);
        assert_ne!(a, ContentHasher::hash_bytes(b"hello worle"));
    }

    #[test]
    fn file_digest_matches_string_digest() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"Test").unwrap();
        file.flush().unwrap();
        let from_file = ContentHasher::hash_file(file.path()).unwrap();
        assert_eq!(from_file, ContentHasher::hash_string("Test"));
    }

    #[test]
    fn large_file_spans_multiple_reads() {
        let data = vec![0x5au8; READ_BUF * 3 + 17];
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&data).unwrap();
        file.flush().unwrap();
        assert_eq!(
            ContentHasher::hash_file(file.path()).unwrap(),
            ContentHasher::hash_bytes(&data)
        );
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.csv");
        let err = ContentHasher::hash_file(&missing).unwrap_err();
        assert!(matches!(err, CryptoError::FileNotFound(p) if p == missing));
    }

    #[test]
    fn verify_file_detects_tampering() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"original").unwrap();
        file.flush().unwrap();
        let digest = ContentHasher::hash_string("original");
        assert!(ContentHasher::verify_file(file.path(), &digest).unwrap());
        assert!(!ContentHasher::verify_file(file.path(), &ContentHasher::hash_string("other")).unwrap());
    }

    #[test]
    fn random_tokens_are_hex_and_distinct() {
        let a = ContentHasher::random_token();
        let b = ContentHasher::random_token();
        assert_eq!(a.len(), TOKEN_LEN);
        assert!(a.bytes().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
