//! Content fingerprinting.
//!
//! This module provides:
//! - The supported fingerprint algorithms (SHA-256, BLAKE3)
//! - Streaming digest computation over bounded-size chunks
//!
//! A fingerprint is the lowercase hex digest of a file's full byte content.
//! Memory use is O(chunk size) regardless of file size, and the digest does
//! not depend on where chunk boundaries fall.

use crate::error::EngineError;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

/// Default streaming read size (1 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Supported fingerprint algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FingerprintAlgorithm {
    /// SHA-256 (cryptographic, 256-bit)
    #[default]
    Sha256,
    /// BLAKE3 (modern, fast, 256-bit)
    Blake3,
}

impl fmt::Display for FingerprintAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha256 => write!(f, "sha256"),
            Self::Blake3 => write!(f, "blake3"),
        }
    }
}

impl FromStr for FingerprintAlgorithm {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sha256" => Ok(Self::Sha256),
            "blake3" => Ok(Self::Blake3),
            other => Err(EngineError::invalid_argument(format!(
                "unknown fingerprint algorithm '{}', expected 'sha256' or 'blake3'",
                other
            ))),
        }
    }
}

/// Running hash state that chunks are folded into
pub trait FingerprintHasher {
    /// Update the hasher with new data
    fn update(&mut self, data: &[u8]);

    /// Finalize and return the hex digest
    fn finalize_hex(self: Box<Self>) -> String;
}

struct Sha256Hasher {
    hasher: sha2::Sha256,
}

impl FingerprintHasher for Sha256Hasher {
    fn update(&mut self, data: &[u8]) {
        use sha2::Digest;
        self.hasher.update(data);
    }

    fn finalize_hex(self: Box<Self>) -> String {
        use sha2::Digest;
        format!("{:x}", self.hasher.finalize())
    }
}

struct Blake3Hasher {
    hasher: blake3::Hasher,
}

impl FingerprintHasher for Blake3Hasher {
    fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    fn finalize_hex(self: Box<Self>) -> String {
        self.hasher.finalize().to_hex().to_string()
    }
}

/// Create a new hasher for the given algorithm
pub fn create_hasher(algorithm: FingerprintAlgorithm) -> Box<dyn FingerprintHasher> {
    match algorithm {
        FingerprintAlgorithm::Sha256 => Box::new(Sha256Hasher {
            hasher: sha2::Sha256::default(),
        }),
        FingerprintAlgorithm::Blake3 => Box::new(Blake3Hasher {
            hasher: blake3::Hasher::new(),
        }),
    }
}

/// Fold everything `reader` yields into a digest, `chunk_size` bytes at a time.
pub fn fingerprint_reader<R: Read>(
    mut reader: R,
    algorithm: FingerprintAlgorithm,
    chunk_size: usize,
) -> io::Result<String> {
    let mut hasher = create_hasher(algorithm);
    let mut buffer = vec![0u8; chunk_size.max(1)];

    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buffer[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(hasher.finalize_hex())
}

/// Compute the fingerprint of a file's full content.
///
/// # Errors
/// Returns `EngineError::ReadError` if the file cannot be opened or read.
pub fn compute_fingerprint(
    path: &Path,
    algorithm: FingerprintAlgorithm,
    chunk_size: usize,
) -> Result<String, EngineError> {
    let file = File::open(path).map_err(|e| EngineError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    fingerprint_reader(file, algorithm, chunk_size).map_err(|e| EngineError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_algorithm_display() {
        assert_eq!(FingerprintAlgorithm::Sha256.to_string(), "sha256");
        assert_eq!(FingerprintAlgorithm::Blake3.to_string(), "blake3");
    }

    #[test]
    fn test_algorithm_from_str() {
        assert_eq!(
            "sha256".parse::<FingerprintAlgorithm>().unwrap(),
            FingerprintAlgorithm::Sha256
        );
        assert_eq!(
            "BLAKE3".parse::<FingerprintAlgorithm>().unwrap(),
            FingerprintAlgorithm::Blake3
        );
        assert!("md5".parse::<FingerprintAlgorithm>().is_err());
    }

    #[test]
    fn test_sha256_known_digest() {
        let hex = fingerprint_reader(&b"hello"[..], FingerprintAlgorithm::Sha256, 4096).unwrap();
        assert_eq!(
            hex,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_blake3_matches_one_shot_hash() {
        let hex = fingerprint_reader(&b"hello"[..], FingerprintAlgorithm::Blake3, 4096).unwrap();
        assert_eq!(hex, blake3::hash(b"hello").to_hex().to_string());
        assert_eq!(hex.len(), 64);
    }

    #[test]
    fn test_chunk_size_does_not_change_digest() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        for algorithm in [FingerprintAlgorithm::Sha256, FingerprintAlgorithm::Blake3] {
            let whole = fingerprint_reader(&data[..], algorithm, data.len()).unwrap();
            for chunk in [1, 7, 64, 4096] {
                let chunked = fingerprint_reader(&data[..], algorithm, chunk).unwrap();
                assert_eq!(whole, chunked, "{} chunk={}", algorithm, chunk);
            }
        }
    }

    #[test]
    fn test_compute_fingerprint_of_file() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("data.bin");
        fs::write(&path, b"hello").expect("Failed to write file");

        let hex = compute_fingerprint(&path, FingerprintAlgorithm::Sha256, DEFAULT_CHUNK_SIZE)
            .expect("Fingerprint should succeed");
        assert_eq!(
            hex,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_compute_fingerprint_missing_file() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let result = compute_fingerprint(
            &temp_dir.path().join("gone.txt"),
            FingerprintAlgorithm::Sha256,
            DEFAULT_CHUNK_SIZE,
        );
        assert!(matches!(result, Err(EngineError::ReadError { .. })));
    }
}
