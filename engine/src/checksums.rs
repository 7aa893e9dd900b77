//! Checksum computation for verify-after-copy.
//!
//! This module provides:
//! - Streaming hashers (MD5, SHA-256, BLAKE3) behind one trait
//! - File-level checksum computation
//! - Source/destination comparison used by the transfer engine

use std::fmt;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::Digest;

use crate::error::EngineError;

/// Read buffer size for hashing
const CHUNK_SIZE: usize = 64 * 1024;

/// Supported checksum algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChecksumAlgorithm {
    /// MD5 (deprecated, but included for compatibility)
    Md5,
    /// SHA-256 (cryptographic, 256-bit)
    Sha256,
    /// BLAKE3 (modern, fast, 256-bit)
    Blake3,
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Md5 => write!(f, "md5"),
            Self::Sha256 => write!(f, "sha256"),
            Self::Blake3 => write!(f, "blake3"),
        }
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha256" => Ok(Self::Sha256),
            "blake3" => Ok(Self::Blake3),
            other => Err(format!(
                "unknown checksum algorithm '{}', expected md5, sha256 or blake3",
                other
            )),
        }
    }
}

/// A computed checksum value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumValue {
    algorithm: ChecksumAlgorithm,
    hex: String,
}

impl ChecksumValue {
    pub fn new(algorithm: ChecksumAlgorithm, hex: String) -> Self {
        ChecksumValue { algorithm, hex }
    }

    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }
}

impl fmt::Display for ChecksumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

/// Trait for computing checksums incrementally
pub trait ChecksumHasher {
    fn update(&mut self, data: &[u8]);

    fn finalize(self: Box<Self>) -> ChecksumValue;
}

struct Md5Hasher(md5::Context);

impl ChecksumHasher for Md5Hasher {
    fn update(&mut self, data: &[u8]) {
        self.0.consume(data);
    }

    fn finalize(self: Box<Self>) -> ChecksumValue {
        ChecksumValue::new(ChecksumAlgorithm::Md5, format!("{:x}", self.0.compute()))
    }
}

struct Sha256Hasher(sha2::Sha256);

impl ChecksumHasher for Sha256Hasher {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finalize(self: Box<Self>) -> ChecksumValue {
        let digest = self.0.finalize();
        let hex = digest.iter().map(|b| format!("{:02x}", b)).collect();
        ChecksumValue::new(ChecksumAlgorithm::Sha256, hex)
    }
}

struct Blake3Hasher(blake3::Hasher);

impl ChecksumHasher for Blake3Hasher {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finalize(self: Box<Self>) -> ChecksumValue {
        ChecksumValue::new(ChecksumAlgorithm::Blake3, self.0.finalize().to_hex().to_string())
    }
}

/// Create a fresh hasher for `algorithm`.
pub fn create_hasher(algorithm: ChecksumAlgorithm) -> Box<dyn ChecksumHasher> {
    match algorithm {
        ChecksumAlgorithm::Md5 => Box::new(Md5Hasher(md5::Context::new())),
        ChecksumAlgorithm::Sha256 => Box::new(Sha256Hasher(sha2::Sha256::new())),
        ChecksumAlgorithm::Blake3 => Box::new(Blake3Hasher(blake3::Hasher::new())),
    }
}

/// Compute the checksum of a file, streaming it in chunks.
pub fn compute_file_checksum(
    path: &Path,
    algorithm: ChecksumAlgorithm,
) -> Result<ChecksumValue, EngineError> {
    let read_error = |e| EngineError::ReadError {
        path: path.to_path_buf(),
        source: e,
    };

    let mut file = fs::File::open(path).map_err(read_error)?;
    let mut hasher = create_hasher(algorithm);
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let read = file.read(&mut buffer).map_err(read_error)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hasher.finalize())
}

/// Compare a copied file against its source.
///
/// # Errors
/// `VerificationFailed` when the checksums differ.
pub fn verify_copy(
    source: &Path,
    destination: &Path,
    algorithm: ChecksumAlgorithm,
) -> Result<ChecksumValue, EngineError> {
    let source_checksum = compute_file_checksum(source, algorithm)?;
    let destination_checksum = compute_file_checksum(destination, algorithm)?;

    if source_checksum != destination_checksum {
        return Err(EngineError::VerificationFailed {
            path: destination.to_path_buf(),
        });
    }
    Ok(destination_checksum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digests_of_empty_input() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("empty");
        fs::write(&path, b"").unwrap();

        let md5 = compute_file_checksum(&path, ChecksumAlgorithm::Md5).unwrap();
        assert_eq!(md5.hex(), "d41d8cd98f00b204e9800998ecf8427e");

        let sha = compute_file_checksum(&path, ChecksumAlgorithm::Sha256).unwrap();
        assert_eq!(
            sha.hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );

        let blake = compute_file_checksum(&path, ChecksumAlgorithm::Blake3).unwrap();
        assert_eq!(
            blake.hex(),
            "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262"
        );
    }

    #[test]
    fn test_verify_copy_detects_mismatch() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let same = temp_dir.path().join("same");
        let different = temp_dir.path().join("different");
        fs::write(&src, "original content").unwrap();
        fs::write(&same, "original content").unwrap();
        fs::write(&different, "modified content").unwrap();

        let value = verify_copy(&src, &same, ChecksumAlgorithm::Sha256).expect("Copies should match");
        assert_eq!(value.algorithm(), ChecksumAlgorithm::Sha256);

        assert!(matches!(
            verify_copy(&src, &different, ChecksumAlgorithm::Blake3),
            Err(EngineError::VerificationFailed { .. })
        ));
    }

    #[test]
    fn test_parse_algorithm() {
        assert_eq!("SHA256".parse::<ChecksumAlgorithm>(), Ok(ChecksumAlgorithm::Sha256));
        assert_eq!("blake3".parse::<ChecksumAlgorithm>(), Ok(ChecksumAlgorithm::Blake3));
        assert!("crc32".parse::<ChecksumAlgorithm>().is_err());
    }
}
