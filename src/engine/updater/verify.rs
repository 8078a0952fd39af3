//! Integrity Verification
//!
//! Content-hash checks of downloaded artifacts. The digest is chosen by
//! the checksum's algorithm tag; hashing goes through `DynDigest` so
//! every algorithm shares one streaming loop.

use digest::DynDigest;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;

use super::error::{Result, UpdateError};
use super::manifest::Checksum;

/// Read buffer used while hashing
const HASH_BUFFER_SIZE: usize = 8192;

/// Supported digest algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HashAlgorithm {
    Md5,
    /// Manifest default when no algorithm is given
    #[default]
    Sha1,
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    /// Fresh hasher for this algorithm
    pub fn hasher(self) -> Box<dyn DynDigest + Send> {
        match self {
            Self::Md5 => Box::new(md5::Md5::default()),
            Self::Sha1 => Box::new(sha1::Sha1::default()),
            Self::Sha256 => Box::new(sha2::Sha256::default()),
            Self::Sha512 => Box::new(sha2::Sha512::default()),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = UpdateError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "md5" => Ok(Self::Md5),
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            _ => Err(UpdateError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Md5 => write!(f, "MD5"),
            Self::Sha1 => write!(f, "SHA-1"),
            Self::Sha256 => write!(f, "SHA-256"),
            Self::Sha512 => write!(f, "SHA-512"),
        }
    }
}

/// Calculate the hex digest of a file
pub fn calculate_digest(path: &Path, algorithm: HashAlgorithm) -> Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = algorithm.hasher();

    let mut buffer = [0u8; HASH_BUFFER_SIZE];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Verify a file against an optional checksum
///
/// Passes trivially when no checksum is configured. Comparison is
/// case-insensitive.
pub fn verify(path: &Path, checksum: Option<&Checksum>) -> Result<()> {
    let Some(checksum) = checksum else {
        return Ok(());
    };

    let actual = calculate_digest(path, checksum.algorithm)?;
    if !actual.eq_ignore_ascii_case(checksum.value.trim()) {
        return Err(UpdateError::ChecksumMismatch {
            expected: checksum.value.clone(),
            actual,
        });
    }

    tracing::debug!(
        path = %path.display(),
        algorithm = %checksum.algorithm,
        "checksum verified"
    );
    Ok(())
}
