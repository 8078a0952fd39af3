//! Updater Error Types

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Server returned HTTP {status} for {url}")]
    Http { status: u16, url: String },

    #[error("Invalid manifest: {0}")]
    ManifestParse(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Unsupported architecture: {0}")]
    UnsupportedArchitecture(String),

    #[error("Unsupported checksum algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid version string: {0}")]
    InvalidVersion(String),

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Cannot move locked file {path} out of the way: {source}")]
    Quarantine {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to relaunch application: {0}")]
    ProcessLaunch(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Coarse error classes reported to hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    ManifestParse,
    UnsupportedPlatform,
    ChecksumMismatch,
    Extraction,
    ProcessLaunch,
    Io,
}

impl UpdateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) | Self::Http { .. } => ErrorKind::Network,
            Self::ManifestParse(_) | Self::UnsupportedAlgorithm(_) | Self::InvalidVersion(_) => {
                ErrorKind::ManifestParse
            }
            Self::UnsupportedPlatform(_) | Self::UnsupportedArchitecture(_) => {
                ErrorKind::UnsupportedPlatform
            }
            Self::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
            Self::Extraction(_) | Self::Quarantine { .. } => ErrorKind::Extraction,
            Self::ProcessLaunch(_) => ErrorKind::ProcessLaunch,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

impl From<zip::result::ZipError> for UpdateError {
    fn from(e: zip::result::ZipError) -> Self {
        Self::Extraction(e.to_string())
    }
}

impl From<serde_json::Error> for UpdateError {
    fn from(e: serde_json::Error) -> Self {
        Self::ManifestParse(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, UpdateError>;
