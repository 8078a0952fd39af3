//! Update Manifest
//!
//! Parses the remote manifest document and selects the entry matching
//! the running platform.
//!
//! The document is either a JSON array of items or an object with an
//! `items` array:
//!
//! ```json
//! [
//!   {
//!     "os": "windows-x64",
//!     "version": "2.0.0.0",
//!     "url": "https://example.com/app-2.0.0.0-win64.zip",
//!     "changelog": "https://example.com/changelog",
//!     "mandatory": false,
//!     "checksum": { "algorithm": "SHA256", "value": "9f86d0..." }
//!   }
//! ]
//! ```

use reqwest::Url;
use serde::{Deserialize, Serialize};

use super::error::{Result, UpdateError};
use super::verify::HashAlgorithm;
use crate::engine::platform::{parse_platform, Arch, Os};

/// Expected digest of a downloaded artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Checksum {
    pub algorithm: HashAlgorithm,
    pub value: String,
}

/// One manifest entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateItem {
    pub os: Os,
    pub arch: Arch,
    /// Raw version string as published
    pub version: String,
    pub url: String,
    pub changelog: Option<String>,
    pub mandatory: bool,
    pub checksum: Option<Checksum>,
}

/// Ordered list of update items
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Manifest {
    pub items: Vec<UpdateItem>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawManifest {
    List(Vec<RawItem>),
    Wrapped { items: Vec<RawItem> },
}

#[derive(Debug, Deserialize)]
struct RawItem {
    os: String,
    #[serde(default)]
    arch: Option<String>,
    version: String,
    url: String,
    #[serde(default)]
    changelog: Option<String>,
    #[serde(default)]
    mandatory: bool,
    #[serde(default)]
    checksum: Option<RawChecksum>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawChecksum {
    Bare(String),
    Tagged {
        #[serde(default)]
        algorithm: Option<String>,
        value: String,
    },
}

impl RawChecksum {
    fn into_checksum(self) -> Result<Checksum> {
        let (algorithm, value) = match self {
            RawChecksum::Bare(value) => (HashAlgorithm::default(), value),
            RawChecksum::Tagged { algorithm, value } => {
                let algorithm = match algorithm {
                    Some(tag) => tag.parse::<HashAlgorithm>()?,
                    None => HashAlgorithm::default(),
                };
                (algorithm, value)
            }
        };

        let value = value.trim().to_string();
        if value.is_empty() || !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(UpdateError::ManifestParse(format!(
                "checksum value is not a hex digest: {:?}",
                value
            )));
        }

        Ok(Checksum { algorithm, value })
    }
}

impl RawItem {
    fn into_item(self) -> Result<UpdateItem> {
        let (os, arch) = parse_platform(&self.os, self.arch.as_deref())?;

        if self.url.trim().is_empty() {
            return Err(UpdateError::ManifestParse(format!(
                "item for {} {} has an empty url",
                self.os, self.version
            )));
        }

        Ok(UpdateItem {
            os,
            arch,
            version: self.version.trim().to_string(),
            url: self.url.trim().to_string(),
            changelog: self.changelog.filter(|c| !c.trim().is_empty()),
            mandatory: self.mandatory,
            checksum: self.checksum.map(RawChecksum::into_checksum).transpose()?,
        })
    }
}

impl Manifest {
    /// Parse a manifest document
    ///
    /// Malformed JSON or missing fields fail with `ManifestParse`; unknown
    /// platform tokens fail with `UnsupportedPlatform` /
    /// `UnsupportedArchitecture`.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let raw: RawManifest = serde_json::from_slice(bytes)?;
        let raw_items = match raw {
            RawManifest::List(items) => items,
            RawManifest::Wrapped { items } => items,
        };

        let items = raw_items
            .into_iter()
            .map(RawItem::into_item)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { items })
    }

    /// Select the item for a platform
    ///
    /// An exact OS and architecture match wins over a generic `Any` entry
    /// wherever either appears; otherwise the first `Any` entry for the OS
    /// in manifest order is used.
    pub fn select_item(&self, os: Os, arch: Arch) -> Option<&UpdateItem> {
        self.items
            .iter()
            .find(|item| item.os == os && item.arch == arch)
            .or_else(|| {
                self.items
                    .iter()
                    .find(|item| item.os == os && item.arch == Arch::Any)
            })
    }
}

/// Resolve a possibly-relative item URL against the manifest location
pub fn resolve_url(manifest_url: &str, target: &str) -> Result<String> {
    if let Ok(absolute) = Url::parse(target) {
        return Ok(absolute.to_string());
    }

    let base = Url::parse(manifest_url)
        .map_err(|e| UpdateError::ManifestParse(format!("invalid manifest url {}: {}", manifest_url, e)))?;
    base.join(target)
        .map(|u| u.to_string())
        .map_err(|e| UpdateError::ManifestParse(format!("invalid item url {}: {}", target, e)))
}
