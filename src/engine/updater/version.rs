//! Application Versions
//!
//! Four-component `major.minor.build.revision` versions and the
//! newer-than comparison used to decide whether an update applies.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::error::UpdateError;

/// Four-component version, ordered field by field
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    pub revision: u32,
}

/// Outcome of comparing a remote version against the local one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionOrdering {
    Newer,
    NotNewer,
}

impl Version {
    pub const fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Self { major, minor, build, revision }
    }

    /// Check if this version is strictly newer than `other`
    pub fn is_newer_than(&self, other: &Version) -> bool {
        self > other
    }
}

impl FromStr for Version {
    type Err = UpdateError;

    /// Accepts one to four dot-separated components, with an optional
    /// leading `v`. Missing trailing components are zero.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let body = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);
        let parts: Vec<&str> = body.split('.').collect();

        if body.is_empty() || parts.len() > 4 {
            return Err(UpdateError::InvalidVersion(s.to_string()));
        }

        let mut components = [0u32; 4];
        for (slot, part) in components.iter_mut().zip(&parts) {
            *slot = part
                .parse::<u32>()
                .map_err(|_| UpdateError::InvalidVersion(s.to_string()))?;
        }

        let [major, minor, build, revision] = components;
        Ok(Self { major, minor, build, revision })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.build, self.revision)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Compare a remote version string against the local version
///
/// A remote string that does not parse is reported as `NotNewer`.
pub fn compare_versions(remote: &str, local: &Version) -> VersionOrdering {
    match remote.parse::<Version>() {
        Ok(remote) if remote.is_newer_than(local) => VersionOrdering::Newer,
        Ok(_) => VersionOrdering::NotNewer,
        Err(_) => {
            tracing::debug!(remote, "remote version does not parse, treating as not newer");
            VersionOrdering::NotNewer
        }
    }
}
