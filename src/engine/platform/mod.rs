//! Platform Detection and Parsing Module
//!
//! Operating system and CPU architecture identifiers used to match
//! manifest entries against the running process.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::engine::updater::error::{Result, UpdateError};

/// Operating systems an update item can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Windows,
    MacOS,
    Linux,
}

/// CPU architectures an update item can target
///
/// `Any` marks a generic artifact usable on every architecture of its OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    #[default]
    Any,
    X86,
    X64,
    Arm,
    Arm64,
}

impl Os {
    /// Detect the operating system this binary was built for
    pub fn current() -> Result<Self> {
        #[cfg(target_os = "macos")]
        return Ok(Os::MacOS);

        #[cfg(target_os = "linux")]
        return Ok(Os::Linux);

        #[cfg(target_os = "windows")]
        return Ok(Os::Windows);

        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        return Err(UpdateError::UnsupportedPlatform(std::env::consts::OS.to_string()));
    }
}

impl Arch {
    /// Detect the architecture this binary was built for
    ///
    /// Architectures outside the known set map to `Any`.
    pub fn current() -> Self {
        match std::env::consts::ARCH {
            "x86" => Arch::X86,
            "x86_64" => Arch::X64,
            "arm" => Arch::Arm,
            "aarch64" => Arch::Arm64,
            _ => Arch::Any,
        }
    }
}

impl FromStr for Os {
    type Err = UpdateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "windows" | "win" => Ok(Os::Windows),
            "macos" | "osx" => Ok(Os::MacOS),
            "linux" => Ok(Os::Linux),
            _ => Err(UpdateError::UnsupportedPlatform(s.to_string())),
        }
    }
}

impl FromStr for Arch {
    type Err = UpdateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x86" => Ok(Arch::X86),
            "x64" => Ok(Arch::X64),
            "arm" => Ok(Arch::Arm),
            "arm64" => Ok(Arch::Arm64),
            "any" => Ok(Arch::Any),
            _ => Err(UpdateError::UnsupportedArchitecture(s.to_string())),
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Os::Windows => write!(f, "windows"),
            Os::MacOS => write!(f, "macos"),
            Os::Linux => write!(f, "linux"),
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arch::Any => write!(f, "any"),
            Arch::X86 => write!(f, "x86"),
            Arch::X64 => write!(f, "x64"),
            Arch::Arm => write!(f, "arm"),
            Arch::Arm64 => write!(f, "arm64"),
        }
    }
}

/// Parse a platform tag such as `windows-x64`, `osx` or `linux-arm64`
///
/// The tag is split on the first `-`. An explicit architecture, when given,
/// takes precedence over any suffix embedded in the tag. A missing
/// architecture defaults to [`Arch::Any`].
pub fn parse_platform(raw: &str, explicit_arch: Option<&str>) -> Result<(Os, Arch)> {
    let (os_token, suffix) = match raw.split_once('-') {
        Some((os, arch)) => (os, Some(arch)),
        None => (raw, None),
    };

    let os = os_token.parse::<Os>()?;

    let arch = match explicit_arch.filter(|a| !a.trim().is_empty()).or(suffix) {
        Some(token) => token.parse::<Arch>()?,
        None => Arch::Any,
    };

    Ok((os, arch))
}

/// Platform of the running process
pub fn current_platform() -> Result<(Os, Arch)> {
    Ok((Os::current()?, Arch::current()))
}
