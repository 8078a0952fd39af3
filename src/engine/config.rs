//! Updater Configuration Module
//! Handles loading and validating autoupdater.config.json

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::engine::platform::parse_platform;
use crate::engine::updater::download::TransportOptions;
use crate::engine::updater::version::Version;

pub const CONFIG_FILE_NAME: &str = "autoupdater.config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Invalid config format: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdaterConfig {
    pub manifest_url: String,
    /// Version of the running application
    pub current_version: String,
    /// Defaults to the directory of the running executable
    #[serde(default)]
    pub install_dir: Option<PathBuf>,
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
    #[serde(default = "default_true")]
    pub repeat_checks: bool,
    #[serde(default)]
    pub terminate_after_relaunch: bool,
    /// Relaunch target; relative paths resolve against the install dir
    #[serde(default)]
    pub executable_path: Option<PathBuf>,
    #[serde(default)]
    pub relaunch_args: Vec<String>,
    /// `os[-arch]` override of the detected platform
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_check_interval() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

fn default_connect_timeout() -> u64 {
    15
}

fn default_request_timeout() -> u64 {
    300
}

impl UpdaterConfig {
    pub fn new(manifest_url: &str, current_version: &str) -> Self {
        Self {
            manifest_url: manifest_url.to_string(),
            current_version: current_version.to_string(),
            install_dir: None,
            download_dir: None,
            check_interval_secs: default_check_interval(),
            repeat_checks: true,
            terminate_after_relaunch: false,
            executable_path: None,
            relaunch_args: Vec::new(),
            platform: None,
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
            user_agent: None,
        }
    }

    /// Load `autoupdater.config.json` from a directory
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        Self::load_file(&dir.join(CONFIG_FILE_NAME))
    }

    pub fn load_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::NotFound(config_path.to_path_buf()));
        }
        let content = std::fs::read_to_string(config_path)?;
        let config: UpdaterConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, dir: &Path) -> Result<(), ConfigError> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        reqwest::Url::parse(&self.manifest_url).map_err(|e| ConfigError::Invalid {
            field: "manifest_url",
            reason: e.to_string(),
        })?;

        self.version()?;

        if let Some(platform) = &self.platform {
            parse_platform(platform, None).map_err(|e| ConfigError::Invalid {
                field: "platform",
                reason: e.to_string(),
            })?;
        }

        if self.connect_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "timeouts",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    pub fn version(&self) -> Result<Version, ConfigError> {
        self.current_version
            .parse::<Version>()
            .map_err(|e| ConfigError::Invalid {
                field: "current_version",
                reason: e.to_string(),
            })
    }

    /// Where artifacts are downloaded: configured dir, user cache, then temp
    pub fn download_dir(&self) -> PathBuf {
        self.download_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .map(|d| d.join("autoupdater"))
                .unwrap_or_else(|| std::env::temp_dir().join("autoupdater"))
        })
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn transport(&self) -> TransportOptions {
        let mut options = TransportOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..TransportOptions::default()
        };
        if let Some(agent) = &self.user_agent {
            options.user_agent = agent.clone();
        }
        options
    }
}
