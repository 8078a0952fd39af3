//! Updater CLI Module
//! Command-line interface for driving the update engine by hand

pub mod formatter;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::engine::config::{ConfigError, UpdaterConfig, CONFIG_FILE_NAME};
use crate::engine::updater::verify::HashAlgorithm;

#[derive(Parser, Debug)]
#[command(name = "autoupdater")]
#[command(version)]
#[command(about = "Check, download and install application updates in place", long_about = None)]
pub struct Cli {
    /// Config file (defaults to ./autoupdater.config.json)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Manifest URL, overrides the config file
    #[arg(short, long, global = true)]
    pub manifest: Option<String>,

    /// Running application version, overrides the config file
    #[arg(long, global = true)]
    pub current_version: Option<String>,

    /// Output format (json for scripting)
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check the manifest for a newer version
    Check,

    /// Check, then download and install an available update
    Apply,

    /// Run periodic checks and print events until interrupted
    Watch {
        /// Install updates as soon as they are found
        #[arg(long)]
        apply: bool,
    },

    /// Delete quarantined files left by earlier installs
    Cleanup {
        /// Install directory to clean
        #[arg(short, long)]
        dir: PathBuf,
    },

    /// Verify a file against a digest
    Verify {
        /// File to hash
        #[arg(long)]
        file: PathBuf,

        /// MD5, SHA1, SHA256 or SHA512
        #[arg(short, long, default_value = "SHA256")]
        algorithm: HashAlgorithm,

        /// Expected hex digest
        #[arg(long)]
        value: String,
    },
}

impl Cli {
    /// Build the engine config from the file and command-line overrides
    pub fn load_config(&self) -> Result<UpdaterConfig, ConfigError> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));

        let mut config = match UpdaterConfig::load_file(&path) {
            Ok(config) => config,
            Err(ConfigError::NotFound(_)) if self.manifest.is_some() && self.current_version.is_some() => {
                UpdaterConfig::new("", "")
            }
            Err(e) => return Err(e),
        };

        if let Some(url) = &self.manifest {
            config.manifest_url = url.clone();
        }
        if let Some(version) = &self.current_version {
            config.current_version = version.clone();
        }

        config.validate()?;
        Ok(config)
    }
}
