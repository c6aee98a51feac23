//! Tool configuration (config.toml)

use crate::sync::{SyncOptions, DEFAULT_PULL_INTERVAL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while loading the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file {}: {source}", path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Configuration shared by every materialization of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Directory holding cloned remote modules
    pub libs_dir: PathBuf,

    /// Version for modules that do not request one (empty means master)
    pub default_version: String,

    /// Minimum time between two pulls of a branch checkout, in seconds
    pub pull_interval_secs: u64,

    /// Clone depth, 0 for full clones
    pub clone_depth: u32,

    /// Wipe and reclone a module once if updating it fails
    pub destructive_retry: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            libs_dir: default_home().join("libs"),
            default_version: String::new(),
            pull_interval_secs: DEFAULT_PULL_INTERVAL.as_secs(),
            clone_depth: 0,
            destructive_retry: true,
        }
    }
}

/// Tool home directory (~/.fwmod)
pub fn default_home() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".fwmod"))
        .unwrap_or_else(|| PathBuf::from(".fwmod"))
}

/// Default config file location (~/.fwmod/config.toml)
pub fn default_config_path() -> PathBuf {
    default_home().join("config.toml")
}

impl Config {
    /// Parse a config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string; missing keys keep their defaults
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load `path` if given, else the default config file if it exists,
    /// else the defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = default_config_path();
                if default_path.is_file() {
                    Self::from_file(&default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn pull_interval(&self) -> Duration {
        Duration::from_secs(self.pull_interval_secs)
    }

    /// Synchronization options derived from this config
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            allow_destructive_retry: self.destructive_retry,
            pull_interval: self.pull_interval(),
            clone_depth: self.clone_depth,
        }
    }
}
