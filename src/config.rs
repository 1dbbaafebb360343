//! Database configuration
//!
//! Loaded from a JSON file. Only `data_dir` is required; every other key
//! has a default.
//!
//! ```json
//! {
//!   "data_dir": "/var/lib/emberdb",
//!   "max_binary_size": 1048576,
//!   "log_level": "warn"
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::{log_event_with_fields, Event, Severity};

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Unreadable(String),

    #[error("Invalid config JSON: {0}")]
    Malformed(String),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Unreadable(_) => "EMBER_CONFIG_UNREADABLE",
            ConfigError::Malformed(_) => "EMBER_CONFIG_MALFORMED",
            ConfigError::Invalid(_) => "EMBER_CONFIG_INVALID",
        }
    }
}

/// Store-wide binary limit when the config sets none (10MB)
pub const DEFAULT_MAX_BINARY_SIZE: u64 = 10 * 1024 * 1024;

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Data directory (required)
    pub data_dir: PathBuf,

    /// Snapshot file name inside `data_dir`
    #[serde(default = "default_snapshot_file")]
    pub snapshot_file: String,

    /// Blob directory name inside `data_dir`
    #[serde(default = "default_blob_dir")]
    pub blob_dir: String,

    /// Store-wide binary payload limit in bytes, used when a field
    /// declares no `maxSize`
    #[serde(default = "default_max_binary_size")]
    pub max_binary_size: u64,

    /// Minimum log severity: trace, info, warn, error, fatal
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_snapshot_file() -> String {
    "emberdb.json".to_string()
}
fn default_blob_dir() -> String {
    "blobs".to_string()
}
fn default_max_binary_size() -> u64 {
    DEFAULT_MAX_BINARY_SIZE
}
fn default_log_level() -> String {
    "info".to_string()
}

impl DatabaseConfig {
    /// Configuration rooted at `data_dir` with every default applied
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            snapshot_file: default_snapshot_file(),
            blob_dir: default_blob_dir(),
            max_binary_size: default_max_binary_size(),
            log_level: default_log_level(),
        }
    }

    /// Override the store-wide binary limit
    pub fn with_max_binary_size(mut self, bytes: u64) -> Self {
        self.max_binary_size = bytes;
        self
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::Unreadable(e.to_string()))?;

        let config: DatabaseConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Malformed(e.to_string()))?;

        config.validate()?;

        let path_str = path.display().to_string();
        log_event_with_fields(Event::ConfigLoaded, &[("path", path_str.as_str())]);

        Ok(config)
    }

    /// Validate field values
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_binary_size == 0 {
            return Err(ConfigError::Invalid("max_binary_size must be > 0".into()));
        }
        if self.snapshot_file.trim().is_empty() {
            return Err(ConfigError::Invalid("snapshot_file must not be empty".into()));
        }
        if self.blob_dir.trim().is_empty() {
            return Err(ConfigError::Invalid("blob_dir must not be empty".into()));
        }
        self.severity()?;
        Ok(())
    }

    /// Parsed log level
    pub fn severity(&self) -> ConfigResult<Severity> {
        self.log_level.parse::<Severity>().map_err(ConfigError::Invalid)
    }

    /// Absolute path of the snapshot file
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(&self.snapshot_file)
    }

    /// Root directory of the blob backend
    pub fn blob_root(&self) -> PathBuf {
        self.data_dir.join(&self.blob_dir)
    }
}
