//! Configuration file support for pinsync
//!
//! Reads configuration from `~/.config/pinsync/config.json`:
//!
//! ```json
//! {
//!   "excluded_packages": ["vtk", "simpleitk"],
//!   "index_url": "https://pypi.org",
//!   "python": "python3",
//!   "search_directory": "SuperBuild",
//!   "timeout_secs": 30,
//!   "max_retries": 3,
//!   "retry_backoff_ms": 500
//! }
//! ```
//!
//! Every key is optional. Command line flags take precedence.

use crate::pypi::{DEFAULT_INDEX_URL, RetryPolicy};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Python executable used when neither config nor flags name one
pub const DEFAULT_PYTHON: &str = "python3";

/// Packages the host application wraps itself instead of installing the
/// official distribution from the package index
const DEFAULT_EXCLUDED: [&str; 2] = ["vtk", "simpleitk"];

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot determine config directory. HOME environment variable not set.")]
    NoConfigDir,

    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Top-level configuration structure
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Packages never pinned by pinsync
    pub excluded_packages: BTreeSet<String>,

    /// Base URL of the package index JSON API
    pub index_url: String,

    /// Python executable running pip
    pub python: String,

    /// Directory searched when `--search-directory` is not given
    pub search_directory: Option<PathBuf>,

    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            excluded_packages: DEFAULT_EXCLUDED.iter().map(|s| s.to_string()).collect(),
            index_url: DEFAULT_INDEX_URL.to_string(),
            python: DEFAULT_PYTHON.to_string(),
            search_directory: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
        }
    }
}

impl Config {
    /// Load configuration from the default path or return defaults if not found
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_path()?)
    }

    /// Load configuration from `path`, returning defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

/// Returns the config file path: `~/.config/pinsync/config.json`
pub fn config_path() -> Result<PathBuf, ConfigError> {
    // Use XDG_CONFIG_HOME if set, otherwise fall back to ~/.config
    let config_base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".config"))
                .unwrap_or_default()
        });

    if config_base.as_os_str().is_empty() {
        return Err(ConfigError::NoConfigDir);
    }

    Ok(config_base.join("pinsync").join("config.json"))
}
