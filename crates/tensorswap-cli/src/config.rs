//! Configuration file support for TensorSwap CLI
//!
//! Configuration is resolved from, in order:
//! - a path given with `--config`
//! - the path in the `TENSORSWAP_CONFIG` environment variable
//! - `tensorswap.toml` in the current directory
//!
//! and falls back to defaults when none of them exists.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tensorswap_lms::LmsConfig;

pub const CONFIG_FILE_NAME: &str = "tensorswap.toml";
pub const CONFIG_ENV_VAR: &str = "TENSORSWAP_CONFIG";

/// Configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Enable colored output
    pub colored: bool,

    /// Rewrite settings
    pub lms: LmsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            colored: true,
            lms: LmsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config
            .lms
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Resolve the configuration file to use, if any.
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Some(PathBuf::from(path));
        }
        let current = PathBuf::from(CONFIG_FILE_NAME);
        current.exists().then_some(current)
    }

    /// Find and load the configuration, or fall back to defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match Self::locate(explicit) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Write a default configuration file and return its path.
    pub fn create_default(path: Option<&Path>) -> Result<PathBuf> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
        Self::default().save(&path)?;
        Ok(path)
    }
}
