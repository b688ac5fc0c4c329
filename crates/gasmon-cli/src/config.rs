//! Configuration file management.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use gasmon_core::DeviceId;

use crate::cli::StoreArgs;

/// Timeout used when neither the flag nor the file sets one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Realtime database URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    /// Database auth token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,

    /// Default device id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    /// Disable colored output
    #[serde(default)]
    pub no_color: bool,

    /// Enable the alarm sound when the dashboard starts
    #[serde(default)]
    pub sound: bool,

    /// Timeout for one-shot reads in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl Config {
    /// Get the config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gasmon")
            .join("config.toml")
    }

    /// Load config from file, or return default if not found
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Load config from `path`; unreadable or invalid files yield the default.
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        eprintln!("Warning: Failed to parse config: {}", e);
                    }
                },
                Err(e) => {
                    eprintln!("Warning: Failed to read config: {}", e);
                }
            }
        }
        Self::default()
    }

    /// Save config to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }
}

/// Resolve the device from arg, env var, or config, falling back to the
/// default device id.
pub fn resolve_device(device: Option<&str>, config: &Config) -> Result<DeviceId> {
    match device.or(config.device.as_deref()) {
        Some(id) => DeviceId::new(id).map_err(Into::into),
        None => Ok(DeviceId::default()),
    }
}

/// Database location resolved from flags and config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseTarget {
    pub url: String,
    pub auth: Option<String>,
}

/// Resolve the database URL and auth; flags and env vars win over the file.
pub fn resolve_database(args: &StoreArgs, config: &Config) -> Option<DatabaseTarget> {
    let url = args
        .database_url
        .clone()
        .or_else(|| config.database_url.clone())?;
    let auth = args.auth.clone().or_else(|| config.auth.clone());
    Some(DatabaseTarget { url, auth })
}

/// Resolve timeout: use provided value, fall back to config, then default
pub fn resolve_timeout(cmd_timeout: u64, config: &Config) -> u64 {
    if cmd_timeout != DEFAULT_TIMEOUT_SECS {
        cmd_timeout
    } else {
        config.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS)
    }
}
