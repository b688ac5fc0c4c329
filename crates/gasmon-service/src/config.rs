//! Service configuration.
//!
//! Loaded from TOML (`~/.config/gasmon/service.toml` by default). Secrets
//! can be kept out of the file: `GASMON_TELEGRAM_TOKEN`,
//! `GASMON_TELEGRAM_CHAT_ID`, `GASMON_DATABASE_AUTH` and `GASMON_HOOK_SECRET`
//! override the corresponding fields when set.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use gasmon_core::DeviceId;

/// Environment variable holding the Telegram bot token.
pub const ENV_TELEGRAM_TOKEN: &str = "GASMON_TELEGRAM_TOKEN";
/// Environment variable holding the Telegram chat id.
pub const ENV_TELEGRAM_CHAT_ID: &str = "GASMON_TELEGRAM_CHAT_ID";
/// Environment variable holding the database auth token.
pub const ENV_DATABASE_AUTH: &str = "GASMON_DATABASE_AUTH";
/// Environment variable holding the hook shared secret.
pub const ENV_HOOK_SECRET: &str = "GASMON_HOOK_SECRET";

/// Service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Realtime database used by the watcher.
    pub database: DatabaseConfig,
    /// Telegram notification settings.
    pub telegram: TelegramConfig,
    /// Hook endpoint settings.
    pub hook: HookConfig,
    /// Background watcher settings.
    pub watcher: WatcherConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Override secrets from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Override secrets using `lookup`; empty values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(token) = get(ENV_TELEGRAM_TOKEN) {
            self.telegram.token = Some(token);
        }
        if let Some(chat_id) = get(ENV_TELEGRAM_CHAT_ID) {
            self.telegram.chat_id = Some(chat_id);
        }
        if let Some(auth) = get(ENV_DATABASE_AUTH) {
            self.database.auth = Some(auth);
        }
        if let Some(secret) = get(ENV_HOOK_SECRET) {
            self.hook.secret = Some(secret);
        }
    }

    /// Validate the configuration and return any errors.
    ///
    /// This checks:
    /// - Server bind address is valid (host:port format)
    /// - URLs use http or https
    /// - Telegram token and chat id are set together
    /// - Watched devices are valid, unique, and have a database to watch
    ///
    /// # Example
    ///
    /// ```
    /// use gasmon_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        errors.extend(self.server.validate());
        errors.extend(self.database.validate());
        errors.extend(self.telegram.validate());
        errors.extend(self.watcher.validate());

        if self.watcher.enabled && self.database.url.is_none() {
            errors.push(ValidationError {
                field: "database.url".to_string(),
                message: "required when the watcher is enabled".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

impl ServerConfig {
    /// Validate server configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.bind.is_empty() {
            errors.push(ValidationError {
                field: "server.bind".to_string(),
                message: "bind address cannot be empty".to_string(),
            });
            return errors;
        }

        match self.bind.rsplit_once(':') {
            None => errors.push(ValidationError {
                field: "server.bind".to_string(),
                message: format!(
                    "invalid bind address '{}': expected format 'host:port'",
                    self.bind
                ),
            }),
            Some((_, port)) => match port.parse::<u16>() {
                Ok(0) => errors.push(ValidationError {
                    field: "server.bind".to_string(),
                    message: "port cannot be 0".to_string(),
                }),
                Err(_) => errors.push(ValidationError {
                    field: "server.bind".to_string(),
                    message: format!("invalid port '{}': must be a number 1-65535", port),
                }),
                Ok(_) => {}
            },
        }

        errors
    }
}

/// Realtime database configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database base URL, e.g. `https://<project>-default-rtdb.firebaseio.com`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Auth token appended as `?auth=`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
}

impl DatabaseConfig {
    /// Validate database configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if let Some(url) = &self.url
            && !is_http_url(url)
        {
            errors.push(ValidationError {
                field: "database.url".to_string(),
                message: format!("'{}' must start with http:// or https://", url),
            });
        }
        errors
    }
}

/// Default Telegram Bot API base URL.
pub const DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";

/// Telegram notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot API base URL.
    pub api_base: String,
    /// Bot token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Target chat id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_TELEGRAM_API.to_string(),
            token: None,
            chat_id: None,
        }
    }
}

impl TelegramConfig {
    /// Whether both token and chat id are present.
    pub fn is_configured(&self) -> bool {
        self.token.is_some() && self.chat_id.is_some()
    }

    /// Validate Telegram configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if !is_http_url(&self.api_base) {
            errors.push(ValidationError {
                field: "telegram.api_base".to_string(),
                message: format!("'{}' must start with http:// or https://", self.api_base),
            });
        }
        match (&self.token, &self.chat_id) {
            (Some(_), None) => errors.push(ValidationError {
                field: "telegram.chat_id".to_string(),
                message: "required when a bot token is set".to_string(),
            }),
            (None, Some(_)) => errors.push(ValidationError {
                field: "telegram.token".to_string(),
                message: "required when a chat id is set".to_string(),
            }),
            _ => {}
        }
        errors
    }
}

/// Hook endpoint configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    /// Shared secret expected in the `X-Hook-Secret` header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

/// Background watcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Subscribe to the database directly.
    pub enabled: bool,
    /// Devices whose latest slot is watched.
    pub devices: Vec<String>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            devices: vec![gasmon_core::DEFAULT_DEVICE_ID.to_string()],
        }
    }
}

impl WatcherConfig {
    /// Parsed device ids; invalid entries are skipped (see [`validate`](Self::validate)).
    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.devices
            .iter()
            .filter_map(|d| DeviceId::new(d.as_str()).ok())
            .collect()
    }

    /// Validate watcher configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for (i, device) in self.devices.iter().enumerate() {
            let field = format!("watcher.devices[{}]", i);
            if let Err(e) = DeviceId::new(device.as_str()) {
                errors.push(ValidationError {
                    field,
                    message: e.to_string(),
                });
            } else if !seen.insert(device.as_str()) {
                errors.push(ValidationError {
                    field,
                    message: format!("duplicate device '{}'", device),
                });
            }
        }
        if self.enabled && self.devices.is_empty() {
            errors.push(ValidationError {
                field: "watcher.devices".to_string(),
                message: "at least one device is required when the watcher is enabled"
                    .to_string(),
            });
        }
        errors
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `server.bind` or `watcher.devices[0]`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gasmon")
        .join("service.toml")
}
