//! Alert hook service for the gas monitor.
//!
//! This crate provides a service that:
//! - Accepts write events for a device's `latest` slot over HTTP
//! - Optionally watches the realtime database itself
//! - Sends one chat notification per transition into ALERT
//! - Exposes hook counters and watcher state
//!
//! # REST API Endpoints
//!
//! - `GET /api/health` - Service health check (no secret required)
//! - `GET /api/status` - Hook counters and watcher state
//! - `POST /api/hooks/latest` - Write event `{ device_id?, before?, after? }`
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/gasmon/service.toml`:
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8080"
//!
//! [database]
//! url = "https://my-project-default-rtdb.firebaseio.com"
//!
//! [telegram]
//! chat_id = "-1001234567890"
//!
//! [watcher]
//! enabled = true
//! devices = ["esp32_01"]
//! ```
//!
//! Secrets are better kept in the environment: `GASMON_TELEGRAM_TOKEN`,
//! `GASMON_TELEGRAM_CHAT_ID`, `GASMON_DATABASE_AUTH` and
//! `GASMON_HOOK_SECRET` override the file.
//!
//! # Security
//!
//! When `hook.secret` is set, every request except `/api/health` must carry
//! it in the `X-Hook-Secret` header.

pub mod api;
pub mod config;
pub mod debounce;
pub mod middleware;
pub mod notifier;
pub mod state;
pub mod watcher;

pub use config::{
    Config, ConfigError, DatabaseConfig, HookConfig, ServerConfig, TelegramConfig, WatcherConfig,
};
pub use debounce::{Debouncer, format_alert_message, should_notify};
pub use notifier::{DisabledNotifier, Notifier, NotifyError, TelegramNotifier};
pub use state::{AppState, HookOutcome, HookStats, HookStatsSnapshot};
pub use watcher::Watcher;
