//! Command-line interface for the gas concentration monitor.
//!
//! The sensor publishes readings to a Firebase Realtime Database; this CLI
//! reads them back, raises an audible alarm and edits the alert thresholds.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `watch` | Live dashboard with the alarm (keys: e, s, t, q) |
//! | `history` | Readings at or above the warn threshold, newest first |
//! | `config show` / `set` / `reset` | Read and write the stored thresholds |
//! | `config path` / `init` | Local configuration file |
//! | `simulate` | Write simulated sensor readings |
//! | `completions` | Generate shell completions |
//!
//! # Output Formats
//!
//! - **Text** (default): Human-readable colored output
//! - **JSON**: Machine-readable JSON format
//! - **CSV**: Comma-separated values for spreadsheets and data analysis
//!
//! # Configuration
//!
//! The CLI stores configuration in `~/.config/gasmon/config.toml`:
//!
//! - `database_url`: Realtime database URL
//! - `auth`: Database auth token
//! - `device`: Default device id (`esp32_01` when unset)
//! - `no_color`: Disable colored output
//! - `sound`: Enable the alarm sound when `watch` starts
//! - `timeout`: Timeout for one-shot reads in seconds
//!
//! # Environment Variables
//!
//! - `GASMON_DATABASE_URL`, `GASMON_DATABASE_AUTH`, `GASMON_DEVICE`
//! - `GASMON_STYLE`: `rich` or `plain`
//! - `NO_COLOR`: Disable colored output when set
//!
//! # Examples
//!
//! Try the dashboard without hardware:
//! ```bash
//! gasmon watch --demo --sound
//! ```
//!
//! Export notable readings as CSV:
//! ```bash
//! gasmon history --database-url https://my-project.firebaseio.com --format csv --output alerts.csv
//! ```
//!
//! Lower the alert threshold:
//! ```bash
//! gasmon config set --alert 50
//! ```

// This crate is primarily a binary; the library target only carries the
// documentation above and re-exports the core crate.
pub use gasmon_core;
