//! Command implementations for the CLI.

mod config;
mod history;
pub mod simulate;
mod watch;

pub use config::cmd_config;
pub use history::{HistoryArgs, cmd_history};
pub use simulate::{SimulateArgs, cmd_simulate};
pub use watch::{Source, WatchArgs, cmd_watch};
