//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

/// Visual styling mode for output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum StyleMode {
    /// Rich styling with tables and colors (default)
    #[default]
    Rich,
    /// Plain text with no decorations (for scripting)
    Plain,
}

/// Reusable store connection arguments
#[derive(Debug, Clone, Args)]
pub struct StoreArgs {
    /// Device id, or use GASMON_DEVICE env var
    #[arg(short, long, env = "GASMON_DEVICE")]
    pub device: Option<String>,

    /// Realtime database URL, or use GASMON_DATABASE_URL env var
    #[arg(long, env = "GASMON_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Database auth token, or use GASMON_DATABASE_AUTH env var
    #[arg(long, env = "GASMON_DATABASE_AUTH", hide_env_values = true)]
    pub auth: Option<String>,

    /// Timeout in seconds for one-shot reads
    #[arg(short = 'T', long, default_value = "5")]
    pub timeout: u64,
}

#[derive(Parser)]
#[command(name = "gasmon")]
#[command(author, version, about = "Gas monitor dashboard, history and threshold tool", long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Visual styling mode (rich, plain)
    #[arg(
        long,
        global = true,
        value_enum,
        default_value = "rich",
        env = "GASMON_STYLE"
    )]
    pub style: StyleMode,

    /// Write output to file instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Live dashboard with audible alarm (keys: e=sound, s=stop, t=test, q=quit)
    Watch {
        #[command(flatten)]
        store: StoreArgs,

        /// Run against an in-memory store fed by the simulator
        #[arg(long)]
        demo: bool,

        /// Enable the alarm sound at startup
        #[arg(long)]
        sound: bool,

        /// Output format for each update
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List readings at or above the warn threshold, newest first
    History {
        #[command(flatten)]
        store: StoreArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Include every reading, not only those at or above warn
        #[arg(long)]
        all: bool,

        /// Omit header row in CSV output (useful for appending)
        #[arg(long)]
        no_header: bool,
    },

    /// Manage alert thresholds and the local configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Write simulated readings, standing in for the sensor
    Simulate {
        #[command(flatten)]
        store: StoreArgs,

        /// Seconds between readings
        #[arg(short, long, default_value = "2")]
        interval: u64,

        /// Number of readings to write before exiting (0 for unlimited)
        #[arg(short = 'n', long, default_value = "0")]
        count: u32,

        /// Shape of the simulated signal
        #[arg(short, long, value_enum, default_value = "wave")]
        pattern: Pattern,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Simulated signal shapes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Pattern {
    /// Clean air with small fluctuations
    Calm,
    /// Slow rise and fall through every band
    #[default]
    Wave,
    /// Mostly calm with short bursts into ALERT
    Spike,
}

/// Configuration subcommands
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the thresholds stored for a device
    Show {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Save new thresholds (missing values keep their current setting)
    Set {
        #[command(flatten)]
        store: StoreArgs,

        /// Index at which the status becomes WARN (1-99)
        #[arg(short, long)]
        warn: Option<f64>,

        /// Index at which the status becomes ALERT (1-100, above warn)
        #[arg(short, long)]
        alert: Option<f64>,
    },

    /// Restore the default thresholds (35 / 60) and save them
    Reset {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Show configuration file path
    Path,

    /// Write the local configuration file
    Init {
        /// Realtime database URL to remember
        #[arg(long)]
        database_url: Option<String>,

        /// Default device id to remember
        #[arg(short, long)]
        device: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbose_counts() {
        let cli = Cli::try_parse_from(["gasmon", "-vv", "config", "path"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Path
            }
        ));
    }

    #[test]
    fn test_config_set_parses_partial() {
        let cli = Cli::try_parse_from([
            "gasmon", "config", "set", "--warn", "30", "--device", "kitchen",
        ])
        .unwrap();
        match cli.command {
            Commands::Config {
                action: ConfigAction::Set { store, warn, alert },
            } => {
                assert_eq!(warn, Some(30.0));
                assert_eq!(alert, None);
                assert_eq!(store.device.as_deref(), Some("kitchen"));
            }
            _ => panic!("expected config set"),
        }
    }

    #[test]
    fn test_watch_demo_flags() {
        let cli = Cli::try_parse_from(["gasmon", "watch", "--demo", "--sound"]).unwrap();
        match cli.command {
            Commands::Watch {
                demo, sound, format, ..
            } => {
                assert!(demo);
                assert!(sound);
                assert_eq!(format, OutputFormat::Text);
            }
            _ => panic!("expected watch"),
        }
    }

    #[test]
    fn test_simulate_defaults() {
        let cli = Cli::try_parse_from(["gasmon", "simulate"]).unwrap();
        match cli.command {
            Commands::Simulate {
                interval,
                count,
                pattern,
                ..
            } => {
                assert_eq!(interval, 2);
                assert_eq!(count, 0);
                assert_eq!(pattern, Pattern::Wave);
            }
            _ => panic!("expected simulate"),
        }
    }
}
