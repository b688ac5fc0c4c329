use std::io;
use std::time::Duration;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

mod audio;
mod cli;
mod commands;
mod config;
mod format;
mod style;
mod util;

use cli::{Cli, Commands};
use commands::{HistoryArgs, SimulateArgs, Source, WatchArgs};
use config::{Config, resolve_device};
use format::FormatOptions;
use util::open_store;

fn log_filter(quiet: bool, verbose: u8) -> EnvFilter {
    if quiet {
        return EnvFilter::new("error");
    }
    match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle completions command early (before tracing init)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "gasmon", &mut io::stdout());
        return Ok(());
    }

    // Logs go to stderr so they never mix with command output.
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.quiet, cli.verbose))
        .with_writer(io::stderr)
        .init();

    let config = Config::load();
    let no_color = cli.no_color || config.no_color;
    let opts = FormatOptions::new(no_color, cli.style);
    let output = cli.output.as_ref();
    let quiet = cli.quiet;

    match cli.command {
        Commands::Watch {
            store,
            demo,
            sound,
            format,
        } => {
            let (source, device) = if demo {
                (Source::Demo, resolve_device(store.device.as_deref(), &config)?)
            } else {
                let target = open_store(&store, &config)?;
                (Source::Store(target.store), target.device)
            };
            commands::cmd_watch(WatchArgs {
                source,
                device,
                sound: sound || config.sound,
                format,
                output,
                quiet,
                opts: &opts,
            })
            .await?;
        }
        Commands::History {
            store,
            format,
            all,
            no_header,
        } => {
            let opts = opts.with_no_header(no_header);
            commands::cmd_history(HistoryArgs {
                target: open_store(&store, &config)?,
                all,
                format,
                output,
                quiet,
                opts: &opts,
            })
            .await?;
        }
        Commands::Config { action } => {
            commands::cmd_config(action, &config, output, quiet, &opts).await?;
        }
        Commands::Simulate {
            store,
            interval,
            count,
            pattern,
        } => {
            let target = open_store(&store, &config)?;
            commands::cmd_simulate(SimulateArgs {
                store: target.store,
                device: target.device,
                interval: Duration::from_secs(interval.max(1)),
                count,
                pattern,
                quiet,
                no_color: opts.no_color,
            })
            .await?;
        }
        // Generated before logging starts.
        Commands::Completions { .. } => {}
    }

    Ok(())
}
