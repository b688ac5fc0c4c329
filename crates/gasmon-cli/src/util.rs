//! Shared helpers for commands.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use gasmon_core::{DataStore, DeviceId, RtdbClient};

use crate::cli::StoreArgs;
use crate::config::{Config, resolve_database, resolve_device, resolve_timeout};

/// A connected store plus the device the command works on.
pub struct Target {
    pub store: Arc<dyn DataStore>,
    pub device: DeviceId,
    pub timeout: Duration,
}

/// Resolve flags and config into a realtime database connection.
pub fn open_store(args: &StoreArgs, config: &Config) -> Result<Target> {
    let device = resolve_device(args.device.as_deref(), config)?;
    let Some(database) = resolve_database(args, config) else {
        bail!(
            "No database configured.\n\n\
             Provide one with:\n  \
             --database-url https://<project>.firebaseio.com\n  \
             GASMON_DATABASE_URL environment variable\n  \
             gasmon config init --database-url <url>"
        );
    };
    let client = RtdbClient::new(&database.url, database.auth)
        .with_context(|| format!("Invalid database URL '{}'", database.url))?;
    tracing::debug!("Using database {} for {}", client.base_url(), device);

    Ok(Target {
        store: Arc::new(client),
        device,
        timeout: Duration::from_secs(resolve_timeout(args.timeout, config)),
    })
}

/// Write output to file or stdout
pub fn write_output(output: Option<&PathBuf>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write to {}", path.display()))?;
        }
        None => {
            print!("{}", content);
            io::stdout().flush()?;
        }
    }
    Ok(())
}

/// Append output to file or write it to stdout (for streaming commands).
pub fn append_output(output: Option<&PathBuf>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            file.write_all(content.as_bytes())
                .with_context(|| format!("Failed to write to {}", path.display()))?;
        }
        None => {
            print!("{}", content);
            io::stdout().flush()?;
        }
    }
    Ok(())
}
