//! Config command implementation: stored thresholds and the local file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use gasmon_core::{DeviceId, SettingsForm, ThresholdConfig};

use crate::cli::{ConfigAction, StoreArgs};
use crate::config::Config;
use crate::format::{FormatOptions, format_thresholds_text};
use crate::style;
use crate::util::{Target, open_store, write_output};

/// Values to apply on top of the stored thresholds.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdEdit {
    pub warn: Option<f64>,
    pub alert: Option<f64>,
    pub reset: bool,
}

pub async fn cmd_config(
    action: ConfigAction,
    config: &Config,
    output: Option<&PathBuf>,
    quiet: bool,
    opts: &FormatOptions,
) -> Result<()> {
    match action {
        ConfigAction::Show { store } => show(&store, config, output, quiet, opts).await,
        ConfigAction::Set { store, warn, alert } => {
            if warn.is_none() && alert.is_none() {
                bail!("Nothing to change. Pass --warn and/or --alert.");
            }
            let target = open_store(&store, config)?;
            let edit = ThresholdEdit {
                warn,
                alert,
                reset: false,
            };
            apply(&target, edit, quiet, opts).await.map(|_| ())
        }
        ConfigAction::Reset { store } => {
            let target = open_store(&store, config)?;
            let edit = ThresholdEdit {
                reset: true,
                ..Default::default()
            };
            apply(&target, edit, quiet, opts).await.map(|_| ())
        }
        ConfigAction::Path => {
            println!("{}", Config::path().display());
            Ok(())
        }
        ConfigAction::Init {
            database_url,
            device,
            force,
        } => {
            let path = Config::path();
            init_config(&path, database_url, device, force)?;
            if !quiet {
                eprintln!(
                    "{}",
                    style::format_success(
                        &format!("Wrote {}", path.display()),
                        opts.no_color
                    )
                );
            }
            Ok(())
        }
    }
}

async fn show(
    args: &StoreArgs,
    config: &Config,
    output: Option<&PathBuf>,
    quiet: bool,
    opts: &FormatOptions,
) -> Result<()> {
    let target = open_store(args, config)?;
    let spinner = (!quiet).then(|| style::operation_spinner("Reading thresholds..."));

    let stored = async {
        let mut sub = target.store.subscribe_config(&target.device).await?;
        let value = sub.first(target.timeout).await;
        sub.close();
        value
    }
    .await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let stored = stored.context("Failed to read thresholds")?;

    let content = format_thresholds_text(
        &target.device,
        &stored.unwrap_or_default(),
        stored.is_some(),
        opts,
    );
    write_output(output, &content)
}

/// Load the form, apply `edit` and save. Fails when the save is rejected.
pub async fn apply(
    target: &Target,
    edit: ThresholdEdit,
    quiet: bool,
    opts: &FormatOptions,
) -> Result<ThresholdConfig> {
    let mut form = SettingsForm::new();
    if edit.reset {
        form.reset_defaults();
    } else {
        form.load(target.store.as_ref(), &target.device, target.timeout)
            .await;
        if let Some(message) = form.message.take() {
            // A partial edit would silently combine with the defaults.
            if edit.warn.is_none() || edit.alert.is_none() {
                bail!("{}", message.text());
            }
        }
        if let Some(warn) = edit.warn {
            form.warn = warn;
        }
        if let Some(alert) = edit.alert {
            form.alert = alert;
        }
    }

    let saved = form.save(target.store.as_ref(), &target.device).await;
    let message = form
        .message
        .as_ref()
        .map(|m| m.text().to_string())
        .unwrap_or_default();
    if !saved {
        bail!("{}", message);
    }

    if !quiet {
        eprintln!(
            "{}",
            style::format_success(
                &format!(
                    "{} {}: WARN {} / ALERT {}",
                    message, target.device, form.warn, form.alert
                ),
                opts.no_color
            )
        );
    }
    Ok(ThresholdConfig {
        warn: form.warn,
        alert: form.alert,
    })
}

/// Write a fresh local configuration file at `path`.
pub fn init_config(
    path: &Path,
    database_url: Option<String>,
    device: Option<String>,
    force: bool,
) -> Result<Config> {
    if path.exists() && !force {
        bail!(
            "{} already exists. Use --force to overwrite.",
            path.display()
        );
    }
    if let Some(device) = &device {
        DeviceId::new(device.as_str())
            .with_context(|| format!("Invalid device id '{}'", device))?;
    }

    let config = Config {
        database_url,
        device,
        ..Default::default()
    };
    config.save_to(path)?;
    Ok(config)
}
