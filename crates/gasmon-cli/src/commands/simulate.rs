//! Simulate command implementation.
//!
//! Writes readings the way the sensor firmware does: every sample replaces
//! `latest` and is appended to `history`, with the status computed on the
//! device side from the thresholds it last read. That lets the dashboard,
//! the history review and the alert hook run without hardware.

use std::f64::consts::TAU;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use gasmon_core::{DataStore, DeviceId, Reading, ThresholdConfig, classify};

use crate::cli::Pattern;
use crate::style;

/// Full-scale value of the sensor's 12-bit ADC.
pub const ADC_MAX: f64 = 4095.0;

/// Samples per wave cycle.
const WAVE_PERIOD: u32 = 40;

/// Samples between spikes, and spike length.
const SPIKE_EVERY: u32 = 25;
const SPIKE_LENGTH: u32 = 4;

/// Index produced by `pattern` at sample `step`.
pub fn sample_index(pattern: Pattern, step: u32) -> f64 {
    // Small deterministic jitter so flat stretches still move.
    let jitter = ((step.wrapping_mul(7919) % 13) as f64 - 6.0) * 0.25;
    let index = match pattern {
        Pattern::Calm => 12.0 + jitter,
        Pattern::Wave => {
            let phase = f64::from(step % WAVE_PERIOD) / f64::from(WAVE_PERIOD);
            47.5 - 42.5 * (TAU * phase).cos() + jitter
        }
        Pattern::Spike => {
            if step % SPIKE_EVERY >= SPIKE_EVERY - SPIKE_LENGTH {
                82.0 + jitter
            } else {
                15.0 + jitter
            }
        }
    };
    index.clamp(0.0, 100.0)
}

/// Build the reading the device would publish for `index` at `at`.
pub fn device_reading(index: f64, config: ThresholdConfig, at: OffsetDateTime) -> Reading {
    let index = (index * 10.0).round() / 10.0;
    Reading::builder()
        .captured_at(at)
        .raw_value((index / 100.0 * ADC_MAX).round())
        .index(index)
        .status(classify(index, &config))
        .thresholds(config)
        .build()
}

/// Arguments for the simulate command.
pub struct SimulateArgs {
    pub store: Arc<dyn DataStore>,
    pub device: DeviceId,
    pub interval: Duration,
    pub count: u32,
    pub pattern: Pattern,
    pub quiet: bool,
    pub no_color: bool,
}

/// Run the simulator until `count` readings are written or `cancel` fires.
pub async fn run_simulator(args: SimulateArgs, cancel: CancellationToken) -> Result<u32> {
    let SimulateArgs {
        store,
        device,
        interval,
        count,
        pattern,
        quiet,
        no_color,
    } = args;

    // The device follows config changes; a failed subscription falls back
    // to the defaults.
    let mut config = ThresholdConfig::default();
    let mut config_sub = match store.subscribe_config(&device).await {
        Ok(sub) => Some(sub),
        Err(e) => {
            warn!("Config subscription failed, using defaults: {}", e);
            None
        }
    };

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut written = 0u32;

    loop {
        if count > 0 && written >= count {
            break;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            update = next_config(&mut config_sub) => {
                match update {
                    Some(Ok(Some(new_config))) => {
                        debug!("Simulator picked up thresholds {}/{}", new_config.warn, new_config.alert);
                        config = new_config;
                    }
                    Some(Ok(None)) => config = ThresholdConfig::default(),
                    Some(Err(e)) => warn!("Config stream error: {}", e),
                    None => config_sub = None,
                }
            }
            _ = ticker.tick() => {
                let reading = device_reading(
                    sample_index(pattern, written),
                    config,
                    OffsetDateTime::now_utc(),
                );
                store.set_latest(&device, &reading).await?;
                store.push_history(&device, &reading).await?;
                written += 1;
                if !quiet {
                    eprintln!(
                        "{} {} index {:.1} adc {:.0}",
                        device,
                        style::format_status_badge(reading.status, no_color),
                        reading.index,
                        reading.raw_value
                    );
                }
            }
        }
    }

    Ok(written)
}

async fn next_config(
    sub: &mut Option<gasmon_core::Subscription<Option<ThresholdConfig>>>,
) -> Option<gasmon_core::Result<Option<ThresholdConfig>>> {
    match sub {
        Some(sub) => sub.recv().await,
        None => std::future::pending().await,
    }
}

/// `gasmon simulate` entry point.
pub async fn cmd_simulate(args: SimulateArgs) -> Result<()> {
    let quiet = args.quiet;
    let no_color = args.no_color;
    let device = args.device.clone();
    if !quiet {
        eprintln!(
            "Simulating {} every {}s | Press Ctrl+C to stop",
            device,
            args.interval.as_secs_f64()
        );
    }

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let written = run_simulator(args, cancel).await;
    ctrl_c.abort();
    let written = written?;

    if !quiet {
        eprintln!(
            "{}",
            style::format_success(&format!("Wrote {} reading(s) for {}", written, device), no_color)
        );
    }
    Ok(())
}
