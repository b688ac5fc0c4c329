//! History command implementation.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use gasmon_core::{DataStore, DeviceId, Reading, load_review};

use crate::cli::OutputFormat;
use crate::format::{FormatOptions, format_history_csv, format_history_json, format_history_text};
use crate::style;
use crate::util::{Target, write_output};

/// Arguments for the history command.
pub struct HistoryArgs<'a> {
    pub target: Target,
    pub all: bool,
    pub format: OutputFormat,
    pub output: Option<&'a PathBuf>,
    pub quiet: bool,
    pub opts: &'a FormatOptions,
}

/// Read the history once, newest first.
///
/// Without `all`, only readings at or above the stored warn threshold are
/// returned.
pub async fn fetch_history(
    store: &dyn DataStore,
    device: &DeviceId,
    timeout: Duration,
    all: bool,
) -> Result<Vec<Reading>> {
    if !all {
        return Ok(load_review(store, device, timeout).await);
    }

    let mut sub = store.subscribe_history(device, None).await?;
    let mut history = sub.first(timeout).await.context("Failed to read history")?;
    sub.close();
    history.sort_by_key(|r| std::cmp::Reverse(r.timestamp));
    Ok(history)
}

pub async fn cmd_history(args: HistoryArgs<'_>) -> Result<()> {
    let HistoryArgs {
        target,
        all,
        format,
        output,
        quiet,
        opts,
    } = args;

    let show_progress = !quiet && matches!(format, OutputFormat::Text);
    let spinner = show_progress
        .then(|| style::operation_spinner(&format!("Reading history for {}...", target.device)));

    let history = fetch_history(target.store.as_ref(), &target.device, target.timeout, all).await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let history = history?;

    let content = match format {
        OutputFormat::Json => format_history_json(&history)?,
        OutputFormat::Text => format_history_text(&target.device, &history, !all, opts),
        OutputFormat::Csv => format_history_csv(&history, opts),
    };

    write_output(output, &content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gasmon_core::{MockStore, ThresholdConfig};

    fn reading(ts: i64, index: f64) -> Reading {
        Reading::builder().timestamp(ts).index(index).build()
    }

    async fn seeded() -> (MockStore, DeviceId) {
        let store = MockStore::new();
        let device = DeviceId::default();
        for (ts, index) in [(1, 10.0), (2, 40.0), (3, 70.0), (4, 20.0)] {
            store.push_history(&device, &reading(ts, index)).await.unwrap();
        }
        (store, device)
    }

    #[tokio::test]
    async fn test_fetch_notable_newest_first() {
        let (store, device) = seeded().await;
        let history = fetch_history(&store, &device, Duration::from_secs(1), false)
            .await
            .unwrap();
        let stamps: Vec<i64> = history.iter().map(|r| r.timestamp).collect();
        assert_eq!(stamps, vec![3, 2]);
    }

    #[tokio::test]
    async fn test_fetch_uses_stored_warn() {
        let (store, device) = seeded().await;
        store
            .set_config(&device, &ThresholdConfig { warn: 15.0, alert: 50.0 })
            .await
            .unwrap();
        let history = fetch_history(&store, &device, Duration::from_secs(1), false)
            .await
            .unwrap();
        assert_eq!(history.len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_all() {
        let (store, device) = seeded().await;
        let history = fetch_history(&store, &device, Duration::from_secs(1), true)
            .await
            .unwrap();
        let stamps: Vec<i64> = history.iter().map(|r| r.timestamp).collect();
        assert_eq!(stamps, vec![4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn test_fetch_empty_history() {
        let store = MockStore::new();
        let history = fetch_history(&store, &DeviceId::default(), Duration::from_secs(1), false)
            .await
            .unwrap();
        assert!(history.is_empty());
    }
}
