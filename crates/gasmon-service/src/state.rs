//! Application state shared across handlers and the watcher.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::{RwLock, watch};
use tracing::{error, info};

use gasmon_core::{DeviceId, Reading};

use crate::config::Config;
use crate::debounce::{format_alert_message, should_notify};
use crate::notifier::{NotifyError, Notifier};

/// Shared application state.
pub struct AppState {
    /// Configuration, secrets already resolved.
    pub config: Config,
    /// Where alert messages go.
    pub notifier: Arc<dyn Notifier>,
    /// Hook counters.
    pub stats: HookStats,
    /// Watcher control state.
    pub watcher: WatcherState,
}

impl AppState {
    /// Create new application state.
    pub fn new(config: Config, notifier: Arc<dyn Notifier>) -> Arc<Self> {
        Arc::new(Self {
            config,
            notifier,
            stats: HookStats::default(),
            watcher: WatcherState::new(),
        })
    }

    /// Apply the debounce rule to one write and notify if it is an alert edge.
    ///
    /// Both hook entry points go through here. A failed send is logged and
    /// counted; it is never retried.
    pub async fn handle_write(
        &self,
        device: &DeviceId,
        before: Option<&Reading>,
        after: Option<&Reading>,
    ) -> HookOutcome {
        self.stats.events.fetch_add(1, Ordering::Relaxed);

        let Some(reading) = after.filter(|_| should_notify(before, after)) else {
            return HookOutcome::Skipped;
        };

        info!(
            "ALERT edge on {} (index {}), notifying",
            device,
            reading.index
        );
        let text = format_alert_message(device, reading);
        match self.notifier.send(&text).await {
            Ok(()) => {
                self.stats.record_sent();
                HookOutcome::Notified
            }
            Err(e) => {
                error!("Failed to notify alert on {}: {}", device, e);
                self.stats.record_failure(&e).await;
                HookOutcome::Failed(e.to_string())
            }
        }
    }
}

/// Result of one hook invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    /// Not an alert edge.
    Skipped,
    /// Notification delivered.
    Notified,
    /// Notification attempted and failed.
    Failed(String),
}

/// Hook counters.
#[derive(Debug, Default)]
pub struct HookStats {
    /// Writes seen by either entry point.
    pub events: AtomicU64,
    /// Notifications delivered.
    pub notifications_sent: AtomicU64,
    /// Notifications that failed.
    pub notification_failures: AtomicU64,
    /// Unix time of the last delivered notification (0 = never).
    last_sent_at: AtomicU64,
    last_error: RwLock<Option<String>>,
}

impl HookStats {
    fn record_sent(&self) {
        self.notifications_sent.fetch_add(1, Ordering::Relaxed);
        let now = OffsetDateTime::now_utc().unix_timestamp() as u64;
        self.last_sent_at.store(now, Ordering::Relaxed);
    }

    async fn record_failure(&self, error: &NotifyError) {
        self.notification_failures.fetch_add(1, Ordering::Relaxed);
        *self.last_error.write().await = Some(error.to_string());
    }

    /// Time of the last delivered notification.
    pub fn last_sent_at(&self) -> Option<OffsetDateTime> {
        match self.last_sent_at.load(Ordering::Relaxed) {
            0 => None,
            ts => OffsetDateTime::from_unix_timestamp(ts as i64).ok(),
        }
    }

    /// Point-in-time copy for the status endpoint.
    pub async fn snapshot(&self) -> HookStatsSnapshot {
        HookStatsSnapshot {
            events: self.events.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            notification_failures: self.notification_failures.load(Ordering::Relaxed),
            last_sent_at: self.last_sent_at(),
            last_error: self.last_error.read().await.clone(),
        }
    }
}

/// Serializable view of [`HookStats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HookStatsSnapshot {
    pub events: u64,
    pub notifications_sent: u64,
    pub notification_failures: u64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_sent_at: Option<OffsetDateTime>,
    pub last_error: Option<String>,
}

/// State for tracking and stopping the watcher.
pub struct WatcherState {
    running: AtomicBool,
    started_at: AtomicU64,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
}

impl WatcherState {
    /// Create a new watcher state.
    pub fn new() -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            running: AtomicBool::new(false),
            started_at: AtomicU64::new(0),
            stop_tx,
            stop_rx,
        }
    }

    /// Check if the watcher is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Mark the watcher as started or stopped.
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
        if running {
            let now = OffsetDateTime::now_utc().unix_timestamp() as u64;
            self.started_at.store(now, Ordering::SeqCst);
        }
    }

    /// Get the watcher start time.
    pub fn started_at(&self) -> Option<OffsetDateTime> {
        match self.started_at.load(Ordering::SeqCst) {
            0 => None,
            ts => OffsetDateTime::from_unix_timestamp(ts as i64).ok(),
        }
    }

    /// Get a receiver for the stop signal.
    pub fn subscribe_stop(&self) -> watch::Receiver<bool> {
        self.stop_rx.clone()
    }

    /// Signal all watcher tasks to stop.
    pub fn signal_stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

impl Default for WatcherState {
    fn default() -> Self {
        Self::new()
    }
}
