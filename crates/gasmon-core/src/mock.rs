//! In-memory store for testing and demos.
//!
//! [`MockStore`] implements [`DataStore`] on top of `tokio::sync::watch`
//! channels, so subscribers see the same "full value on every change"
//! behaviour as the realtime store without any network.
//!
//! # Features
//!
//! - **Failure injection**: make every operation fail, or only config reads
//! - **Write counting**: assert how many writes reached the store
//! - **Snapshots**: read back what was written without subscribing

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::{RwLock, watch};

use gasmon_types::{ConfigPatch, DeviceId, Reading, ThresholdConfig};

use crate::error::{Error, Result};
use crate::streaming::{DEFAULT_BUFFER, Subscription};
use crate::traits::DataStore;

struct DeviceData {
    latest: watch::Sender<Option<Reading>>,
    history: watch::Sender<Vec<Reading>>,
    config: watch::Sender<Option<ThresholdConfig>>,
}

impl DeviceData {
    fn new() -> Self {
        Self {
            latest: watch::Sender::new(None),
            history: watch::Sender::new(Vec::new()),
            config: watch::Sender::new(None),
        }
    }
}

/// An in-memory realtime store.
///
/// ```
/// use gasmon_core::{DataStore, MockStore};
/// use gasmon_types::{DeviceId, Reading};
///
/// #[tokio::main]
/// async fn main() {
///     let store = MockStore::new();
///     let device = DeviceId::default();
///     store.set_latest(&device, &Reading::builder().index(42.0).build()).await.unwrap();
///
///     let mut latest = store.subscribe_latest(&device).await.unwrap();
///     let first = latest.recv().await.unwrap().unwrap();
///     assert_eq!(first.map(|r| r.index), Some(42.0));
/// }
/// ```
#[derive(Default)]
pub struct MockStore {
    devices: RwLock<HashMap<DeviceId, Arc<DeviceData>>>,
    should_fail: AtomicBool,
    fail_message: RwLock<String>,
    config_error: RwLock<Option<String>>,
    write_count: AtomicU32,
}

impl std::fmt::Debug for MockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStore")
            .field("should_fail", &self.should_fail.load(Ordering::Relaxed))
            .field("write_count", &self.write_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl MockStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with `message` (or succeed again).
    pub async fn set_should_fail(&self, fail: bool, message: Option<&str>) {
        self.should_fail.store(fail, Ordering::SeqCst);
        if let Some(msg) = message {
            *self.fail_message.write().await = msg.to_string();
        }
    }

    /// Make config subscriptions deliver an error instead of a value.
    pub async fn set_config_error(&self, message: Option<&str>) {
        *self.config_error.write().await = message.map(str::to_string);
    }

    /// Number of successful writes.
    pub fn write_count(&self) -> u32 {
        self.write_count.load(Ordering::SeqCst)
    }

    /// Current config value, without subscribing.
    pub async fn config(&self, device: &DeviceId) -> Option<ThresholdConfig> {
        *self.slot(device).await.config.borrow()
    }

    /// Current history, in insertion order.
    pub async fn history(&self, device: &DeviceId) -> Vec<Reading> {
        self.slot(device).await.history.borrow().clone()
    }

    async fn slot(&self, device: &DeviceId) -> Arc<DeviceData> {
        if let Some(data) = self.devices.read().await.get(device) {
            return Arc::clone(data);
        }
        let mut devices = self.devices.write().await;
        Arc::clone(
            devices
                .entry(device.clone())
                .or_insert_with(|| Arc::new(DeviceData::new())),
        )
    }

    async fn check_should_fail(&self) -> Result<()> {
        if self.should_fail.load(Ordering::SeqCst) {
            let msg = self.fail_message.read().await.clone();
            return Err(Error::Mock(if msg.is_empty() {
                "injected failure".to_string()
            } else {
                msg
            }));
        }
        Ok(())
    }

    fn record_write(&self) {
        self.write_count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Forward every value of a watch channel into a new subscription.
fn forward<T, U, F>(path: String, mut rx: watch::Receiver<T>, project: F) -> Subscription<U>
where
    T: Send + Sync + 'static,
    U: Send + 'static,
    F: Fn(&T) -> U + Send + 'static,
{
    let (tx, sub) = Subscription::channel(path, DEFAULT_BUFFER);
    tokio::spawn(async move {
        loop {
            let value = {
                let current = rx.borrow_and_update();
                project(&current)
            };
            if !tx.send(value).await {
                break;
            }
            tokio::select! {
                _ = tx.closed() => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    });
    sub
}

/// Newest `limit` entries in insertion order, then sorted by timestamp.
fn window(history: &[Reading], limit: Option<usize>) -> Vec<Reading> {
    let start = limit.map_or(0, |n| history.len().saturating_sub(n));
    let mut entries = history[start..].to_vec();
    entries.sort_by_key(|r| r.timestamp);
    entries
}

#[async_trait]
impl DataStore for MockStore {
    async fn subscribe_latest(&self, device: &DeviceId) -> Result<Subscription<Option<Reading>>> {
        self.check_should_fail().await?;
        let slot = self.slot(device).await;
        Ok(forward(device.latest_path(), slot.latest.subscribe(), Clone::clone))
    }

    async fn subscribe_history(
        &self,
        device: &DeviceId,
        limit: Option<usize>,
    ) -> Result<Subscription<Vec<Reading>>> {
        self.check_should_fail().await?;
        let slot = self.slot(device).await;
        Ok(forward(
            device.history_path(),
            slot.history.subscribe(),
            move |history: &Vec<Reading>| window(history, limit),
        ))
    }

    async fn subscribe_config(
        &self,
        device: &DeviceId,
    ) -> Result<Subscription<Option<ThresholdConfig>>> {
        self.check_should_fail().await?;
        if let Some(message) = self.config_error.read().await.clone() {
            let (tx, sub) = Subscription::channel(device.config_path(), 1);
            tx.send_error(Error::Mock(message)).await;
            return Ok(sub);
        }
        let slot = self.slot(device).await;
        Ok(forward(device.config_path(), slot.config.subscribe(), |c| *c))
    }

    async fn set_config(&self, device: &DeviceId, config: &ThresholdConfig) -> Result<()> {
        self.check_should_fail().await?;
        self.slot(device).await.config.send_replace(Some(*config));
        self.record_write();
        Ok(())
    }

    async fn update_config(&self, device: &DeviceId, patch: &ConfigPatch) -> Result<()> {
        self.check_should_fail().await?;
        self.slot(device).await.config.send_modify(|current| {
            *current = Some(current.unwrap_or_default().merged(patch));
        });
        self.record_write();
        Ok(())
    }

    async fn set_latest(&self, device: &DeviceId, reading: &Reading) -> Result<()> {
        self.check_should_fail().await?;
        self.slot(device).await.latest.send_replace(Some(reading.clone()));
        self.record_write();
        Ok(())
    }

    async fn push_history(&self, device: &DeviceId, reading: &Reading) -> Result<()> {
        self.check_should_fail().await?;
        self.slot(device)
            .await
            .history
            .send_modify(|history| history.push(reading.clone()));
        self.record_write();
        Ok(())
    }
}
