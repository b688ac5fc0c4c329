//! Trait abstraction over the realtime store.
//!
//! [`DataStore`] covers everything the monitor needs from the store: live
//! subscriptions to a device's latest reading, history and config, plus the
//! writes used by the settings form and the device simulator. The REST
//! client ([`RtdbClient`](crate::rtdb::RtdbClient)) and the in-memory
//! [`MockStore`](crate::mock::MockStore) both implement it.

use async_trait::async_trait;

use gasmon_types::{ConfigPatch, DeviceId, Reading, ThresholdConfig};

use crate::error::Result;
use crate::streaming::Subscription;

/// Access to a device's data in the realtime store.
///
/// Subscriptions deliver the complete current value of their path each time
/// it changes, starting with the value present when the subscription opens.
/// A path with no value yields `None` (or an empty history).
///
/// # Example
///
/// ```ignore
/// use gasmon_core::{DataStore, DeviceId, Result};
///
/// async fn print_latest<S: DataStore>(store: &S) -> Result<()> {
///     let device = DeviceId::default();
///     let mut latest = store.subscribe_latest(&device).await?;
///     if let Some(Ok(Some(reading))) = latest.recv().await {
///         println!("index {}", reading.index);
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait DataStore: Send + Sync {
    // --- Subscriptions ---

    /// Subscribe to `devices/{id}/latest`.
    async fn subscribe_latest(&self, device: &DeviceId) -> Result<Subscription<Option<Reading>>>;

    /// Subscribe to `devices/{id}/history`, newest `limit` entries by key.
    ///
    /// Values are sorted by ascending timestamp with null entries removed.
    /// `None` subscribes to the whole history.
    async fn subscribe_history(
        &self,
        device: &DeviceId,
        limit: Option<usize>,
    ) -> Result<Subscription<Vec<Reading>>>;

    /// Subscribe to `devices/{id}/config`.
    async fn subscribe_config(
        &self,
        device: &DeviceId,
    ) -> Result<Subscription<Option<ThresholdConfig>>>;

    // --- Writes ---

    /// Replace `devices/{id}/config`.
    async fn set_config(&self, device: &DeviceId, config: &ThresholdConfig) -> Result<()>;

    /// Merge the given fields into `devices/{id}/config`.
    async fn update_config(&self, device: &DeviceId, patch: &ConfigPatch) -> Result<()>;

    /// Replace `devices/{id}/latest`.
    async fn set_latest(&self, device: &DeviceId, reading: &Reading) -> Result<()>;

    /// Append a reading under a fresh key in `devices/{id}/history`.
    async fn push_history(&self, device: &DeviceId, reading: &Reading) -> Result<()>;
}
