//! Core library for the gas concentration monitor.
//!
//! This crate holds everything between the realtime store and the screen:
//! status classification, the alarm state machine and its runtime, the
//! history filter, and the dashboard and settings view models. Store access
//! goes through the [`DataStore`] trait.
//!
//! # Features
//!
//! - **Classification**: [`classify`] maps a severity index to OK / WARN / ALERT
//! - **Alarm**: a pure [`AlarmMachine`] driven by an [`AlarmController`] task
//!   that owns the beep loop and the 10 second test countdown
//! - **History**: [`filter_notable`] keeps readings at or above the warn threshold
//! - **Live data**: [`Subscription`] streams with cancel-on-drop, joined by
//!   the [`Dashboard`] into one snapshot
//! - **Store backends**: [`RtdbClient`] (REST + server-sent events) and
//!   [`MockStore`] (in memory)
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use gasmon_core::{AlarmController, Dashboard, DeviceId, RtdbClient, SilentAudio};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(RtdbClient::new("https://example-default-rtdb.firebaseio.com", None)?);
//!     let alarm = AlarmController::start(Arc::new(SilentAudio));
//!
//!     let dashboard = Dashboard::start(store, DeviceId::default(), Some(alarm.handle())).await;
//!     let mut updates = dashboard.subscribe();
//!     while updates.changed().await.is_ok() {
//!         let snapshot = updates.borrow().clone();
//!         println!("{} ({:?})", snapshot.status, snapshot.latest.map(|r| r.index));
//!     }
//!
//!     dashboard.shutdown().await;
//!     alarm.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod alarm;
pub mod dashboard;
pub mod error;
pub mod history;
pub mod mock;
pub mod rtdb;
pub mod settings;
pub mod siren;
pub mod streaming;
pub mod thresholds;
pub mod traits;

// Re-export the data model so most users only depend on this crate.
pub use gasmon_types::{
    ConfigPatch, DEFAULT_ALERT, DEFAULT_DEVICE_ID, DEFAULT_WARN, DeviceId, Reading, Status,
    ThresholdConfig, ThresholdError,
};

pub use alarm::{AlarmEffect, AlarmMachine, AlarmMode, AlarmState, TEST_ALARM_DURATION};
pub use dashboard::{Dashboard, DashboardSnapshot, LatestJoin, load_review};
pub use error::{Error, Result};
pub use history::{CHART_HISTORY_LIMIT, ChartPoint, ChartSeries, SortOrder, filter_notable};
pub use mock::MockStore;
pub use rtdb::RtdbClient;
pub use settings::{CONFIG_LOAD_TIMEOUT, FormMessage, SettingsForm};
pub use siren::{AlarmController, AlarmHandle, AudioOutput, BeepLoop, SilentAudio, Tone};
pub use streaming::{Subscription, SubscriptionSender};
pub use thresholds::{Thresholds, classify, classify_reading};
pub use traits::DataStore;
