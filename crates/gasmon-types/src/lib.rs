//! Platform-agnostic types for the gas concentration monitor.
//!
//! This crate provides the shared data model used by the dashboard
//! (`gasmon-core`, `gasmon-cli`) and the notification hook
//! (`gasmon-service`).
//!
//! # Features
//!
//! - [`Reading`]: one sample as published by the sensor
//! - [`ThresholdConfig`]: the warn/alert cutoffs and their validation
//! - [`Status`]: the three status bands
//! - [`DeviceId`]: device identifier and the store paths derived from it
//!
//! # Example
//!
//! ```
//! use gasmon_types::{DeviceId, Reading, Status, ThresholdConfig};
//!
//! let config = ThresholdConfig::default();
//! assert_eq!((config.warn, config.alert), (35.0, 60.0));
//!
//! let reading = Reading::builder().index(72.0).status(Status::Alert).build();
//! assert!(reading.status.is_alert());
//!
//! let device = DeviceId::default();
//! assert_eq!(device.config_path(), "devices/esp32_01/config");
//! ```

pub mod error;
pub mod types;

pub use error::{ParseError, ParseResult, ThresholdError};
pub use types::{
    ALERT_MAX, ALERT_MIN, ConfigPatch, DEFAULT_ALERT, DEFAULT_DEVICE_ID, DEFAULT_WARN, DeviceId,
    Reading, ReadingBuilder, Status, ThresholdConfig, WARN_MAX, WARN_MIN,
};
