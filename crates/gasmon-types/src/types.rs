//! Core types for gas sensor data.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ParseResult, ThresholdError};

/// Three-band gas status.
///
/// The device embeds the status it computed when sampling; the dashboard
/// recomputes it from the live thresholds instead of trusting that value.
///
/// # Ordering
///
/// Status values are ordered by severity: `Unknown < Ok < Warn < Alert`.
///
/// ```
/// use gasmon_types::Status;
///
/// assert!(Status::Alert > Status::Warn);
/// assert_eq!("ALERT".parse::<Status>().unwrap(), Status::Alert);
/// assert_eq!(Status::Warn.to_string(), "WARN");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Status {
    /// Status string not recognised (or absent on the wire).
    #[default]
    Unknown,
    /// Index below the warn threshold.
    Ok,
    /// Index at or above warn, below alert.
    Warn,
    /// Index at or above the alert threshold.
    Alert,
}

impl Status {
    /// Whether this is the alert band.
    #[must_use]
    pub fn is_alert(self) -> bool {
        self == Status::Alert
    }

    /// Wire label of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Unknown => "UNKNOWN",
            Status::Ok => "OK",
            Status::Warn => "WARN",
            Status::Alert => "ALERT",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OK" => Ok(Status::Ok),
            "WARN" => Ok(Status::Warn),
            "ALERT" => Ok(Status::Alert),
            _ => Err(ParseError::UnknownStatus(s.to_string())),
        }
    }
}

// On the wire a status is its uppercase label. Any other string decodes as
// `Unknown`, never as an alert.
#[cfg(feature = "serde")]
impl Serialize for Status {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(label.parse().unwrap_or_default())
    }
}

/// A single sample published by the sensor.
///
/// Field names on the wire follow the firmware (`ts`, `adc`, `index`,
/// `status`). Missing fields decode to zero / [`Status::Unknown`] so a
/// half-written record never breaks a subscriber.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Reading {
    /// Sample time in milliseconds since the Unix epoch.
    #[cfg_attr(feature = "serde", serde(rename = "ts", default))]
    pub timestamp: i64,
    /// Raw ADC value from the gas sensor.
    #[cfg_attr(feature = "serde", serde(rename = "adc", default))]
    pub raw_value: f64,
    /// Normalised severity, 0-100.
    #[cfg_attr(feature = "serde", serde(default))]
    pub index: f64,
    /// Status as computed by the device.
    #[cfg_attr(feature = "serde", serde(default))]
    pub status: Status,
    /// Warn threshold the device used, if it reports one.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub warn: Option<f64>,
    /// Alert threshold the device used, if it reports one.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub alert: Option<f64>,
}

impl Reading {
    /// Create a new reading builder.
    pub fn builder() -> ReadingBuilder {
        ReadingBuilder::default()
    }

    /// Index with NaN folded to zero.
    #[must_use]
    pub fn severity(&self) -> f64 {
        if self.index.is_nan() { 0.0 } else { self.index }
    }

    /// Sample time in whole seconds (used for chart labels).
    #[must_use]
    pub fn timestamp_secs(&self) -> i64 {
        self.timestamp.div_euclid(1000)
    }

    /// Sample time as a UTC date-time, if representable.
    #[must_use]
    pub fn captured_at(&self) -> Option<time::OffsetDateTime> {
        time::OffsetDateTime::from_unix_timestamp_nanos(i128::from(self.timestamp) * 1_000_000)
            .ok()
    }
}

/// Builder for [`Reading`].
#[derive(Debug, Default)]
#[must_use]
pub struct ReadingBuilder {
    reading: Reading,
}

impl ReadingBuilder {
    /// Set the timestamp in milliseconds since epoch.
    pub fn timestamp(mut self, ms: i64) -> Self {
        self.reading.timestamp = ms;
        self
    }

    /// Set the timestamp from a date-time.
    pub fn captured_at(mut self, at: time::OffsetDateTime) -> Self {
        self.reading.timestamp = (at.unix_timestamp_nanos() / 1_000_000) as i64;
        self
    }

    /// Set the raw ADC value.
    pub fn raw_value(mut self, raw: f64) -> Self {
        self.reading.raw_value = raw;
        self
    }

    /// Set the severity index.
    pub fn index(mut self, index: f64) -> Self {
        self.reading.index = index;
        self
    }

    /// Set the device-computed status.
    pub fn status(mut self, status: Status) -> Self {
        self.reading.status = status;
        self
    }

    /// Record the thresholds the device used.
    pub fn thresholds(mut self, config: ThresholdConfig) -> Self {
        self.reading.warn = Some(config.warn);
        self.reading.alert = Some(config.alert);
        self
    }

    /// Build the reading.
    #[must_use]
    pub fn build(self) -> Reading {
        self.reading
    }
}

/// Default warn threshold.
pub const DEFAULT_WARN: f64 = 35.0;
/// Default alert threshold.
pub const DEFAULT_ALERT: f64 = 60.0;
/// Lowest accepted warn value.
pub const WARN_MIN: f64 = 1.0;
/// Highest accepted warn value.
pub const WARN_MAX: f64 = 99.0;
/// Lowest accepted alert value.
pub const ALERT_MIN: f64 = 1.0;
/// Highest accepted alert value.
pub const ALERT_MAX: f64 = 100.0;

fn default_warn() -> f64 {
    DEFAULT_WARN
}

fn default_alert() -> f64 {
    DEFAULT_ALERT
}

/// Operator-configured index cutoffs.
///
/// A valid pair satisfies `1 <= warn < alert <= 100`. Values read back from
/// the store are not re-validated; a field missing on the wire falls back to
/// its default.
///
/// ```
/// use gasmon_types::ThresholdConfig;
///
/// assert!(ThresholdConfig::new(35.0, 60.0).is_ok());
/// assert!(ThresholdConfig::new(0.0, 60.0).is_err());
/// assert!(ThresholdConfig::new(50.0, 50.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ThresholdConfig {
    /// Index at which the status becomes WARN.
    #[cfg_attr(feature = "serde", serde(default = "default_warn"))]
    pub warn: f64,
    /// Index at which the status becomes ALERT.
    #[cfg_attr(feature = "serde", serde(default = "default_alert"))]
    pub alert: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            warn: DEFAULT_WARN,
            alert: DEFAULT_ALERT,
        }
    }
}

impl ThresholdConfig {
    /// Create a validated threshold pair.
    pub fn new(warn: f64, alert: f64) -> Result<Self, ThresholdError> {
        let config = Self { warn, alert };
        config.validate()?;
        Ok(config)
    }

    /// Check the `1 <= warn < alert <= 100` invariant.
    pub fn validate(&self) -> Result<(), ThresholdError> {
        if !self.warn.is_finite() || !self.alert.is_finite() {
            return Err(ThresholdError::NotFinite);
        }
        if !(WARN_MIN..=WARN_MAX).contains(&self.warn) {
            return Err(ThresholdError::WarnOutOfRange {
                value: self.warn,
                min: WARN_MIN,
                max: WARN_MAX,
            });
        }
        if !(ALERT_MIN..=ALERT_MAX).contains(&self.alert) {
            return Err(ThresholdError::AlertOutOfRange {
                value: self.alert,
                min: ALERT_MIN,
                max: ALERT_MAX,
            });
        }
        if self.alert <= self.warn {
            return Err(ThresholdError::NotAscending {
                warn: self.warn,
                alert: self.alert,
            });
        }
        Ok(())
    }

    /// Merge the named fields of a partial update.
    #[must_use]
    pub fn merged(mut self, patch: &ConfigPatch) -> Self {
        if let Some(warn) = patch.warn {
            self.warn = warn;
        }
        if let Some(alert) = patch.alert {
            self.alert = alert;
        }
        self
    }
}

/// Partial threshold update; `None` fields are left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConfigPatch {
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub warn: Option<f64>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub alert: Option<f64>,
}

impl ConfigPatch {
    /// Whether the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.warn.is_none() && self.alert.is_none()
    }
}

/// Identifier of the default device.
pub const DEFAULT_DEVICE_ID: &str = "esp32_01";

/// Characters the realtime database refuses in keys.
const FORBIDDEN_KEY_CHARS: &[char] = &['.', '$', '#', '[', ']', '/'];

/// Identifier of a monitored device, used to build store paths.
///
/// ```
/// use gasmon_types::DeviceId;
///
/// let id: DeviceId = "esp32_01".parse().unwrap();
/// assert_eq!(id.latest_path(), "devices/esp32_01/latest");
/// assert!("bad/id".parse::<DeviceId>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct DeviceId(String);

impl DeviceId {
    /// Validate and wrap a device identifier.
    pub fn new(id: impl Into<String>) -> ParseResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ParseError::InvalidDeviceId {
                id,
                reason: "cannot be empty",
            });
        }
        if id.contains(FORBIDDEN_KEY_CHARS) {
            return Err(ParseError::InvalidDeviceId {
                id,
                reason: "contains one of . $ # [ ] /",
            });
        }
        if id.chars().any(char::is_control) {
            return Err(ParseError::InvalidDeviceId {
                id,
                reason: "contains control characters",
            });
        }
        Ok(Self(id))
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of the single latest reading.
    #[must_use]
    pub fn latest_path(&self) -> String {
        format!("devices/{}/latest", self.0)
    }

    /// Path of the append-only reading history.
    #[must_use]
    pub fn history_path(&self) -> String {
        format!("devices/{}/history", self.0)
    }

    /// Path of the threshold configuration.
    #[must_use]
    pub fn config_path(&self) -> String {
        format!("devices/{}/config", self.0)
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self(DEFAULT_DEVICE_ID.to_string())
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}
