//! Gas index thresholds and status classification.
//!
//! The classifier maps a reading's severity index onto one of three bands
//! using the live [`ThresholdConfig`]. It is recomputed for every new
//! (reading, config) pair and never cached against an older config.
//!
//! # Example
//!
//! ```
//! use gasmon_core::{Status, ThresholdConfig, Thresholds};
//!
//! let thresholds = Thresholds::default();
//! assert_eq!(thresholds.evaluate_index(20.0), Status::Ok);
//! assert_eq!(thresholds.evaluate_index(35.0), Status::Warn);
//! assert_eq!(thresholds.evaluate_index(60.0), Status::Alert);
//!
//! let strict = Thresholds::new(ThresholdConfig { warn: 10.0, alert: 20.0 });
//! assert_eq!(strict.evaluate_index(25.0), Status::Alert);
//! ```

use gasmon_types::{Reading, Status, ThresholdConfig};

/// Classify a severity index against a threshold pair.
///
/// `index >= alert` is ALERT, otherwise `index >= warn` is WARN, otherwise OK.
/// A NaN index counts as zero.
pub fn classify(index: f64, config: &ThresholdConfig) -> Status {
    let index = if index.is_nan() { 0.0 } else { index };
    if index >= config.alert {
        Status::Alert
    } else if index >= config.warn {
        Status::Warn
    } else {
        Status::Ok
    }
}

/// Classify an optional reading; no reading yet is OK.
pub fn classify_reading(reading: Option<&Reading>, config: &ThresholdConfig) -> Status {
    reading.map_or(Status::Ok, |r| classify(r.severity(), config))
}

/// Threshold evaluator for sensor readings.
#[derive(Debug, Clone, Copy, Default)]
pub struct Thresholds {
    config: ThresholdConfig,
}

impl Thresholds {
    /// Create a new threshold evaluator with the given configuration.
    pub fn new(config: ThresholdConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &ThresholdConfig {
        &self.config
    }

    /// Evaluate a severity index.
    pub fn evaluate_index(&self, index: f64) -> Status {
        classify(index, &self.config)
    }

    /// Evaluate a reading, ignoring the status embedded by the device.
    pub fn evaluate_reading(&self, reading: &Reading) -> Status {
        classify(reading.severity(), &self.config)
    }

    /// Whether the thresholds embedded in the reading differ from the live ones.
    ///
    /// This happens when the device has not yet picked up a new config. A
    /// reading without embedded thresholds is never stale.
    pub fn is_stale(&self, reading: &Reading) -> bool {
        reading.warn.is_some_and(|warn| warn != self.config.warn)
            || reading.alert.is_some_and(|alert| alert != self.config.alert)
    }
}
