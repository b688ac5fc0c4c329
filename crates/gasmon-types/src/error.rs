//! Error types for gasmon-types.

use thiserror::Error;

/// Errors produced when a threshold pair fails validation.
///
/// These are raised before anything is written to the store, so a rejected
/// pair never causes a partial update.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ThresholdError {
    /// One of the values is NaN or infinite.
    #[error("Invalid values: thresholds must be finite numbers")]
    NotFinite,

    /// The warn threshold is outside its allowed range.
    #[error("WARN must be between {min} and {max} (got {value})")]
    WarnOutOfRange { value: f64, min: f64, max: f64 },

    /// The alert threshold is outside its allowed range.
    #[error("ALERT must be between {min} and {max} (got {value})")]
    AlertOutOfRange { value: f64, min: f64, max: f64 },

    /// The alert threshold is not strictly above the warn threshold.
    #[error("ALERT ({alert}) must be strictly greater than WARN ({warn})")]
    NotAscending { warn: f64, alert: f64 },
}

/// Errors that can occur when parsing identifiers and wire values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The device identifier cannot be used as a store key.
    #[error("Invalid device id '{id}': {reason}")]
    InvalidDeviceId { id: String, reason: &'static str },

    /// A status string did not match any known status.
    #[error("Unknown status '{0}'")]
    UnknownStatus(String),
}

/// Result type alias using gasmon-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
