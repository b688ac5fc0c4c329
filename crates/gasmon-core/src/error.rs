//! Error types for gasmon-core.
//!
//! Every asynchronous boundary in this crate (store reads and writes, live
//! subscriptions, audio resume) reports failures through [`Error`]. None of
//! them are retried automatically; callers convert them into a fallback
//! value or a user-visible message.
//!
//! | Error | Where | Typical handling |
//! |-------|-------|------------------|
//! | [`Error::Http`] | REST calls | log, fall back / report |
//! | [`Error::Status`] | non-2xx store response | log, report |
//! | [`Error::Decode`] | unexpected JSON shape | log, fall back |
//! | [`Error::StreamCancelled`] | store revoked a subscription | fall back to defaults |
//! | [`Error::Timeout`] | initial value never arrived | fall back to defaults |
//! | [`Error::Audio`] | audio output refused to resume | sound stays disabled |

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to the store or the audio output.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// HTTP transport failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered with a non-success status.
    #[error("Store returned {status} for {path}: {body}")]
    Status {
        /// Path of the request.
        path: String,
        /// HTTP status code.
        status: u16,
        /// Response body, kept as diagnostic text.
        body: String,
    },

    /// A value could not be decoded.
    #[error("Failed to decode {path}: {source}")]
    Decode {
        /// Path whose value failed to decode.
        path: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The store closed a live subscription.
    #[error("Subscription to {path} was cancelled: {reason}")]
    StreamCancelled {
        /// Subscribed path.
        path: String,
        /// Reason reported by the store.
        reason: String,
    },

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// The audio output could not be resumed.
    #[error("Audio unavailable: {0}")]
    Audio(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failure injected by the in-memory store.
    #[error("Mock failure: {0}")]
    Mock(String),

    /// The component has already been shut down.
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a decode error for a store path.
    pub fn decode(path: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

/// Result type alias using gasmon-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Status {
            path: "devices/esp32_01/config".to_string(),
            status: 401,
            body: "Permission denied".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("401"));
        assert!(msg.contains("devices/esp32_01/config"));
        assert!(msg.contains("Permission denied"));

        let err = Error::timeout("load config", Duration::from_secs(5));
        assert!(err.to_string().contains("load config"));
        assert!(err.to_string().contains("5s"));

        assert_eq!(Error::Cancelled.to_string(), "Operation cancelled");
    }

    #[test]
    fn test_decode_error_keeps_source() {
        let source = serde_json::from_str::<u8>("\"x\"").unwrap_err();
        let err = Error::decode("devices/a/latest", source);
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("devices/a/latest"));
    }
}
