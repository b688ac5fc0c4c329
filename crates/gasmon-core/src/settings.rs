//! Threshold settings form.
//!
//! [`SettingsForm`] holds the values being edited, the `loading` / `saving`
//! flags and the last user-facing message. It never stays `loading`: the
//! first config value, a read error or a load timeout all clear it. A failed
//! read keeps the current values (35/60 on a fresh form).

use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use gasmon_types::{DEFAULT_ALERT, DEFAULT_WARN, DeviceId, ThresholdConfig, ThresholdError};

use crate::error::Error;
use crate::traits::DataStore;

/// How long [`SettingsForm::load`] waits for the first config value.
pub const CONFIG_LOAD_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome message shown under the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "text", rename_all = "lowercase")]
pub enum FormMessage {
    /// Success or informational message.
    Ok(String),
    /// Validation or transport failure.
    Err(String),
}

impl FormMessage {
    /// Message text.
    pub fn text(&self) -> &str {
        match self {
            Self::Ok(text) | Self::Err(text) => text,
        }
    }

    /// Whether this reports a failure.
    pub fn is_err(&self) -> bool {
        matches!(self, Self::Err(_))
    }
}

/// Editable thresholds plus form state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingsForm {
    /// Warn threshold being edited.
    pub warn: f64,
    /// Alert threshold being edited.
    pub alert: f64,
    /// Waiting for the first config value.
    pub loading: bool,
    /// A save is in flight.
    pub saving: bool,
    /// Last outcome message.
    pub message: Option<FormMessage>,
}

impl Default for SettingsForm {
    fn default() -> Self {
        Self {
            warn: DEFAULT_WARN,
            alert: DEFAULT_ALERT,
            loading: true,
            saving: false,
            message: None,
        }
    }
}

impl SettingsForm {
    /// A fresh form with default values, waiting for the stored config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a config value from the store. `None` keeps the current values.
    pub fn on_config(&mut self, config: Option<ThresholdConfig>) {
        if let Some(config) = config {
            self.warn = config.warn;
            self.alert = config.alert;
        }
        self.loading = false;
    }

    /// Record a failed config read.
    pub fn on_load_error(&mut self, error: &Error) {
        warn!("Could not read threshold config: {}", error);
        self.message = Some(FormMessage::Err(
            "Could not read the configuration (check database rules).".to_string(),
        ));
        self.loading = false;
    }

    /// Read the stored config once, waiting at most `timeout`.
    pub async fn load(&mut self, store: &dyn DataStore, device: &DeviceId, timeout: Duration) {
        let result = match store.subscribe_config(device).await {
            Ok(mut sub) => sub.first(timeout).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(config) => self.on_config(config),
            Err(e) => self.on_load_error(&e),
        }
    }

    /// Check the edited values.
    pub fn validate(&self) -> Result<ThresholdConfig, ThresholdError> {
        ThresholdConfig::new(self.warn, self.alert)
    }

    /// Validate and write the thresholds. Returns whether the write succeeded.
    ///
    /// A validation failure sets an error message and writes nothing.
    pub async fn save(&mut self, store: &dyn DataStore, device: &DeviceId) -> bool {
        self.message = None;

        let config = match self.validate() {
            Ok(config) => config,
            Err(e) => {
                self.message = Some(FormMessage::Err(e.to_string()));
                return false;
            }
        };

        self.saving = true;
        let result = store.set_config(device, &config).await;
        self.saving = false;

        match result {
            Ok(()) => {
                info!("Saved thresholds warn={} alert={} for {}", config.warn, config.alert, device);
                self.message = Some(FormMessage::Ok("Thresholds saved.".to_string()));
                true
            }
            Err(e) => {
                warn!("Could not save thresholds: {}", e);
                self.message = Some(FormMessage::Err(
                    "Save failed (check database rules).".to_string(),
                ));
                false
            }
        }
    }

    /// Put the default values back in the form without saving.
    pub fn reset_defaults(&mut self) {
        self.warn = DEFAULT_WARN;
        self.alert = DEFAULT_ALERT;
        self.message = Some(FormMessage::Ok(
            "Defaults applied (remember to save).".to_string(),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockStore;

    #[tokio::test]
    async fn test_load_reads_stored_config() {
        let store = MockStore::new();
        let device = DeviceId::default();
        store
            .set_config(&device, &ThresholdConfig { warn: 20.0, alert: 45.0 })
            .await
            .unwrap();

        let mut form = SettingsForm::new();
        assert!(form.loading);
        form.load(&store, &device, CONFIG_LOAD_TIMEOUT).await;
        assert!(!form.loading);
        assert_eq!((form.warn, form.alert), (20.0, 45.0));
        assert_eq!(form.message, None);
    }

    #[tokio::test]
    async fn test_load_failure_falls_back_to_defaults() {
        let store = MockStore::new();
        store.set_config_error(Some("permission denied")).await;

        let mut form = SettingsForm::new();
        form.load(&store, &DeviceId::default(), CONFIG_LOAD_TIMEOUT).await;
        assert!(!form.loading);
        assert_eq!((form.warn, form.alert), (35.0, 60.0));
        assert!(form.message.as_ref().is_some_and(FormMessage::is_err));
    }

    #[tokio::test]
    async fn test_missing_config_keeps_defaults() {
        let store = MockStore::new();
        let mut form = SettingsForm::new();
        form.load(&store, &DeviceId::default(), CONFIG_LOAD_TIMEOUT).await;
        assert!(!form.loading);
        assert_eq!((form.warn, form.alert), (35.0, 60.0));
        assert_eq!(form.message, None);
    }

    #[tokio::test]
    async fn test_save_rejects_invalid_values_without_writing() {
        let store = MockStore::new();
        let device = DeviceId::default();
        let mut form = SettingsForm::new();
        form.warn = 50.0;
        form.alert = 50.0;

        assert!(!form.save(&store, &device).await);
        assert_eq!(store.write_count(), 0);
        let message = form.message.clone().unwrap();
        assert!(message.is_err());
        assert!(message.text().contains("ALERT"));
        assert!(!form.saving);
    }

    #[tokio::test]
    async fn test_save_writes_and_reports() {
        let store = MockStore::new();
        let device = DeviceId::default();
        let mut form = SettingsForm::new();
        form.warn = 30.0;
        form.alert = 70.0;

        assert!(form.save(&store, &device).await);
        assert_eq!(
            store.config(&device).await,
            Some(ThresholdConfig { warn: 30.0, alert: 70.0 })
        );
        assert_eq!(form.message, Some(FormMessage::Ok("Thresholds saved.".into())));
        assert!(!form.saving);
    }

    #[tokio::test]
    async fn test_save_failure_keeps_form_values() {
        let store = MockStore::new();
        store.set_should_fail(true, Some("denied")).await;
        let mut form = SettingsForm::new();
        form.warn = 30.0;

        assert!(!form.save(&store, &DeviceId::default()).await);
        assert_eq!(form.warn, 30.0);
        assert!(form.message.as_ref().is_some_and(FormMessage::is_err));
        assert!(!form.saving);
    }

    #[test]
    fn test_reset_defaults_does_not_save() {
        let mut form = SettingsForm::new();
        form.warn = 10.0;
        form.alert = 90.0;
        form.reset_defaults();
        assert_eq!((form.warn, form.alert), (35.0, 60.0));
        assert!(form.message.as_ref().is_some_and(|m| m.text().contains("remember to save")));
    }

    #[test]
    fn test_message_serializes_with_type_tag() {
        let json = serde_json::to_value(FormMessage::Err("x".into())).unwrap();
        assert_eq!(json, serde_json::json!({"type": "err", "text": "x"}));
    }
}
