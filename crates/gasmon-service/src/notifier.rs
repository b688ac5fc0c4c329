//! Chat notification transport.
//!
//! [`TelegramNotifier`] posts `{chat_id, text}` to the Bot API
//! `sendMessage` method. Any non-2xx answer is an error carrying the status
//! and body; nothing is retried.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::config::TelegramConfig;

/// Timeout for a single send.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur when sending a notification.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Telegram returned error {status}: {body}")]
    Response { status: u16, body: String },
    #[error("Notifier is not configured")]
    NotConfigured,
}

/// Destination for alert messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one text message.
    async fn send(&self, text: &str) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Telegram Bot API notifier.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    token: String,
    chat_id: String,
}

impl TelegramNotifier {
    /// Create a notifier for the given bot and chat.
    pub fn new(api_base: &str, token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self::with_client(Client::new(), api_base, token, chat_id)
    }

    /// Create a notifier with a custom reqwest Client.
    pub fn with_client(
        client: Client,
        api_base: &str,
        token: impl Into<String>,
        chat_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.into(),
            chat_id: chat_id.into(),
        }
    }

    /// Build a notifier from config; `None` when token or chat id is missing.
    pub fn from_config(config: &TelegramConfig) -> Option<Self> {
        match (&config.token, &config.chat_id) {
            (Some(token), Some(chat_id)) => {
                Some(Self::new(&config.api_base, token.clone(), chat_id.clone()))
            }
            _ => None,
        }
    }

    /// The `sendMessage` endpoint URL.
    pub fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.endpoint())
            .timeout(SEND_TIMEOUT)
            .json(&SendMessage {
                chat_id: &self.chat_id,
                text,
            })
            .send()
            .await
            // Drop the URL from the error: it contains the bot token.
            .map_err(|e| NotifyError::Request(e.without_url().to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Response {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Notification delivered to chat {}", self.chat_id);
        Ok(())
    }
}

/// Notifier used when no transport is configured; every send fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send(&self, _text: &str) -> Result<(), NotifyError> {
        Err(NotifyError::NotConfigured)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tokio::sync::Mutex;

    /// Records every message; optionally fails every send.
    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<String>>,
        pub fail_with: Option<u16>,
    }

    impl RecordingNotifier {
        pub fn failing(status: u16) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_with: Some(status),
            }
        }

        pub async fn count(&self) -> usize {
            self.sent.lock().await.len()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, text: &str) -> Result<(), NotifyError> {
            if let Some(status) = self.fail_with {
                return Err(NotifyError::Response {
                    status,
                    body: "{\"ok\":false}".to_string(),
                });
            }
            self.sent.lock().await.push(text.to_string());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_format() {
        let notifier = TelegramNotifier::new("https://api.telegram.org/", "123:abc", "-42");
        assert_eq!(
            notifier.endpoint(),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn test_from_config_requires_both_secrets() {
        let mut config = TelegramConfig::default();
        assert!(TelegramNotifier::from_config(&config).is_none());
        config.token = Some("t".into());
        assert!(TelegramNotifier::from_config(&config).is_none());
        config.chat_id = Some("c".into());
        assert!(TelegramNotifier::from_config(&config).is_some());
    }

    #[test]
    fn test_payload_shape() {
        let body = serde_json::to_value(SendMessage {
            chat_id: "-42",
            text: "hello",
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"chat_id": "-42", "text": "hello"}));
    }

    #[test]
    fn test_error_display() {
        let err = NotifyError::Response {
            status: 403,
            body: "Forbidden: bot was blocked".into(),
        };
        assert_eq!(
            err.to_string(),
            "Telegram returned error 403: Forbidden: bot was blocked"
        );
    }

    #[tokio::test]
    async fn test_disabled_notifier_fails() {
        assert!(matches!(
            DisabledNotifier.send("x").await,
            Err(NotifyError::NotConfigured)
        ));
    }
}
