//! REST client for the realtime database.
//!
//! Every path is addressed as `{base_url}/{path}.json`. Writes use `PUT`
//! (replace), `PATCH` (merge) and `POST` (append under a generated key).
//! Subscriptions use the streaming endpoint (`Accept: text/event-stream`):
//! the server first sends a `put` with the whole value, then `put` / `patch`
//! events relative to the subscribed path. The client keeps a local JSON tree
//! per subscription, applies each event to it and emits the decoded full
//! value.
//!
//! # Example
//!
//! ```no_run
//! use gasmon_core::{DataStore, RtdbClient};
//! use gasmon_types::DeviceId;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RtdbClient::new("https://example-default-rtdb.firebaseio.com", None)?;
//! let mut latest = client.subscribe_latest(&DeviceId::default()).await?;
//! while let Some(reading) = latest.recv().await {
//!     println!("{:?}", reading?);
//! }
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use gasmon_types::{ConfigPatch, DeviceId, Reading, ThresholdConfig};

use crate::error::{Error, Result};
use crate::streaming::{DEFAULT_BUFFER, Subscription, SubscriptionSender};
use crate::traits::DataStore;

/// Timeout for one-shot REST calls.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Delay before reopening a dropped stream.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Client for the realtime database REST API.
#[derive(Debug, Clone)]
pub struct RtdbClient {
    client: Client,
    base_url: String,
    auth: Option<String>,
    reconnect_delay: Duration,
}

impl RtdbClient {
    /// Create a client for `base_url`, optionally authenticated with a
    /// database secret or ID token.
    pub fn new(base_url: &str, auth: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(REQUEST_TIMEOUT)
            .build()?;
        Self::with_client(base_url, auth, client)
    }

    /// Create a client with a custom reqwest Client.
    pub fn with_client(base_url: &str, auth: Option<String>, client: Client) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::invalid_config(format!(
                "database URL must start with http:// or https://, got: {}",
                base_url
            )));
        }
        Ok(Self {
            client,
            base_url,
            auth: auth.filter(|a| !a.is_empty()),
            reconnect_delay: RECONNECT_DELAY,
        })
    }

    /// Override the delay before a dropped stream is reopened.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the JSON resource for a store path.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, path.trim_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.auth {
            Some(auth) => builder.query(&[("auth", auth)]),
            None => builder,
        }
    }

    async fn write<B: Serialize + ?Sized>(&self, method: Method, path: &str, body: &B) -> Result<()> {
        debug!("{} {}", method, path);
        let response = self
            .request(method, path)
            .timeout(REQUEST_TIMEOUT)
            .json(body)
            .send()
            .await?;
        check_status(path, response).await.map(|_| ())
    }

    /// Open a stream on `path` and feed decoded values into a subscription.
    fn stream<U, F>(&self, path: String, query: Vec<(&'static str, String)>, decode: F) -> Subscription<U>
    where
        U: Send + 'static,
        F: Fn(&str, &Value) -> Result<U> + Send + Sync + 'static,
    {
        let (tx, sub) = Subscription::channel(path.clone(), DEFAULT_BUFFER);
        let client = self.clone();
        tokio::spawn(async move {
            loop {
                let outcome = tokio::select! {
                    _ = tx.closed() => break,
                    outcome = client.run_stream(&path, &query, &decode, &tx) => outcome,
                };
                match outcome {
                    StreamEnd::ConsumerGone => break,
                    StreamEnd::Fatal(error) => {
                        tx.send_error(error).await;
                        break;
                    }
                    StreamEnd::Dropped(reason) => {
                        warn!("Stream on {} dropped ({}), reconnecting", path, reason);
                        tokio::select! {
                            _ = tx.closed() => break,
                            _ = tokio::time::sleep(client.reconnect_delay) => {}
                        }
                    }
                }
            }
            debug!("Stream on {} stopped", path);
        });
        sub
    }

    async fn run_stream<U, F>(
        &self,
        path: &str,
        query: &[(&'static str, String)],
        decode: &F,
        tx: &SubscriptionSender<U>,
    ) -> StreamEnd
    where
        F: Fn(&str, &Value) -> Result<U>,
    {
        let response = match self
            .request(Method::GET, path)
            .query(query)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return StreamEnd::Dropped(e.to_string()),
        };
        let response = match check_status(path, response).await {
            Ok(response) => response,
            Err(e) => return StreamEnd::Fatal(e),
        };
        info!("Subscribed to {}", path);

        let mut tree = Value::Null;
        let mut parser = SseParser::default();
        let mut body = response.bytes_stream();

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => return StreamEnd::Dropped(e.to_string()),
            };
            for event in parser.feed(&chunk) {
                match event.event.as_str() {
                    "put" | "patch" => {
                        let payload: StreamPayload = match serde_json::from_str(&event.data) {
                            Ok(payload) => payload,
                            Err(e) => {
                                warn!("Malformed {} event on {}: {}", event.event, path, e);
                                continue;
                            }
                        };
                        if event.event == "put" {
                            apply_put(&mut tree, &payload.path, payload.data);
                        } else {
                            apply_patch(&mut tree, &payload.path, payload.data);
                        }
                        let delivered = match decode(path, &tree) {
                            Ok(value) => tx.send(value).await,
                            Err(e) => tx.send_error(e).await,
                        };
                        if !delivered {
                            return StreamEnd::ConsumerGone;
                        }
                    }
                    "keep-alive" => {}
                    "cancel" => {
                        return StreamEnd::Fatal(Error::StreamCancelled {
                            path: path.to_string(),
                            reason: event.data.trim_matches('"').to_string(),
                        });
                    }
                    "auth_revoked" => {
                        return StreamEnd::Fatal(Error::StreamCancelled {
                            path: path.to_string(),
                            reason: "credential expired".to_string(),
                        });
                    }
                    other => debug!("Ignoring {} event on {}", other, path),
                }
            }
        }
        StreamEnd::Dropped("connection closed".to_string())
    }
}

enum StreamEnd {
    ConsumerGone,
    Dropped(String),
    Fatal(Error),
}

#[derive(Debug, Deserialize)]
struct StreamPayload {
    path: String,
    #[serde(default)]
    data: Value,
}

async fn check_status(path: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Status {
        path: path.to_string(),
        status: status.as_u16(),
        body: error_message(status, &body),
    })
}

/// Pull the `error` field out of an error body, falling back to the raw text.
fn error_message(status: StatusCode, body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: String,
    }
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.error,
        Err(_) if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
        Err(_) => body.trim().to_string(),
    }
}

// ==========================================================================
// Server-sent events
// ==========================================================================

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name; `message` when the server sent none.
    pub event: String,
    /// Data lines joined with `\n`.
    pub data: String,
}

/// Incremental `text/event-stream` parser.
///
/// Chunks may split lines (or UTF-8 sequences) anywhere; incomplete input is
/// buffered until the next call.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    /// Feed a chunk and return every event it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(event) = self.line(line) {
                events.push(event);
            }
        }
        events
    }

    fn line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            if self.event.is_none() && self.data.is_empty() {
                return None;
            }
            return Some(SseEvent {
                event: self.event.take().unwrap_or_else(|| "message".to_string()),
                data: std::mem::take(&mut self.data).join("\n"),
            });
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }
}

// ==========================================================================
// Local value tree
// ==========================================================================

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn as_object(node: &mut Value) -> Option<&mut Map<String, Value>> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    node.as_object_mut()
}

/// Replace the value at `path` (relative to the root); `null` deletes it.
pub fn apply_put(root: &mut Value, path: &str, data: Value) {
    let parts: Vec<&str> = segments(path).collect();
    let Some((last, parents)) = parts.split_last() else {
        *root = data;
        return;
    };
    let mut node = root;
    for part in parents {
        let Some(map) = as_object(node) else { return };
        node = map.entry(part.to_string()).or_insert(Value::Null);
    }
    if data.is_null() {
        if let Value::Object(map) = node {
            map.remove(*last);
        }
        return;
    }
    if let Some(map) = as_object(node) {
        map.insert(last.to_string(), data);
    }
}

/// Merge the children of `data` into the value at `path`.
pub fn apply_patch(root: &mut Value, path: &str, data: Value) {
    let Value::Object(children) = data else {
        apply_put(root, path, data);
        return;
    };
    let base = path.trim_end_matches('/');
    for (key, value) in children {
        apply_put(root, &format!("{}/{}", base, key), value);
    }
}

// ==========================================================================
// Decoders
// ==========================================================================

fn decode_latest(path: &str, value: &Value) -> Result<Option<Reading>> {
    if value.is_null() {
        return Ok(None);
    }
    Reading::deserialize(value)
        .map(Some)
        .map_err(|e| Error::decode(path, e))
}

fn decode_config(path: &str, value: &Value) -> Result<Option<ThresholdConfig>> {
    if value.is_null() {
        return Ok(None);
    }
    ThresholdConfig::deserialize(value)
        .map(Some)
        .map_err(|e| Error::decode(path, e))
}

/// Decode a history node: null entries are dropped, the rest sorted by time.
pub fn decode_history(path: &str, value: &Value) -> Result<Vec<Reading>> {
    let entries: Vec<&Value> = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Object(map) => map.values().collect(),
        Value::Array(items) => items.iter().collect(),
        other => {
            return Err(Error::decode(
                path,
                serde::de::Error::custom(format!("expected an object, got {}", other)),
            ));
        }
    };
    let mut readings = Vec::with_capacity(entries.len());
    for entry in entries.into_iter().filter(|v| !v.is_null()) {
        match Reading::deserialize(entry) {
            Ok(reading) => readings.push(reading),
            Err(e) => warn!("Skipping malformed history entry in {}: {}", path, e),
        }
    }
    readings.sort_by_key(|r| r.timestamp);
    Ok(readings)
}

#[async_trait]
impl DataStore for RtdbClient {
    async fn subscribe_latest(&self, device: &DeviceId) -> Result<Subscription<Option<Reading>>> {
        Ok(self.stream(device.latest_path(), Vec::new(), decode_latest))
    }

    async fn subscribe_history(
        &self,
        device: &DeviceId,
        limit: Option<usize>,
    ) -> Result<Subscription<Vec<Reading>>> {
        let query = match limit {
            Some(n) => vec![
                ("orderBy", "\"$key\"".to_string()),
                ("limitToLast", n.to_string()),
            ],
            None => Vec::new(),
        };
        Ok(self.stream(device.history_path(), query, decode_history))
    }

    async fn subscribe_config(
        &self,
        device: &DeviceId,
    ) -> Result<Subscription<Option<ThresholdConfig>>> {
        Ok(self.stream(device.config_path(), Vec::new(), decode_config))
    }

    async fn set_config(&self, device: &DeviceId, config: &ThresholdConfig) -> Result<()> {
        self.write(Method::PUT, &device.config_path(), config).await
    }

    async fn update_config(&self, device: &DeviceId, patch: &ConfigPatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        self.write(Method::PATCH, &device.config_path(), patch).await
    }

    async fn set_latest(&self, device: &DeviceId, reading: &Reading) -> Result<()> {
        self.write(Method::PUT, &device.latest_path(), reading).await
    }

    async fn push_history(&self, device: &DeviceId, reading: &Reading) -> Result<()> {
        self.write(Method::POST, &device.history_path(), reading).await
    }
}
