//! REST API endpoints for the gasmon-service.
//!
//! The service exposes a health check, a status view with hook counters, and
//! the write-event hook that a database trigger (or any relay) calls for every
//! change to a device's `latest` slot.
//!
//! ## Error Handling
//!
//! All endpoints return structured JSON errors via [`AppError`]. A failed
//! notification is not an HTTP error: the hook answers 200 with
//! `notified: false` and the failure text, since the write it reports has
//! already happened.
//!
//! # Example
//!
//! ```ignore
//! use gasmon_service::api;
//!
//! let app = api::router().with_state(state);
//! ```

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use gasmon_core::{DEFAULT_DEVICE_ID, DeviceId, Reading};

use crate::state::{AppState, HookOutcome, HookStatsSnapshot};

/// Create the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/status", get(get_status))
        .route("/api/hooks/latest", post(latest_written))
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
    })
}

/// Service status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Service version.
    pub version: &'static str,
    /// Current timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Whether a chat transport is configured.
    pub notifier_configured: bool,
    /// Hook counters.
    pub hooks: HookStatsSnapshot,
    /// Watcher status.
    pub watcher: WatcherStatus,
}

/// Watcher status.
#[derive(Debug, Serialize)]
pub struct WatcherStatus {
    pub running: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    pub uptime_seconds: Option<u64>,
    /// Devices the watcher subscribes to.
    pub devices: Vec<String>,
}

async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let started_at = state.watcher.started_at();
    let running = state.watcher.is_running();
    let uptime_seconds = started_at.filter(|_| running).map(|s| {
        let now = OffsetDateTime::now_utc();
        (now - s).whole_seconds().max(0) as u64
    });

    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
        notifier_configured: state.config.telegram.is_configured(),
        hooks: state.stats.snapshot().await,
        watcher: WatcherStatus {
            running,
            started_at,
            uptime_seconds,
            devices: state.config.watcher.devices.clone(),
        },
    })
}

/// A write to a device's `latest` slot.
///
/// `before` is absent on the first write; `after` is absent when the slot
/// was deleted.
#[derive(Debug, Deserialize)]
pub struct LatestWriteEvent {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub before: Option<Reading>,
    #[serde(default)]
    pub after: Option<Reading>,
}

/// Hook response.
#[derive(Debug, Serialize, PartialEq)]
pub struct HookResponse {
    pub device_id: String,
    pub notified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

async fn latest_written(
    State(state): State<Arc<AppState>>,
    Json(event): Json<LatestWriteEvent>,
) -> Result<Json<HookResponse>, AppError> {
    let device = DeviceId::new(
        event
            .device_id
            .unwrap_or_else(|| DEFAULT_DEVICE_ID.to_string()),
    )
    .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let outcome = state
        .handle_write(&device, event.before.as_ref(), event.after.as_ref())
        .await;

    let (notified, error) = match outcome {
        HookOutcome::Skipped => (false, None),
        HookOutcome::Notified => (true, None),
        HookOutcome::Failed(message) => (false, Some(message)),
    };

    Ok(Json(HookResponse {
        device_id: device.to_string(),
        notified,
        error,
    }))
}

/// API error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unauthorized,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Missing or invalid hook secret".to_string(),
            ),
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::notifier::testing::RecordingNotifier;

    fn create_test_state() -> (Arc<AppState>, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let state = AppState::new(Config::default(), notifier.clone());
        (state, notifier)
    }

    async fn response_body(response: axum::response::Response) -> String {
        let body = response.into_body();
        let bytes = body.collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn hook_request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/hooks/latest")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn reading_json(status: &str) -> serde_json::Value {
        serde_json::json!({
            "ts": 1_700_000_000_000_i64,
            "adc": 3000,
            "index": 73.3,
            "status": status,
        })
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (state, _) = create_test_state();
        let app = router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = response_body(response).await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();

        assert_eq!(json["status"], "ok");
        assert!(json["version"].is_string());
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_status_endpoint_initial() {
        let (state, _) = create_test_state();
        let app = router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value =
            serde_json::from_str(&response_body(response).await).unwrap();
        assert_eq!(json["notifier_configured"], false);
        assert_eq!(json["hooks"]["events"], 0);
        assert_eq!(json["watcher"]["running"], false);
        assert!(json["watcher"]["started_at"].is_null());
        assert_eq!(json["watcher"]["devices"][0], "esp32_01");
    }

    #[tokio::test]
    async fn test_hook_alert_edge_notifies() {
        let (state, notifier) = create_test_state();
        let app = router().with_state(state);

        let response = app
            .oneshot(hook_request(serde_json::json!({
                "before": reading_json("OK"),
                "after": reading_json("ALERT"),
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value =
            serde_json::from_str(&response_body(response).await).unwrap();
        assert_eq!(json["device_id"], "esp32_01");
        assert_eq!(json["notified"], true);
        assert!(json.get("error").is_none());

        let sent = notifier.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("Index: 73.3"));
        assert!(sent[0].contains("ADC: 3000"));
    }

    #[tokio::test]
    async fn test_hook_sequence_notifies_twice() {
        let (state, notifier) = create_test_state();
        let app = router().with_state(state.clone());

        let statuses = ["OK", "ALERT", "ALERT", "WARN", "ALERT"];
        let mut before: Option<serde_json::Value> = None;
        for status in statuses {
            let after = reading_json(status);
            let response = app
                .clone()
                .oneshot(hook_request(serde_json::json!({
                    "device_id": "kitchen",
                    "before": before,
                    "after": after,
                })))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            before = Some(after);
        }

        assert_eq!(notifier.count().await, 2);
        let stats = state.stats.snapshot().await;
        assert_eq!(stats.events, 5);
        assert_eq!(stats.notifications_sent, 2);
        assert!(notifier.sent.lock().await[0].contains("Device: kitchen"));
    }

    #[tokio::test]
    async fn test_hook_first_write_alert() {
        let (state, notifier) = create_test_state();
        let app = router().with_state(state);

        let response = app
            .oneshot(hook_request(serde_json::json!({ "after": reading_json("ALERT") })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(notifier.count().await, 1);
    }

    #[tokio::test]
    async fn test_hook_delete_is_noop() {
        let (state, notifier) = create_test_state();
        let app = router().with_state(state);

        let response = app
            .oneshot(hook_request(serde_json::json!({ "before": reading_json("ALERT") })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value =
            serde_json::from_str(&response_body(response).await).unwrap();
        assert_eq!(json["notified"], false);
        assert_eq!(notifier.count().await, 0);
    }

    #[tokio::test]
    async fn test_hook_send_failure_reported_not_raised() {
        let state = AppState::new(Config::default(), Arc::new(RecordingNotifier::failing(400)));
        let app = router().with_state(state.clone());

        let response = app
            .oneshot(hook_request(serde_json::json!({ "after": reading_json("ALERT") })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value =
            serde_json::from_str(&response_body(response).await).unwrap();
        assert_eq!(json["notified"], false);
        assert!(json["error"].as_str().unwrap().contains("400"));
        assert_eq!(state.stats.snapshot().await.notification_failures, 1);
    }

    #[tokio::test]
    async fn test_hook_invalid_device_id() {
        let (state, notifier) = create_test_state();
        let app = router().with_state(state);

        let response = app
            .oneshot(hook_request(serde_json::json!({
                "device_id": "bad/id",
                "after": reading_json("ALERT"),
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json: serde_json::Value =
            serde_json::from_str(&response_body(response).await).unwrap();
        assert!(json["error"].as_str().unwrap().contains("bad/id"));
        assert_eq!(notifier.count().await, 0);
    }

    #[tokio::test]
    async fn test_hook_rejects_malformed_json() {
        let (state, _) = create_test_state();
        let app = router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/hooks/latest")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            AppError::BadRequest("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
