//! Shared-secret check for the hook endpoints.
//!
//! When `hook.secret` is set, every request except the health check must
//! carry the same value in the `X-Hook-Secret` header. Without a secret the
//! middleware lets everything through, which suits a service bound to
//! localhost behind a relay.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::api::AppError;
use crate::config::HookConfig;

/// Header carrying the shared secret.
pub const HOOK_SECRET_HEADER: &str = "X-Hook-Secret";

/// Hook secret authentication middleware.
///
/// Returns 401 Unauthorized if the secret is missing or does not match.
pub async fn hook_secret_auth(
    headers: HeaderMap,
    State(config): State<Arc<HookConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = config.secret.as_deref() else {
        return next.run(request).await;
    };

    // Monitoring should work without the secret.
    if request.uri().path() == "/api/health" {
        return next.run(request).await;
    }

    let provided = headers
        .get(HOOK_SECRET_HEADER)
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(provided) if constant_time_eq(expected.as_bytes(), provided.as_bytes()) => {
            next.run(request).await
        }
        _ => {
            warn!("Hook secret check failed for {}", request.uri().path());
            AppError::Unauthorized.into_response()
        }
    }
}

/// Constant-time byte comparison; slices of different length never match.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::{get, post},
    };
    use tower::ServiceExt;

    fn app(secret: Option<&str>) -> Router {
        let config = Arc::new(HookConfig {
            secret: secret.map(str::to_string),
        });
        Router::new()
            .route("/api/health", get(|| async { "ok" }))
            .route("/api/hooks/latest", post(|| async { "hooked" }))
            .layer(middleware::from_fn_with_state(config, hook_secret_auth))
    }

    fn hook(secret: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri("/api/hooks/latest");
        if let Some(secret) = secret {
            builder = builder.header(HOOK_SECRET_HEADER, secret);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_no_secret_configured_allows_all() {
        let response = app(None).oneshot(hook(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_matching_secret_passes() {
        let response = app(Some("s3cret")).oneshot(hook(Some("s3cret"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_or_wrong_secret_rejected() {
        let response = app(Some("s3cret")).oneshot(hook(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app(Some("s3cret")).oneshot(hook(Some("guess"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_health_skips_secret() {
        let response = app(Some("s3cret"))
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"short", b"longer"));
    }
}
