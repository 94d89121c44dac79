use axum::{extract::State, http::StatusCode};

use crate::routes;
use crate::state::AppState;

/// GET /test/ping handler - Plain-text reachability check
#[utoipa::path(
    get,
    path = routes::PING,
    responses(
        (status = 200, description = "Always pong", body = String, content_type = "text/plain")
    ),
    tag = "health"
)]
pub async fn ping_handler() -> &'static str {
    "pong"
}

/// GET /test/test-redis handler - Redis reachability check
///
/// Writes and reads back a scratch key on the Redis store. Answers 503 when
/// the service runs on another backend.
#[utoipa::path(
    get,
    path = routes::REDIS_TEST,
    responses(
        (status = 200, description = "Redis answered the round trip", body = String, content_type = "text/plain"),
        (status = 500, description = "Redis round trip failed", body = String, content_type = "text/plain"),
        (status = 503, description = "Service is not running on Redis", body = String, content_type = "text/plain")
    ),
    tag = "health"
)]
pub async fn redis_test_handler(State(state): State<AppState>) -> (StatusCode, String) {
    let store = state.controller.store();
    if store.backend_name() != "redis" {
        tracing::warn!("Redis test requested but the backend is {}", store.backend_name());
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "Redis backend not configured".to_string(),
        );
    }

    match tokio::time::timeout(state.config.store_timeout, store.self_test()).await {
        Ok(Ok(value)) => {
            tracing::info!("Redis test successful, value: {}", value);
            (
                StatusCode::OK,
                format!("Redis is reachable. Test key value: {}", value),
            )
        }
        Ok(Err(e)) => {
            tracing::error!("Redis connection test failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Redis connection test failed: {}", e),
            )
        }
        Err(_) => {
            tracing::error!("Redis connection test timed out");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Redis connection test failed: timed out".to_string(),
            )
        }
    }
}
