use crate::routes;
use crate::state::AppState;
use axum::{extract::State, http::header, response::IntoResponse};

/// GET /metrics handler - Prometheus text exposition
#[utoipa::path(
    get,
    path = routes::METRICS,
    responses(
        (status = 200, description = "Process metrics", body = String, content_type = "text/plain")
    ),
    tag = "health"
)]
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render_prometheus(),
    )
}
