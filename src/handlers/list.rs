use crate::error::{ApiError, ErrorResponse};
use crate::models::Item;
use crate::routes;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};

/// GET /items handler - List every item
///
/// Returns the backend's current snapshot, in insertion order. An empty store
/// yields an empty array.
#[utoipa::path(
    get,
    path = routes::ITEMS,
    responses(
        (status = 200, description = "All items", body = [serde_json::Value]),
        (status = 500, description = "Stored data is corrupt", body = ErrorResponse),
        (status = 503, description = "Backend unavailable", body = ErrorResponse)
    ),
    tag = "items"
)]
pub async fn list_handler(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<Vec<Item>>), ApiError> {
    let items = state.controller.list_all().await?;
    tracing::info!("Listed {} items", items.len());
    Ok((StatusCode::OK, Json(items)))
}
