use crate::error::{ApiError, ErrorResponse};
use crate::models::Item;
use crate::routes;
use crate::state::AppState;
use axum::{extract::Path, extract::State, http::StatusCode, Json};

/// GET /items/{id} handler - Retrieve one item
#[utoipa::path(
    get,
    path = routes::ITEM,
    params(
        ("id" = String, Path, description = "Item id")
    ),
    responses(
        (status = 200, description = "Item found", body = serde_json::Value),
        (status = 404, description = "Item not found", body = ErrorResponse),
        (status = 500, description = "Stored data is corrupt", body = ErrorResponse),
        (status = 503, description = "Backend unavailable", body = ErrorResponse)
    ),
    tag = "items"
)]
pub async fn get_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Item>), ApiError> {
    match state.controller.get_one(&id).await {
        Ok(item) => {
            tracing::info!("Successfully retrieved item with id: {}", id);
            Ok((StatusCode::OK, Json(item)))
        }
        Err(err) => {
            tracing::info!("Item lookup failed for id {}: {}", id, err);
            Err(err.into())
        }
    }
}
