use crate::error::{ApiError, ErrorResponse};
use crate::routes;
use crate::state::AppState;
use axum::{extract::Path, extract::State, http::StatusCode};

/// DELETE /items/{id} handler - Remove an item permanently
#[utoipa::path(
    delete,
    path = routes::ITEM,
    params(
        ("id" = String, Path, description = "Item id")
    ),
    responses(
        (status = 204, description = "Item deleted"),
        (status = 404, description = "Item not found", body = ErrorResponse),
        (status = 500, description = "Stored data is corrupt", body = ErrorResponse),
        (status = 503, description = "Backend unavailable", body = ErrorResponse)
    ),
    tag = "items"
)]
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.controller.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
