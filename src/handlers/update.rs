use crate::error::{ApiError, ErrorResponse};
use crate::handlers::object_body;
use crate::models::Item;
use crate::routes;
use crate::state::AppState;
use axum::{extract::rejection::JsonRejection, extract::Path, extract::State, http::StatusCode, Json};
use serde_json::Value as JsonValue;

/// PUT /items/{id} handler - Update an item
///
/// Only the fields present in the body change; omitted fields keep their
/// stored value.
#[utoipa::path(
    put,
    path = routes::ITEM,
    params(
        ("id" = String, Path, description = "Item id")
    ),
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Item updated", body = serde_json::Value),
        (status = 400, description = "Invalid field or malformed JSON", body = ErrorResponse),
        (status = 404, description = "Item not found", body = ErrorResponse),
        (status = 500, description = "Stored data is corrupt", body = ErrorResponse),
        (status = 503, description = "Backend unavailable", body = ErrorResponse)
    ),
    tag = "items"
)]
pub async fn update_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<JsonValue>, JsonRejection>,
) -> Result<(StatusCode, Json<Item>), ApiError> {
    let payload = object_body(payload)?;
    let item = state.controller.update(&id, &payload).await?;
    Ok((StatusCode::OK, Json(item)))
}
