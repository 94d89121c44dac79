pub mod create;
pub mod delete;
pub mod get;
pub mod health;
pub mod list;
pub mod metrics;
pub mod ping;
pub mod update;

pub use create::create_handler;
pub use delete::delete_handler;
pub use get::get_handler;
pub use health::{db_health_handler, db_test_handler, health_handler};
pub use list::list_handler;
pub use metrics::metrics_handler;
pub use ping::{ping_handler, redis_test_handler};
pub use update::update_handler;

use axum::{extract::rejection::JsonRejection, Json};
use serde_json::{Map, Value as JsonValue};

use crate::error::ApiError;

/// Unwrap a request body that must be a JSON object
fn object_body(
    payload: Result<Json<JsonValue>, JsonRejection>,
) -> Result<Map<String, JsonValue>, ApiError> {
    match payload? {
        Json(JsonValue::Object(map)) => Ok(map),
        Json(_) => Err(ApiError::InvalidBody("expected a JSON object".to_string())),
    }
}
