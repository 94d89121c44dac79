use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::controller::ControllerError;
use crate::schema::ValidationError;
use crate::store::StoreError;

/// Error response type
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Response type for health check endpoint
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

/// Response type for unhealthy status
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct UnhealthyResponse {
    pub status: String,
    pub error: String,
}

/// Custom error type for API endpoints
///
/// Maps controller and request-parsing failures to HTTP status codes and a
/// JSON body of the form `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    /// Payload failed schema validation
    Validation(ValidationError),
    /// Body is not a JSON object
    InvalidBody(String),
    /// No item with this id
    ItemNotFound(String),
    /// Store unreachable, failing, or timed out
    BackendUnavailable(StoreError),
    /// Stored content could not be parsed
    CorruptData(StoreError),
    /// Anything else the store reported
    Internal(StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            ApiError::InvalidBody(msg) => (
                StatusCode::BAD_REQUEST,
                format!("Invalid request body: {}", msg),
            ),
            ApiError::ItemNotFound(id) => (
                StatusCode::NOT_FOUND,
                format!("Item not found: {}", id),
            ),
            ApiError::BackendUnavailable(err) => {
                tracing::error!("Backend unavailable: {}", err);
                (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
            }
            ApiError::CorruptData(err) => {
                tracing::error!("Corrupt data in store: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            ApiError::Internal(err) => {
                tracing::error!("Store error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };

        let body = Json(ErrorResponse {
            error: error_message,
        });

        (status, body).into_response()
    }
}

impl From<ControllerError> for ApiError {
    fn from(err: ControllerError) -> Self {
        match err {
            ControllerError::Validation(err) => ApiError::Validation(err),
            ControllerError::NotFound(id) => ApiError::ItemNotFound(id),
            ControllerError::Store(err) => err.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { id } => ApiError::ItemNotFound(id),
            err @ StoreError::Unavailable { .. } => ApiError::BackendUnavailable(err),
            err @ StoreError::Corrupt { .. } => ApiError::CorruptData(err),
            err @ StoreError::Conflict { .. } => ApiError::Internal(err),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidBody(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn render(err: ApiError) -> (StatusCode, ErrorResponse) {
        let response = err.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let cases = vec![
            (
                ApiError::from(ControllerError::Validation(ValidationError::MissingField {
                    field: "name".to_string(),
                })),
                StatusCode::BAD_REQUEST,
                "name is a required field",
            ),
            (
                ApiError::InvalidBody("expected value".to_string()),
                StatusCode::BAD_REQUEST,
                "Invalid request body",
            ),
            (
                ApiError::from(ControllerError::NotFound("42".to_string())),
                StatusCode::NOT_FOUND,
                "Item not found: 42",
            ),
            (
                ApiError::from(StoreError::unavailable("connection refused")),
                StatusCode::SERVICE_UNAVAILABLE,
                "connection refused",
            ),
            (
                ApiError::from(StoreError::corrupt("bad json")),
                StatusCode::INTERNAL_SERVER_ERROR,
                "bad json",
            ),
            (
                ApiError::from(StoreError::conflict("1")),
                StatusCode::INTERNAL_SERVER_ERROR,
                "already exists",
            ),
        ];

        for (err, expected_status, expected_text) in cases {
            let (status, body) = render(err).await;
            assert_eq!(status, expected_status);
            assert!(
                body.error.contains(expected_text),
                "'{}' does not contain '{}'",
                body.error,
                expected_text
            );
        }
    }
}
