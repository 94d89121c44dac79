use crate::error::{ApiError, ErrorResponse};
use crate::handlers::object_body;
use crate::models::Item;
use crate::routes;
use crate::state::AppState;
use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};
use serde_json::Value as JsonValue;

/// POST /items handler - Create an item
///
/// The server assigns `id`, `createdAt` and `updatedAt`; any such keys in the
/// body are ignored.
#[utoipa::path(
    post,
    path = routes::ITEMS,
    request_body = serde_json::Value,
    responses(
        (status = 201, description = "Item created", body = serde_json::Value),
        (status = 400, description = "Missing or invalid field, or malformed JSON", body = ErrorResponse),
        (status = 500, description = "Stored data is corrupt", body = ErrorResponse),
        (status = 503, description = "Backend unavailable", body = ErrorResponse)
    ),
    tag = "items"
)]
pub async fn create_handler(
    State(state): State<AppState>,
    payload: Result<Json<JsonValue>, JsonRejection>,
) -> Result<(StatusCode, Json<Item>), ApiError> {
    let payload = object_body(payload)?;
    let item = state.controller.create(&payload).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorResponse;
    use crate::handlers::testing::{body_json, send, setup_test_app};
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_create_endpoint_success() {
        let app = setup_test_app();

        let response = send(
            &app,
            "POST",
            "/items",
            Some(serde_json::json!({"name": "Widget", "price": 9.99})),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CREATED);

        let body = body_json(response).await;
        assert!(body["id"].as_str().is_some_and(|id| !id.is_empty()));
        assert_eq!(body["name"], "Widget");
        assert_eq!(body["price"], 9.99);
        assert_eq!(body["description"], "");
        assert_eq!(body["createdAt"], body["updatedAt"]);
    }

    #[tokio::test]
    async fn test_create_endpoint_missing_name() {
        let app = setup_test_app();

        let response = send(&app, "POST", "/items", Some(serde_json::json!({}))).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        let error: ErrorResponse = serde_json::from_value(body).unwrap();
        assert!(error.error.contains("name"));
    }

    #[tokio::test]
    async fn test_create_endpoint_negative_price() {
        let app = setup_test_app();

        let response = send(
            &app,
            "POST",
            "/items",
            Some(serde_json::json!({"name": "Widget", "price": -1})),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("price"));
    }

    #[tokio::test]
    async fn test_create_endpoint_non_object_body() {
        let app = setup_test_app();

        let response = send(&app, "POST", "/items", Some(serde_json::json!([1, 2]))).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("JSON object"));
    }

    #[tokio::test]
    async fn test_create_endpoint_invalid_json() {
        let app = setup_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/items")
                    .header("content-type", "application/json")
                    .body(Body::from("{invalid json}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("Invalid request body"));
    }

    #[tokio::test]
    async fn test_create_endpoint_ignores_client_id() {
        let app = setup_test_app();

        let response = send(
            &app,
            "POST",
            "/items",
            Some(serde_json::json!({"id": "mine", "name": "Widget", "price": 1})),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_ne!(body["id"], "mine");
    }
}
