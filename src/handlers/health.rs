use crate::error::{HealthResponse, UnhealthyResponse};
use crate::models::{DbHealthResponse, DbTestResponse};
use crate::routes;
use crate::state::AppState;
use crate::store::StoreError;
use axum::{extract::State, http::StatusCode, Json};

/// GET /health handler - Liveness check
///
/// Does not touch the store; see `/db/health` for that.
#[utoipa::path(
    get,
    path = routes::HEALTH,
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_handler() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            service: env!("CARGO_PKG_NAME").to_string(),
        }),
    )
}

/// GET /db/health handler - Storage health check
///
/// Checks the configured backend. Returns 200 OK with the backend name and
/// version/detail if it responds, 503 Service Unavailable otherwise.
#[utoipa::path(
    get,
    path = routes::DB_HEALTH,
    responses(
        (status = 200, description = "Store is reachable", body = DbHealthResponse),
        (status = 503, description = "Store is unreachable", body = UnhealthyResponse)
    ),
    tag = "health"
)]
pub async fn db_health_handler(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<DbHealthResponse>), (StatusCode, Json<UnhealthyResponse>)> {
    let store = state.controller.store();
    let checked = tokio::time::timeout(state.config.store_timeout, store.health_check()).await;
    match checked {
        Ok(Ok(version)) => {
            tracing::debug!("Store health check passed");
            Ok((
                StatusCode::OK,
                Json(DbHealthResponse {
                    status: "ok".to_string(),
                    database: store.backend_name().to_string(),
                    version,
                }),
            ))
        }
        Ok(Err(e)) => {
            tracing::error!("Store health check failed: {}", e);
            Err(unhealthy(
                StatusCode::SERVICE_UNAVAILABLE,
                format!("Database health check failed: {}", e),
            ))
        }
        Err(_) => {
            tracing::error!("Store health check timed out");
            Err(unhealthy(
                StatusCode::SERVICE_UNAVAILABLE,
                "Database health check timed out".to_string(),
            ))
        }
    }
}

/// GET /db/test handler - Store write/read round trip
///
/// Writes a scratch value beside the items and reads it back. Item data is
/// never touched.
#[utoipa::path(
    get,
    path = routes::DB_TEST,
    responses(
        (status = 200, description = "Store accepted a write and returned it", body = DbTestResponse),
        (status = 500, description = "Store returned inconsistent data", body = UnhealthyResponse),
        (status = 503, description = "Store is unreachable", body = UnhealthyResponse)
    ),
    tag = "health"
)]
pub async fn db_test_handler(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<DbTestResponse>), (StatusCode, Json<UnhealthyResponse>)> {
    let store = state.controller.store();
    match tokio::time::timeout(state.config.store_timeout, store.self_test()).await {
        Ok(Ok(test_value)) => {
            tracing::info!("Store self-test passed on {}", store.backend_name());
            Ok((
                StatusCode::OK,
                Json(DbTestResponse {
                    status: "ok".to_string(),
                    database: store.backend_name().to_string(),
                    message: format!("{} store is working properly", store.backend_name()),
                    test_value,
                }),
            ))
        }
        Ok(Err(e)) => {
            tracing::error!("Store self-test failed: {}", e);
            let status = match e {
                StoreError::Corrupt { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::SERVICE_UNAVAILABLE,
            };
            Err(unhealthy(status, format!("Database test failed: {}", e)))
        }
        Err(_) => {
            tracing::error!("Store self-test timed out");
            Err(unhealthy(
                StatusCode::SERVICE_UNAVAILABLE,
                "Database test timed out".to_string(),
            ))
        }
    }
}

fn unhealthy(status: StatusCode, error: String) -> (StatusCode, Json<UnhealthyResponse>) {
    (
        status,
        Json(UnhealthyResponse {
            status: "error".to_string(),
            error,
        }),
    )
}
