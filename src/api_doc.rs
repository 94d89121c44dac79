use utoipa::OpenApi;

use crate::error::{ErrorResponse, HealthResponse, UnhealthyResponse};
use crate::handlers;
use crate::models::{DbHealthResponse, DbTestResponse};

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "items-service API",
        version = "1.0.0",
        description = "CRUD over an items resource backed by an in-memory, file, Redis, or SQLite store"
    ),
    paths(
        handlers::health::health_handler,
        handlers::health::db_health_handler,
        handlers::health::db_test_handler,
        handlers::metrics::metrics_handler,
        handlers::ping::ping_handler,
        handlers::ping::redis_test_handler,
        handlers::create::create_handler,
        handlers::list::list_handler,
        handlers::get::get_handler,
        handlers::update::update_handler,
        handlers::delete::delete_handler
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            UnhealthyResponse,
            DbHealthResponse,
            DbTestResponse
        )
    ),
    tags(
        (name = "health", description = "Health, metrics and reachability checks"),
        (name = "items", description = "Item CRUD operations")
    )
)]
pub struct ApiDoc;
