use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{middleware, routing::get, Router};
use tower_http::{services::ServeDir, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api_doc::ApiDoc;
use crate::config::Config;
use crate::controller::ItemController;
use crate::handlers::{
    create_handler, db_health_handler, db_test_handler, delete_handler, get_handler,
    health_handler, list_handler, metrics_handler, ping_handler, redis_test_handler,
    update_handler,
};
use crate::ids::IdGenerator;
use crate::metrics::{track_requests, AccessLog, RequestObserver};
use crate::routes;
use crate::state::AppState;
use crate::store::open_store;

/// Assemble every route, the request hooks, and the static-asset fallback
pub fn build_router(state: AppState) -> Router {
    let static_files = ServeDir::new(&state.config.static_dir);

    Router::new()
        .route(routes::HEALTH, get(health_handler))
        .route(routes::DB_HEALTH, get(db_health_handler))
        .route(routes::DB_TEST, get(db_test_handler))
        .route(routes::METRICS, get(metrics_handler))
        .route(routes::PING, get(ping_handler))
        .route(routes::REDIS_TEST, get(redis_test_handler))
        .route(routes::ITEMS, get(list_handler).post(create_handler))
        .route(
            routes::ITEM,
            get(get_handler).put(update_handler).delete(delete_handler),
        )
        .merge(SwaggerUi::new(routes::SWAGGER_UI).url(routes::OPENAPI_JSON, ApiDoc::openapi()))
        .fallback_service(static_files)
        .layer(middleware::from_fn_with_state(state.clone(), track_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Open the configured store and serve until Ctrl-C
pub async fn serve(config: Config) -> Result<()> {
    let store = open_store(&config).await?;
    let controller = ItemController::new(
        store,
        config.item_schema.clone(),
        IdGenerator::new(config.id_strategy),
        config.store_timeout,
    );

    tracing::info!(
        "Serving '{}' items from the {} store",
        controller.schema().name(),
        controller.store().backend_name()
    );

    let addr = format!("{}:{}", config.service_host, config.service_port);
    let access_log: Arc<dyn RequestObserver> = Arc::new(AccessLog);
    let app = build_router(AppState::with_observers(config, controller, vec![access_log]));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server terminated with an error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
