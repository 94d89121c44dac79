mod api_doc;
mod config;
mod controller;
mod error;
mod handlers;
mod ids;
mod metrics;
mod models;
mod routes;
mod schema;
mod server;
mod state;
mod store;

use config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the environment may be set directly
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("items-service starting");

    let config = Config::from_env()?;
    config.log_startup();

    server::serve(config).await
}
