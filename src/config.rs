use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use anyhow::{anyhow, Context, Result};

use crate::ids::IdStrategy;
use crate::schema::ItemSchema;

/// Which persistence backend the service runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Whole collection held as one in-memory blob, lost on exit
    Memory,
    /// Whole collection serialized as one JSON file per key
    File,
    /// One row per item in a SQLite database file
    Sqlite,
    /// Whole collection as one value on a Redis server
    Redis,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::File => "file",
            BackendKind::Sqlite => "sqlite",
            BackendKind::Redis => "redis",
        }
    }

    fn default_path(self) -> &'static str {
        match self {
            BackendKind::Sqlite => "data/items.db",
            BackendKind::Memory | BackendKind::File | BackendKind::Redis => "data",
        }
    }
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "memory" => Ok(BackendKind::Memory),
            "file" => Ok(BackendKind::File),
            "sqlite" => Ok(BackendKind::Sqlite),
            "redis" => Ok(BackendKind::Redis),
            other => Err(anyhow!(
                "expected one of: memory, file, sqlite, redis, got '{}'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub service_port: u16,
    pub service_host: String,
    pub storage_backend: BackendKind,
    pub storage_path: PathBuf,
    pub storage_key: String,
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_password: Option<String>,
    pub item_schema: ItemSchema,
    pub id_strategy: IdStrategy,
    pub store_timeout: Duration,
    pub static_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let service_port = env::var("SERVICE_PORT")
            .unwrap_or_else(|_| "2019".to_string())
            .parse::<u16>()
            .context("SERVICE_PORT must be a valid port number (0-65535)")?;

        let service_host = env::var("SERVICE_HOST")
            .unwrap_or_else(|_| "0.0.0.0".to_string());

        let storage_backend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "memory".to_string())
            .parse::<BackendKind>()
            .context("STORAGE_BACKEND is invalid")?;

        let storage_path = env::var("STORAGE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(storage_backend.default_path()));

        let storage_key = env::var("STORAGE_KEY")
            .unwrap_or_else(|_| "items".to_string());
        if storage_key.is_empty() {
            return Err(anyhow!("STORAGE_KEY must not be empty"));
        }

        let redis_host = env::var("REDIS_HOST")
            .unwrap_or_else(|_| "127.0.0.1".to_string());

        let redis_port = env::var("REDIS_PORT")
            .unwrap_or_else(|_| "6379".to_string())
            .parse::<u16>()
            .context("REDIS_PORT must be a valid port number (0-65535)")?;

        let redis_password = env::var("REDIS_PASSWORD")
            .ok()
            .filter(|password| !password.is_empty());

        let item_schema = env::var("ITEM_SCHEMA")
            .unwrap_or_else(|_| "priced".to_string())
            .parse::<ItemSchema>()
            .context("ITEM_SCHEMA is invalid")?;

        let id_strategy = env::var("ID_STRATEGY")
            .unwrap_or_else(|_| "timestamp".to_string())
            .parse::<IdStrategy>()
            .context("ID_STRATEGY is invalid")?;

        let store_timeout_ms = env::var("STORE_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse::<u64>()
            .context("STORE_TIMEOUT_MS must be a number of milliseconds")?;
        if store_timeout_ms == 0 {
            return Err(anyhow!("STORE_TIMEOUT_MS must be greater than zero"));
        }

        let static_dir = env::var("STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("public"));

        Ok(Config {
            service_port,
            service_host,
            storage_backend,
            storage_path,
            storage_key,
            redis_host,
            redis_port,
            redis_password,
            item_schema,
            id_strategy,
            store_timeout: Duration::from_millis(store_timeout_ms),
            static_dir,
        })
    }

    pub fn log_startup(&self) {
        tracing::info!("Configuration loaded:");
        tracing::info!("  Storage backend: {}", self.storage_backend.as_str());
        tracing::info!("  Storage path: {}", self.storage_path.display());
        tracing::info!("  Storage key: {}", self.storage_key);
        if self.storage_backend == BackendKind::Redis {
            tracing::info!(
                "  Redis: {}:{} ({})",
                self.redis_host,
                self.redis_port,
                if self.redis_password.is_some() { "with password" } else { "no password" }
            );
        }
        let fields: Vec<&str> = self
            .item_schema
            .fields()
            .iter()
            .map(|field| field.name.as_str())
            .collect();
        tracing::info!("  Item schema: {} ({})", self.item_schema.name(), fields.join(", "));
        tracing::info!("  ID strategy: {:?}", self.id_strategy);
        tracing::info!("  Store timeout: {:?}", self.store_timeout);
        tracing::info!("  Static assets: {}", self.static_dir.display());
        tracing::info!("  Service listening on: {}:{}", self.service_host, self.service_port);
    }
}
