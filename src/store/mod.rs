//! Persistence backends for items.
//!
//! [`ItemStore`] is the single contract the controller talks to. Two styles
//! implement it:
//!
//! - **blob-style** ([`BlobItemStore`]): the whole collection lives under one
//!   key of a [`BlobStore`] and is rewritten on every mutation
//!   ([`MemoryBlobStore`], [`FileBlobStore`], [`RedisBlobStore`])
//! - **row-style** ([`SqliteItemStore`]): one row per item, each mutation is a
//!   single statement
//!
//! Backends classify their failures into [`StoreError`]; nothing above this
//! layer sees a driver-specific error.
//!
//! Every mutation takes a [`WriteTicket`]. A backend claims the ticket right
//! before its first side effect, so a caller that stops waiting can tell
//! whether the write will never happen or is already in flight.

pub mod blob;
pub mod file;
pub mod memory;
pub mod redis;
pub mod sqlite;

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use crate::config::{BackendKind, Config};
use crate::models::Item;

pub use blob::{BlobItemStore, BlobStore};
pub use file::FileBlobStore;
pub use memory::MemoryBlobStore;
pub use self::redis::RedisBlobStore;
pub use sqlite::SqliteItemStore;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors a persistence backend can report
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// No item with this id exists
    #[error("Item not found: {id}")]
    NotFound { id: String },

    /// An item with this id already exists
    #[error("Item already exists: {id}")]
    Conflict { id: String },

    /// The store could not be reached, failed an I/O call, or timed out
    #[error("Backend unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Stored content could not be parsed
    #[error("Corrupt data: {message}")]
    Corrupt {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl StoreError {
    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    #[must_use]
    pub fn conflict(id: impl Into<String>) -> Self {
        Self::Conflict { id: id.into() }
    }

    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable { message: message.into(), source: None }
    }

    #[must_use]
    pub fn unavailable_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Unavailable { message: message.into(), source: Some(Arc::new(source)) }
    }

    #[must_use]
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt { message: message.into(), source: None }
    }

    #[must_use]
    pub fn corrupt_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Corrupt { message: message.into(), source: Some(Arc::new(source)) }
    }
}

const TICKET_PENDING: u8 = 0;
const TICKET_STARTED: u8 = 1;
const TICKET_ABANDONED: u8 = 2;

/// Start handshake between one store mutation and the caller awaiting it
///
/// Exactly one of [`begin`](WriteTicket::begin) and
/// [`abandon`](WriteTicket::abandon) wins. Once the backend has begun, the
/// caller must wait for the outcome; once the caller has abandoned, the
/// backend must not write.
#[derive(Debug, Clone, Default)]
pub struct WriteTicket(Arc<AtomicU8>);

impl WriteTicket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claimed by the backend immediately before its first side effect
    pub fn begin(&self) -> StoreResult<()> {
        self.0
            .compare_exchange(TICKET_PENDING, TICKET_STARTED, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| StoreError::unavailable("write abandoned before it started"))
    }

    /// Claimed by the caller when it stops waiting; `false` if the write already began
    pub fn abandon(&self) -> bool {
        self.0
            .compare_exchange(TICKET_PENDING, TICKET_ABANDONED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Storage contract for the item collection
///
/// | Method | Description |
/// |--------|-------------|
/// | [`load_all`](ItemStore::load_all) | Snapshot of every item, in insertion order |
/// | [`get_by_id`](ItemStore::get_by_id) | One item, or `NotFound` |
/// | [`insert`](ItemStore::insert) | Add a new item, `Conflict` if the id is taken |
/// | [`update`](ItemStore::update) | Replace an item's fields and `updatedAt`, `NotFound` if absent |
/// | [`remove`](ItemStore::remove) | Hard delete, `NotFound` if absent |
/// | [`health_check`](ItemStore::health_check) | Check the store, returning a version/detail string |
/// | [`self_test`](ItemStore::self_test) | Write a scratch value beside the items and read it back |
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Short backend name used in health output and logs
    fn backend_name(&self) -> &'static str;

    async fn load_all(&self) -> StoreResult<Vec<Item>>;

    async fn get_by_id(&self, id: &str) -> StoreResult<Item>;

    async fn insert(&self, item: &Item, ticket: &WriteTicket) -> StoreResult<()>;

    /// Replaces the schema fields of `id` and sets its `updatedAt`
    ///
    /// `createdAt` is left untouched. Returns the stored record.
    async fn update(
        &self,
        id: &str,
        fields: &Map<String, JsonValue>,
        updated_at: DateTime<Utc>,
        ticket: &WriteTicket,
    ) -> StoreResult<Item>;

    async fn remove(&self, id: &str, ticket: &WriteTicket) -> StoreResult<()>;

    async fn health_check(&self) -> StoreResult<String>;

    /// Returns the value read back, which must equal the value written
    async fn self_test(&self) -> StoreResult<String>;
}

/// Scratch value for [`ItemStore::self_test`], unique per call
pub(crate) fn self_test_value() -> String {
    format!("test-{}", Utc::now().timestamp_millis())
}

/// Open the backend selected in the configuration
pub async fn open_store(config: &Config) -> Result<Arc<dyn ItemStore>> {
    let store: Arc<dyn ItemStore> = match config.storage_backend {
        BackendKind::Memory => Arc::new(BlobItemStore::new(
            MemoryBlobStore::new(),
            config.storage_key.clone(),
        )),
        BackendKind::File => {
            let blob = FileBlobStore::open(&config.storage_path)
                .await
                .with_context(|| {
                    format!("Failed to open file store at {}", config.storage_path.display())
                })?;
            Arc::new(BlobItemStore::new(blob, config.storage_key.clone()))
        }
        BackendKind::Redis => {
            let blob = RedisBlobStore::connect(
                &config.redis_host,
                config.redis_port,
                config.redis_password.clone(),
                config.store_timeout,
            )
            .await
            .with_context(|| {
                format!(
                    "Failed to connect to Redis at {}:{}",
                    config.redis_host, config.redis_port
                )
            })?;
            Arc::new(BlobItemStore::new(blob, config.storage_key.clone()))
        }
        BackendKind::Sqlite => {
            let store = SqliteItemStore::open(&config.storage_path)
                .await
                .with_context(|| {
                    format!("Failed to open SQLite database at {}", config.storage_path.display())
                })?;
            Arc::new(store)
        }
    };

    tracing::info!("Opened {} item store", store.backend_name());
    Ok(store)
}
