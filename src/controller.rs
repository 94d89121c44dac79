//! Item resource controller.
//!
//! Validates payloads against the configured [`ItemSchema`], assigns ids and
//! timestamps, and drives an [`ItemStore`]. The controller keeps no item
//! state of its own.
//!
//! Every mutating operation (create, update, delete) runs under one
//! backend-wide async mutex, so the read-merge-write of an update can never
//! interleave with another write. Reads take no lock.
//!
//! Reads are bounded by the configured timeout; expiry is reported as
//! [`StoreError::Unavailable`]. Writes are bounded only until the backend
//! claims their [`WriteTicket`]: a write that times out before that point
//! is guaranteed never to happen, and one that has started is awaited, so a
//! 503 never hides a write that went through.

use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::ids::IdGenerator;
use crate::models::Item;
use crate::schema::{ItemSchema, ValidationError};
use crate::store::{ItemStore, StoreError, StoreResult, WriteTicket};

/// Fresh ids tried before a create gives up on collisions
const MAX_ID_ATTEMPTS: usize = 8;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Item not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ControllerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { id } => ControllerError::NotFound(id),
            other => ControllerError::Store(other),
        }
    }
}

pub type ControllerResult<T> = Result<T, ControllerError>;

pub struct ItemController {
    store: Arc<dyn ItemStore>,
    schema: ItemSchema,
    ids: IdGenerator,
    timeout: Duration,
    write_lock: Mutex<()>,
}

impl ItemController {
    pub fn new(
        store: Arc<dyn ItemStore>,
        schema: ItemSchema,
        ids: IdGenerator,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            schema,
            ids,
            timeout,
            write_lock: Mutex::new(()),
        }
    }

    pub fn schema(&self) -> &ItemSchema {
        &self.schema
    }

    pub fn store(&self) -> &dyn ItemStore {
        self.store.as_ref()
    }

    /// Validate `payload`, assign an id and timestamps, and persist the item
    pub async fn create(&self, payload: &Map<String, JsonValue>) -> ControllerResult<Item> {
        let fields = self.schema.validate_new(payload).inspect_err(|e| {
            tracing::warn!("Rejected item creation: {}", e);
        })?;

        let _guard = self.write_lock.lock().await;
        for _ in 0..MAX_ID_ATTEMPTS {
            let item = Item::new(self.ids.next_id(), fields.clone(), Utc::now());
            let ticket = WriteTicket::new();
            match self
                .bounded_write("insert", &ticket, self.store.insert(&item, &ticket))
                .await
            {
                Ok(()) => {
                    tracing::info!("Created item with id: {}", item.id);
                    return Ok(item);
                }
                Err(StoreError::Conflict { id }) => {
                    tracing::warn!("Generated id {} already in use, regenerating", id);
                }
                Err(err) => {
                    tracing::error!("Failed to create item: {}", err);
                    return Err(err.into());
                }
            }
        }

        tracing::error!("Gave up creating item after {} id collisions", MAX_ID_ATTEMPTS);
        Err(ControllerError::Store(StoreError::unavailable(format!(
            "could not allocate a unique id after {} attempts",
            MAX_ID_ATTEMPTS
        ))))
    }

    pub async fn list_all(&self) -> ControllerResult<Vec<Item>> {
        let items = self.bounded("load_all", self.store.load_all()).await?;
        tracing::debug!("Listed {} items", items.len());
        Ok(items)
    }

    pub async fn get_one(&self, id: &str) -> ControllerResult<Item> {
        Ok(self.bounded("get_by_id", self.store.get_by_id(id)).await?)
    }

    /// Merge the supplied fields of `payload` over the stored item
    ///
    /// Omitted fields keep their stored value. `updatedAt` always moves
    /// forward, even when the clock has not. Supplied values are checked
    /// before the store is touched; only the null-on-required check needs
    /// the stored item, so an unknown id still wins over that one.
    pub async fn update(
        &self,
        id: &str,
        payload: &Map<String, JsonValue>,
    ) -> ControllerResult<Item> {
        let reject = |e: &ValidationError| {
            tracing::warn!("Rejected update of item {}: {}", id, e);
        };
        self.schema.check_patch(payload).inspect_err(reject)?;

        let _guard = self.write_lock.lock().await;
        let existing = self.bounded("get_by_id", self.store.get_by_id(id)).await?;
        let fields = self.schema.merge(&existing.fields, payload).inspect_err(reject)?;

        let updated_at = advance(existing.updated_at);
        let ticket = WriteTicket::new();
        let item = self
            .bounded_write(
                "update",
                &ticket,
                self.store.update(id, &fields, updated_at, &ticket),
            )
            .await?;
        tracing::info!("Updated item with id: {}", id);
        Ok(item)
    }

    pub async fn delete(&self, id: &str) -> ControllerResult<()> {
        let _guard = self.write_lock.lock().await;
        let ticket = WriteTicket::new();
        self.bounded_write("remove", &ticket, self.store.remove(id, &ticket))
            .await?;
        tracing::info!("Deleted item with id: {}", id);
        Ok(())
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        call: impl Future<Output = StoreResult<T>>,
    ) -> StoreResult<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(self.timed_out(operation)),
        }
    }

    /// Bound a mutation until the backend claims `ticket`, then await it
    async fn bounded_write<T>(
        &self,
        operation: &str,
        ticket: &WriteTicket,
        call: impl Future<Output = StoreResult<T>>,
    ) -> StoreResult<T> {
        let mut call = pin!(call);
        match tokio::time::timeout(self.timeout, call.as_mut()).await {
            Ok(result) => result,
            Err(_) if ticket.abandon() => Err(self.timed_out(operation)),
            Err(_) => {
                tracing::warn!(
                    "Store {} exceeded {:?} after starting, waiting for it to finish",
                    operation,
                    self.timeout
                );
                call.await
            }
        }
    }

    fn timed_out(&self, operation: &str) -> StoreError {
        tracing::error!("Store {} timed out after {:?}", operation, self.timeout);
        StoreError::unavailable(format!("{} timed out after {:?}", operation, self.timeout))
    }
}

/// Current time, or just past `previous` if the clock has not moved beyond it
fn advance(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + chrono::Duration::microseconds(1)
    }
}
