//! Blob-style persistence: the whole collection under one key.
//!
//! A [`BlobStore`] only knows how to get and set opaque values by key, so
//! [`BlobItemStore`] keeps the entire item list as one JSON array and runs
//! every mutation as load, mutate in memory, save. Those cycles are
//! serialized on an internal mutex; without it two concurrent writers would
//! each save their own copy and one update would be lost. The single save is
//! the only side effect, so the write ticket is claimed just before it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value as JsonValue};
use tokio::sync::Mutex;

use super::{self_test_value, ItemStore, StoreError, StoreResult, WriteTicket};
use crate::models::Item;

/// Single-key value storage
#[async_trait]
pub trait BlobStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns `None` when nothing has been stored under `key` yet
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Atomically replaces the value under `key`
    async fn set(&self, key: &str, value: Vec<u8>) -> StoreResult<()>;

    async fn ping(&self) -> StoreResult<String>;
}

pub struct BlobItemStore<B> {
    blob: B,
    key: String,
    write_lock: Mutex<()>,
}

impl<B: BlobStore> BlobItemStore<B> {
    pub fn new(blob: B, key: impl Into<String>) -> Self {
        Self {
            blob,
            key: key.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn blob(&self) -> &B {
        &self.blob
    }

    /// Decodes the stored collection; a missing key is an empty collection
    pub async fn load_all(&self) -> StoreResult<Vec<Item>> {
        match self.blob.get(&self.key).await? {
            None => Ok(Vec::new()),
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                StoreError::corrupt_with(
                    format!("value under key '{}' is not an item list", self.key),
                    e,
                )
            }),
        }
    }

    /// Replaces the stored collection with `items`
    pub async fn save_all(&self, items: &[Item]) -> StoreResult<()> {
        let bytes = serde_json::to_vec(items)
            .map_err(|e| StoreError::corrupt_with("failed to encode item list", e))?;
        self.blob.set(&self.key, bytes).await?;
        tracing::debug!("Saved {} items under key '{}'", items.len(), self.key);
        Ok(())
    }

    /// Runs one load-mutate-save cycle while holding the write lock
    ///
    /// Nothing is saved when `mutate` fails or the ticket was abandoned.
    async fn mutate<T, F>(&self, ticket: &WriteTicket, mutate: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Vec<Item>) -> StoreResult<T> + Send,
        T: Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut items = self.load_all().await?;
        let result = mutate(&mut items)?;
        ticket.begin()?;
        self.save_all(&items).await?;
        Ok(result)
    }

    fn self_test_key(&self) -> String {
        format!("{}-self-test", self.key)
    }
}

#[async_trait]
impl<B: BlobStore> ItemStore for BlobItemStore<B> {
    fn backend_name(&self) -> &'static str {
        self.blob.name()
    }

    async fn load_all(&self) -> StoreResult<Vec<Item>> {
        BlobItemStore::load_all(self).await
    }

    async fn get_by_id(&self, id: &str) -> StoreResult<Item> {
        self.load_all()
            .await?
            .into_iter()
            .find(|item| item.id == id)
            .ok_or_else(|| StoreError::not_found(id))
    }

    async fn insert(&self, item: &Item, ticket: &WriteTicket) -> StoreResult<()> {
        self.mutate(ticket, |items| {
            if items.iter().any(|existing| existing.id == item.id) {
                return Err(StoreError::conflict(item.id.clone()));
            }
            items.push(item.clone());
            Ok(())
        })
        .await
    }

    async fn update(
        &self,
        id: &str,
        fields: &Map<String, JsonValue>,
        updated_at: DateTime<Utc>,
        ticket: &WriteTicket,
    ) -> StoreResult<Item> {
        self.mutate(ticket, |items| {
            let item = items
                .iter_mut()
                .find(|item| item.id == id)
                .ok_or_else(|| StoreError::not_found(id))?;
            item.fields = fields.clone();
            item.updated_at = updated_at;
            Ok(item.clone())
        })
        .await
    }

    async fn remove(&self, id: &str, ticket: &WriteTicket) -> StoreResult<()> {
        self.mutate(ticket, |items| {
            let position = items
                .iter()
                .position(|item| item.id == id)
                .ok_or_else(|| StoreError::not_found(id))?;
            items.remove(position);
            Ok(())
        })
        .await
    }

    async fn health_check(&self) -> StoreResult<String> {
        self.blob.ping().await
    }

    async fn self_test(&self) -> StoreResult<String> {
        let key = self.self_test_key();
        let written = self_test_value();
        self.blob.set(&key, written.clone().into_bytes()).await?;
        let read = self
            .blob
            .get(&key)
            .await?
            .ok_or_else(|| StoreError::unavailable(format!("'{}' vanished after being written", key)))?;
        let read = String::from_utf8(read)
            .map_err(|e| StoreError::corrupt_with(format!("'{}' is not UTF-8", key), e))?;
        if read != written {
            return Err(StoreError::corrupt(format!(
                "'{}' read back '{}', expected '{}'",
                key, read, written
            )));
        }
        Ok(read)
    }
}
