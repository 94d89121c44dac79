//! In-memory [`BlobStore`].
//!
//! Holds values for the lifetime of the owning process or test. Nothing is
//! persisted.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{BlobStore, StoreResult};

#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn ping(&self) -> StoreResult<String> {
        let keys = self.entries.read().len();
        Ok(format!("in-process ({} keys)", keys))
    }
}
