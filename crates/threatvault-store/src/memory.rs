//! In-memory implementation of the BlobStore trait.
//!
//! This is primarily for testing. It has the same semantics as the
//! filesystem and SQLite backends but keeps everything in memory.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::error::{Result, StoreError};
use crate::keys::{validate_key, validate_prefix};
use crate::traits::{BlobStore, InsertResult};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    blobs: RwLock<BTreeMap<String, Bytes>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        validate_key(key)?;
        Ok(self.blobs.read().get(key).cloned())
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<()> {
        validate_key(key)?;
        self.blobs.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn create(&self, key: &str, value: Bytes) -> Result<InsertResult> {
        validate_key(key)?;
        let mut blobs = self.blobs.write();

        if blobs.contains_key(key) {
            return Ok(InsertResult::AlreadyExists);
        }
        blobs.insert(key.to_string(), value);
        Ok(InsertResult::Inserted)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.blobs.write().remove(key).is_some())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        validate_prefix(prefix)?;
        let blobs = self.blobs.read();

        Ok(blobs
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        if prefix.is_empty() {
            return Err(StoreError::InvalidKey("refusing to delete the whole store".into()));
        }
        validate_prefix(prefix)?;
        let mut blobs = self.blobs.write();

        let doomed: Vec<String> = blobs
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            blobs.remove(key);
        }
        Ok(doomed.len())
    }
}
