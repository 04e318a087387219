//! BlobStore trait: the abstract interface for tenant persistence.
//!
//! This trait keeps the vault storage-agnostic. Implementations include the
//! local filesystem (primary), SQLite and in-memory (for tests).

use std::collections::BTreeSet;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::keys::SEPARATOR;

/// Result of an exclusive create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    /// The key was new and the value was stored.
    Inserted,
    /// The key already existed; nothing was written.
    AlreadyExists,
}

/// The BlobStore trait: async keyed-blob persistence.
///
/// All methods are async to support both blocking (filesystem, SQLite) and
/// natively async backends. Blocking backends use `spawn_blocking` internally.
///
/// # Design Notes
///
/// - **Atomic replace**: `put` either stores the whole new value or leaves
///   the previous one in place.
/// - **Exclusive create**: `create` never overwrites an existing key.
/// - **Sorted listings**: `list` returns full keys in ascending byte order.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: Bytes) -> Result<()>;

    /// Store `value` under `key` only if the key is absent.
    async fn create(&self, key: &str, value: Bytes) -> Result<InsertResult>;

    /// Remove `key`. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// List every key starting with `prefix`, sorted.
    ///
    /// `prefix` is empty or ends with `/`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Remove every key starting with `prefix`. Returns how many were removed.
    ///
    /// `prefix` must be non-empty and end with `/`.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize>;

    /// Check whether `key` exists.
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}

/// Extension trait for common store patterns.
pub trait StoreExt: BlobStore {
    /// Names of the immediate children under `prefix`, sorted and deduplicated.
    ///
    /// For keys `a/x/1`, `a/x/2` and `a/y` the children of `a/` are `x` and `y`.
    fn children(
        &self,
        prefix: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;
}

impl<S: BlobStore + ?Sized> StoreExt for S {
    async fn children(&self, prefix: &str) -> Result<Vec<String>> {
        let keys = self.list(prefix).await?;

        let names: BTreeSet<String> = keys
            .iter()
            .filter_map(|key| key.strip_prefix(prefix))
            .filter_map(|rest| rest.split(SEPARATOR).next())
            .filter(|name| !name.is_empty())
            .map(String::from)
            .collect();

        Ok(names.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[tokio::test]
    async fn test_children_deduplicates() {
        let store = MemoryStore::new();
        for key in ["a/x/1", "a/x/2", "a/y", "b/z"] {
            store.put(key, Bytes::from_static(b"v")).await.unwrap();
        }

        assert_eq!(store.children("a/").await.unwrap(), vec!["x", "y"]);
        assert_eq!(store.children("").await.unwrap(), vec!["a", "b"]);
        assert!(store.children("c/").await.unwrap().is_empty());
    }
}
