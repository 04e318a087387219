//! SQLite implementation of the BlobStore trait.
//!
//! Keeps every blob in one table of a single database file. Useful where a
//! deployment prefers one file over a directory tree. Uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, StoreError};
use crate::keys::{validate_key, validate_prefix};
use crate::migration;
use crate::traits::{BlobStore, InsertResult};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Execute a blocking operation on the connection.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            f(&mut conn)
        })
        .await?
    }
}

#[async_trait]
impl BlobStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        validate_key(key)?;
        let key = key.to_string();

        self.with_conn(move |conn| {
            let value: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT value FROM blobs WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value.map(Bytes::from))
        })
        .await
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<()> {
        validate_key(key)?;
        let key = key.to_string();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO blobs (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                updated_at = excluded.updated_at",
                params![key, &value[..], now_millis()],
            )?;
            Ok(())
        })
        .await
    }

    async fn create(&self, key: &str, value: Bytes) -> Result<InsertResult> {
        validate_key(key)?;
        let key = key.to_string();

        self.with_conn(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO blobs (key, value, updated_at) VALUES (?1, ?2, ?3)",
                params![key, &value[..], now_millis()],
            )?;
            Ok(if inserted == 1 {
                InsertResult::Inserted
            } else {
                InsertResult::AlreadyExists
            })
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        let key = key.to_string();

        self.with_conn(move |conn| {
            let removed = conn.execute("DELETE FROM blobs WHERE key = ?1", params![key])?;
            Ok(removed > 0)
        })
        .await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        validate_prefix(prefix)?;
        let prefix = prefix.to_string();

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT key FROM blobs
                 WHERE substr(key, 1, length(?1)) = ?1
                 ORDER BY key",
            )?;
            let keys = stmt
                .query_map(params![prefix], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(keys)
        })
        .await
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        if prefix.is_empty() {
            return Err(StoreError::InvalidKey("refusing to delete the whole store".into()));
        }
        validate_prefix(prefix)?;
        let prefix = prefix.to_string();

        self.with_conn(move |conn| {
            let removed = conn.execute(
                "DELETE FROM blobs WHERE substr(key, 1, length(?1)) = ?1",
                params![prefix],
            )?;
            Ok(removed)
        })
        .await
    }
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sqlite_store_basic() {
        let store = SqliteStore::open_memory().unwrap();

        store.put("ns/m/document", Bytes::from_static(b"v1")).await.unwrap();
        store.put("ns/m/document", Bytes::from_static(b"v2")).await.unwrap();

        assert_eq!(
            store.get("ns/m/document").await.unwrap(),
            Some(Bytes::from_static(b"v2"))
        );
        assert_eq!(store.get("ns/m/missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sqlite_store_create_is_exclusive() {
        let store = SqliteStore::open_memory().unwrap();

        let r1 = store.create("ns/.tenant", Bytes::new()).await.unwrap();
        let r2 = store.create("ns/.tenant", Bytes::from_static(b"x")).await.unwrap();

        assert_eq!(r1, InsertResult::Inserted);
        assert_eq!(r2, InsertResult::AlreadyExists);
        assert_eq!(store.get("ns/.tenant").await.unwrap(), Some(Bytes::new()));
    }

    #[tokio::test]
    async fn test_sqlite_store_prefix_ops() {
        let store = SqliteStore::open_memory().unwrap();
        for key in ["ns/a/document", "ns/a/history/1", "ns/b/document", "nsx/c"] {
            store.put(key, Bytes::from_static(b"v")).await.unwrap();
        }

        assert_eq!(
            store.list("ns/").await.unwrap(),
            vec!["ns/a/document", "ns/a/history/1", "ns/b/document"]
        );
        assert_eq!(store.delete_prefix("ns/a/").await.unwrap(), 2);
        assert!(store.delete("nsx/c").await.unwrap());
        assert_eq!(store.list("").await.unwrap(), vec!["ns/b/document"]);
    }

    #[tokio::test]
    async fn test_sqlite_store_persists_across_open() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("vault.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.put("ns/doc", Bytes::from_static(b"kept")).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get("ns/doc").await.unwrap(), Some(Bytes::from_static(b"kept")));
    }
}
