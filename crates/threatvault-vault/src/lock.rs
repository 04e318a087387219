//! Per-resource locks.
//!
//! A registry maps resource paths to async mutexes. Entries are created on
//! first use and removed when the last holder or waiter lets go, so the
//! registry only ever holds paths that are in use.
//!
//! Acquisition returns a [`FolderLock`] guard; dropping it releases the lock
//! on every exit path, including early returns and panics.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::{Result, VaultError};

type Registry = HashMap<String, Arc<AsyncMutex<()>>>;

/// Registry of per-resource mutexes.
#[derive(Debug, Clone)]
pub struct FolderLockManager {
    registry: Arc<Mutex<Registry>>,
    timeout: Option<Duration>,
}

impl FolderLockManager {
    /// Create a manager. `timeout` bounds each acquisition; `None` waits forever.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            registry: Arc::new(Mutex::new(HashMap::new())),
            timeout,
        }
    }

    /// Wait for exclusive access to `path`.
    ///
    /// Re-acquiring a path already held by the same task never succeeds; with
    /// a timeout configured it fails with [`VaultError::LockTimeout`].
    pub async fn acquire(&self, path: &str) -> Result<FolderLock> {
        let mutex = Arc::clone(self.registry.lock().entry(path.to_string()).or_default());

        let guard = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, mutex.lock_owned()).await.ok(),
            None => Some(mutex.lock_owned().await),
        };

        match guard {
            Some(guard) => Ok(FolderLock {
                path: path.to_string(),
                guard: Some(guard),
                registry: Arc::clone(&self.registry),
            }),
            None => {
                release_entry(&mut self.registry.lock(), path);
                tracing::warn!(timeout = ?self.timeout, "resource lock wait timed out");
                Err(VaultError::LockTimeout(self.timeout.unwrap_or_default()))
            }
        }
    }

    /// Number of paths currently held or awaited.
    pub fn active(&self) -> usize {
        self.registry.lock().len()
    }
}

impl Default for FolderLockManager {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Drop the registry entry for `path` if nobody else references it.
fn release_entry(registry: &mut Registry, path: &str) {
    if registry
        .get(path)
        .is_some_and(|mutex| Arc::strong_count(mutex) == 1)
    {
        registry.remove(path);
    }
}

/// Exclusive hold on one resource path.
#[derive(Debug)]
pub struct FolderLock {
    path: String,
    guard: Option<OwnedMutexGuard<()>>,
    registry: Arc<Mutex<Registry>>,
}

impl FolderLock {
    /// The locked path.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Drop for FolderLock {
    fn drop(&mut self) {
        // Unlock and prune under the registry lock so a concurrent acquirer
        // either sees the entry still present or creates a fresh one.
        let mut registry = self.registry.lock();
        drop(self.guard.take());
        release_entry(&mut registry, &self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_lock_released_on_drop() {
        let locks = FolderLockManager::default();

        let guard = locks.acquire("ns/m1").await.unwrap();
        assert_eq!(guard.path(), "ns/m1");
        assert_eq!(locks.active(), 1);

        drop(guard);
        assert_eq!(locks.active(), 0);
        let _again = locks.acquire("ns/m1").await.unwrap();
    }

    #[tokio::test]
    async fn test_different_paths_do_not_block() {
        let locks = FolderLockManager::new(Some(Duration::from_millis(50)));

        let _a = locks.acquire("ns/m1").await.unwrap();
        let _b = locks.acquire("ns/m2").await.unwrap();
        assert_eq!(locks.active(), 2);
    }

    #[tokio::test]
    async fn test_reentry_times_out() {
        let locks = FolderLockManager::new(Some(Duration::from_millis(20)));

        let held = locks.acquire("ns/m1").await.unwrap();
        assert!(matches!(
            locks.acquire("ns/m1").await,
            Err(VaultError::LockTimeout(_))
        ));
        // The failed waiter must not have removed the holder's entry.
        assert_eq!(locks.active(), 1);
        drop(held);
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_critical_sections_do_not_overlap() {
        let locks = FolderLockManager::default();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let locks = locks.clone();
                let inside = Arc::clone(&inside);
                let max_seen = Arc::clone(&max_seen);
                tokio::spawn(async move {
                    let _guard = locks.acquire("ns/shared").await.unwrap();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_released_after_panic() {
        let locks = FolderLockManager::new(Some(Duration::from_secs(1)));

        let panicking = locks.clone();
        let result = tokio::spawn(async move {
            let _guard = panicking.acquire("ns/m1").await.unwrap();
            panic!("handler failed");
        })
        .await;
        assert!(result.unwrap_err().is_panic());

        assert_eq!(locks.active(), 0);
        assert!(locks.acquire("ns/m1").await.is_ok());
    }
}
