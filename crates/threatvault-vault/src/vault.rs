//! Encrypted model vault.
//!
//! Stores one sealed document per `(namespace, model)` at
//! `<namespace>/<model>/document`, with backups under
//! `<namespace>/<model>/history/`. Every storage access to a model happens
//! while holding that model's [`FolderLock`](crate::lock::FolderLock).
//!
//! Key derivation and sealing are CPU-bound and run on the blocking pool
//! outside the lock; only the storage read-modify-write is serialized.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use threatvault_core::{CapabilityKey, ModelId, Namespace};
use threatvault_store::{BlobStore, StoreExt};

use crate::crypto::{self, KdfParams, SymmetricKey};
use crate::error::{Result, VaultError};
use crate::history::HistoryArchive;
use crate::lock::{FolderLock, FolderLockManager};

/// Name of the document blob inside a model.
pub const DOCUMENT: &str = "document";

/// Vault settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    /// History entries kept per model.
    pub history_retention: usize,
    /// Bound on waiting for a model's lock; `None` waits forever.
    pub lock_timeout: Option<Duration>,
    /// Largest plaintext document accepted or produced, in bytes.
    pub max_document_bytes: usize,
    /// Argon2id cost.
    pub kdf: KdfParams,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            history_retention: 50,
            lock_timeout: Some(Duration::from_secs(60)),
            max_document_bytes: 50_000_000,
            kdf: KdfParams::default(),
        }
    }
}

/// How a write treats the model's current document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    /// Store whether or not a document exists.
    Upsert { skip_backup: bool },
    /// The document must not exist yet.
    Create,
    /// The document must exist; it is backed up first.
    Replace,
}

/// Encrypted per-tenant document storage.
pub struct EncryptedModelVault<S: BlobStore> {
    store: Arc<S>,
    locks: FolderLockManager,
    history: HistoryArchive<S>,
    config: VaultConfig,
}

impl<S: BlobStore> EncryptedModelVault<S> {
    /// Create a vault over `store`.
    pub fn new(store: Arc<S>, config: VaultConfig) -> Self {
        Self {
            locks: FolderLockManager::new(config.lock_timeout),
            history: HistoryArchive::new(Arc::clone(&store), config.history_retention),
            store,
            config,
        }
    }

    /// The active settings.
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// The lock registry.
    pub fn locks(&self) -> &FolderLockManager {
        &self.locks
    }

    /// Storage path of a model: `<namespace>/<model>`.
    pub fn model_path(namespace: &Namespace, id: &ModelId) -> String {
        format!("{}/{}", namespace, id)
    }

    fn document_key(model: &str) -> String {
        format!("{}/{}", model, DOCUMENT)
    }

    /// Derive the symmetric key on the blocking pool.
    pub async fn derive_key(&self, key: &CapabilityKey) -> Result<SymmetricKey> {
        let key = key.clone();
        let params = self.config.kdf;
        tokio::task::spawn_blocking(move || crypto::derive_symmetric_key(&key, &params)).await?
    }

    /// Lock a whole namespace against model creation and tenant deletion.
    ///
    /// Taken before any model lock of the same namespace.
    pub async fn lock_namespace(&self, namespace: &Namespace) -> Result<FolderLock> {
        self.locks.acquire(namespace.as_str()).await
    }

    /// Encrypt and store `plaintext` as the model's document.
    ///
    /// Unless `skip_backup` is set, the current document (if any) is first
    /// copied into history under `reason`. A failed write leaves the previous
    /// document in place. Runs under the namespace lock; fails with
    /// [`VaultError::NotFound`] once the tenant is gone.
    pub async fn write(
        &self,
        key: &CapabilityKey,
        id: &ModelId,
        plaintext: &str,
        reason: &str,
        skip_backup: bool,
    ) -> Result<()> {
        self.store_document(key, id, plaintext, reason, WriteMode::Upsert { skip_backup })
            .await
    }

    /// Store the first document of a new model.
    ///
    /// Runs under the namespace lock, so it cannot interleave with a tenant
    /// deletion. An existing document is never overwritten.
    pub async fn create(
        &self,
        key: &CapabilityKey,
        id: &ModelId,
        plaintext: &str,
        reason: &str,
    ) -> Result<()> {
        self.store_document(key, id, plaintext, reason, WriteMode::Create)
            .await
    }

    /// Replace the document of an existing model, backing up the old one.
    ///
    /// Fails with [`VaultError::NotFound`] if the model was deleted meanwhile.
    pub async fn replace(
        &self,
        key: &CapabilityKey,
        id: &ModelId,
        plaintext: &str,
        reason: &str,
    ) -> Result<()> {
        self.store_document(key, id, plaintext, reason, WriteMode::Replace)
            .await
    }

    async fn store_document(
        &self,
        key: &CapabilityKey,
        id: &ModelId,
        plaintext: &str,
        reason: &str,
        mode: WriteMode,
    ) -> Result<()> {
        let limit = self.config.max_document_bytes;
        if plaintext.len() > limit {
            return Err(VaultError::DocumentTooLarge {
                size: plaintext.len(),
                limit,
            });
        }

        let symmetric = self.derive_key(key).await?;
        let text = plaintext.to_string();
        let sealed =
            tokio::task::spawn_blocking(move || crypto::seal_document(&symmetric, &text)).await??;

        let namespace = key.namespace();
        let model = Self::model_path(&namespace, id);
        let document = Self::document_key(&model);

        // Anything that may bring a model into existence excludes tenant
        // deletion for its whole span.
        let _namespace_lock = match mode {
            WriteMode::Upsert { .. } | WriteMode::Create => {
                Some(self.lock_namespace(&namespace).await?)
            }
            WriteMode::Replace => None,
        };
        let _lock = self.locks.acquire(&model).await?;

        if !self.store.exists(&namespace.marker_key()).await? {
            tracing::warn!(model = %id, "write to a deleted tenant refused");
            return Err(VaultError::NotFound);
        }
        let skip_backup = match mode {
            WriteMode::Upsert { skip_backup } => skip_backup,
            WriteMode::Create => {
                if self.store.exists(&document).await? {
                    return Err(VaultError::AlreadyExists);
                }
                true
            }
            WriteMode::Replace => {
                if !self.store.exists(&document).await? {
                    return Err(VaultError::NotFound);
                }
                false
            }
        };

        if !skip_backup {
            self.history.on_write(&model, &document, reason).await?;
        }
        self.store.put(&document, Bytes::from(sealed)).await?;

        tracing::debug!(model = %id, bytes = plaintext.len(), ?mode, "wrote model document");
        Ok(())
    }

    /// Load, authenticate and decrypt the model's document.
    pub async fn read(&self, key: &CapabilityKey, id: &ModelId) -> Result<String> {
        let model = Self::model_path(&key.namespace(), id);

        let sealed = {
            let _lock = self.locks.acquire(&model).await?;
            self.store.get(&Self::document_key(&model)).await?
        }
        .ok_or(VaultError::NotFound)?;

        self.open(key, sealed).await
    }

    /// Whether the model has a document.
    pub async fn exists(&self, key: &CapabilityKey, id: &ModelId) -> Result<bool> {
        let model = Self::model_path(&key.namespace(), id);
        let _lock = self.locks.acquire(&model).await?;
        Ok(self.store.exists(&Self::document_key(&model)).await?)
    }

    /// Remove a model with its history. Returns whether anything was removed.
    pub async fn delete(&self, key: &CapabilityKey, id: &ModelId) -> Result<bool> {
        let model = Self::model_path(&key.namespace(), id);
        let _lock = self.locks.acquire(&model).await?;
        let removed = self.store.delete_prefix(&format!("{}/", model)).await?;

        tracing::debug!(model = %id, removed, "deleted model");
        Ok(removed > 0)
    }

    /// Model ids present in the tenant's namespace, sorted.
    pub async fn list(&self, namespace: &Namespace) -> Result<Vec<ModelId>> {
        let children = self.store.children(&format!("{}/", namespace)).await?;
        Ok(children
            .iter()
            .filter_map(|name| ModelId::parse(name).ok())
            .collect())
    }

    /// History entry names of a model, oldest first.
    pub async fn list_history(&self, key: &CapabilityKey, id: &ModelId) -> Result<Vec<String>> {
        let model = Self::model_path(&key.namespace(), id);
        let _lock = self.locks.acquire(&model).await?;
        self.history.list(&model).await
    }

    /// Decrypt one history entry.
    pub async fn read_history(&self, key: &CapabilityKey, id: &ModelId, entry: &str) -> Result<String> {
        let model = Self::model_path(&key.namespace(), id);
        let entry_key = HistoryArchive::<S>::entry_key(&model, entry).ok_or(VaultError::NotFound)?;

        let sealed = {
            let _lock = self.locks.acquire(&model).await?;
            self.store.get(&entry_key).await?
        }
        .ok_or(VaultError::NotFound)?;

        self.open(key, sealed).await
    }

    async fn open(&self, key: &CapabilityKey, sealed: Bytes) -> Result<String> {
        let symmetric = self.derive_key(key).await?;
        let limit = self.config.max_document_bytes;
        let opened =
            tokio::task::spawn_blocking(move || crypto::open_document(&symmetric, &sealed, limit))
                .await?;
        if matches!(opened, Err(VaultError::Integrity)) {
            tracing::warn!("document failed authentication");
        }
        opened
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use threatvault_store::MemoryStore;

    fn fast_config() -> VaultConfig {
        VaultConfig {
            kdf: KdfParams {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
            ..VaultConfig::default()
        }
    }

    fn vault() -> (Arc<MemoryStore>, EncryptedModelVault<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (Arc::clone(&store), EncryptedModelVault::new(Arc::clone(&store), fast_config()))
    }

    /// A key whose tenant marker exists.
    async fn tenant(store: &MemoryStore) -> CapabilityKey {
        let key = CapabilityKey::generate();
        store.put(&key.namespace().marker_key(), Bytes::new()).await.unwrap();
        key
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let (store, vault) = vault();
        let key = tenant(&store).await;
        let id = ModelId::new();

        vault.write(&key, &id, "title: A", "create", true).await.unwrap();
        assert_eq!(vault.read(&key, &id).await.unwrap(), "title: A");
        assert!(vault.exists(&key, &id).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_model_is_not_found() {
        let (_store, vault) = vault();
        let key = CapabilityKey::generate();

        assert!(matches!(
            vault.read(&key, &ModelId::new()).await,
            Err(VaultError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_stored_bytes_are_not_plaintext() {
        let (store, vault) = vault();
        let key = tenant(&store).await;
        let id = ModelId::new();
        vault.write(&key, &id, "title: secret architecture", "c", true).await.unwrap();

        let model = EncryptedModelVault::<MemoryStore>::model_path(&key.namespace(), &id);
        let raw = store.get(&format!("{}/{}", model, DOCUMENT)).await.unwrap().unwrap();
        assert!(!raw.windows(6).any(|w| w == b"secret"));
    }

    #[tokio::test]
    async fn test_tampered_document_fails_integrity() {
        let (store, vault) = vault();
        let key = tenant(&store).await;
        let id = ModelId::new();
        vault.write(&key, &id, "title: A", "c", true).await.unwrap();

        let doc = format!(
            "{}/{}",
            EncryptedModelVault::<MemoryStore>::model_path(&key.namespace(), &id),
            DOCUMENT
        );
        let mut raw = store.get(&doc).await.unwrap().unwrap().to_vec();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        store.put(&doc, Bytes::from(raw)).await.unwrap();

        assert!(matches!(vault.read(&key, &id).await, Err(VaultError::Integrity)));
    }

    #[tokio::test]
    async fn test_other_tenant_cannot_read() {
        let (store, vault) = vault();
        let owner = tenant(&store).await;
        let stranger = CapabilityKey::generate();
        let id = ModelId::new();
        vault.write(&owner, &id, "title: A", "c", true).await.unwrap();

        // Different namespace, so the model is simply absent.
        assert!(matches!(vault.read(&stranger, &id).await, Err(VaultError::NotFound)));
    }

    #[tokio::test]
    async fn test_history_holds_previous_version() {
        let (store, vault) = vault();
        let key = tenant(&store).await;
        let id = ModelId::new();

        vault.write(&key, &id, "title: A", "New Model Creation", true).await.unwrap();
        vault.write(&key, &id, "title: B", "Model Import", false).await.unwrap();

        let entries = vault.list_history(&key, &id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].ends_with(" Model Import.backup"));
        assert_eq!(vault.read_history(&key, &id, &entries[0]).await.unwrap(), "title: A");
        assert_eq!(vault.read(&key, &id).await.unwrap(), "title: B");
    }

    #[tokio::test]
    async fn test_oversized_document_rejected() {
        let store = Arc::new(MemoryStore::new());
        let vault = EncryptedModelVault::new(
            store,
            VaultConfig {
                max_document_bytes: 8,
                ..fast_config()
            },
        );
        let key = CapabilityKey::generate();

        assert!(matches!(
            vault.write(&key, &ModelId::new(), "title: too long", "c", true).await,
            Err(VaultError::DocumentTooLarge { limit: 8, .. })
        ));
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let (store, vault) = vault();
        let key = tenant(&store).await;
        let (a, b) = (ModelId::new(), ModelId::new());

        vault.write(&key, &a, "a", "c", true).await.unwrap();
        vault.write(&key, &b, "b", "c", true).await.unwrap();
        vault.write(&key, &b, "b2", "edit", false).await.unwrap();

        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(vault.list(&key.namespace()).await.unwrap(), expected);

        assert!(vault.delete(&key, &b).await.unwrap());
        assert!(!vault.delete(&key, &b).await.unwrap());
        assert_eq!(vault.list(&key.namespace()).await.unwrap(), vec![a]);
        assert_eq!(vault.locks().active(), 0);
    }

    #[tokio::test]
    async fn test_write_after_tenant_deleted_is_refused() {
        let (store, vault) = vault();
        let key = tenant(&store).await;
        let id = ModelId::new();
        store.delete(&key.namespace().marker_key()).await.unwrap();

        assert!(matches!(
            vault.create(&key, &id, "title: orphan", "c").await,
            Err(VaultError::NotFound)
        ));
        assert!(matches!(
            vault.write(&key, &id, "title: orphan", "c", true).await,
            Err(VaultError::NotFound)
        ));
        assert!(store.list(&format!("{}/", key.namespace())).await.unwrap().is_empty());
        assert_eq!(vault.locks().active(), 0);
    }

    #[tokio::test]
    async fn test_create_and_replace_modes() {
        let (store, vault) = vault();
        let key = tenant(&store).await;
        let id = ModelId::new();

        assert!(matches!(
            vault.replace(&key, &id, "title: B", "edit").await,
            Err(VaultError::NotFound)
        ));
        vault.create(&key, &id, "title: A", "c").await.unwrap();
        assert!(matches!(
            vault.create(&key, &id, "title: A2", "c").await,
            Err(VaultError::AlreadyExists)
        ));

        vault.replace(&key, &id, "title: B", "edit").await.unwrap();
        assert_eq!(vault.read(&key, &id).await.unwrap(), "title: B");
        assert_eq!(vault.list_history(&key, &id).await.unwrap().len(), 1);

        // A replace racing a delete must not bring the model back.
        assert!(vault.delete(&key, &id).await.unwrap());
        assert!(matches!(
            vault.replace(&key, &id, "title: C", "edit").await,
            Err(VaultError::NotFound)
        ));
        assert!(vault.list(&key.namespace()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_waits_for_namespace_lock() {
        let store = Arc::new(MemoryStore::new());
        let vault = EncryptedModelVault::new(
            Arc::clone(&store),
            VaultConfig {
                lock_timeout: Some(Duration::from_millis(50)),
                ..fast_config()
            },
        );
        let key = tenant(&store).await;

        let held = vault.lock_namespace(&key.namespace()).await.unwrap();
        assert!(matches!(
            vault.create(&key, &ModelId::new(), "title: A", "c").await,
            Err(VaultError::LockTimeout(_))
        ));
        drop(held);
        vault.create(&key, &ModelId::new(), "title: A", "c").await.unwrap();
    }
}
