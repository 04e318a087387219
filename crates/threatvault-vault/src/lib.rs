//! # threatvault Vault
//!
//! Encrypted, history-keeping document storage for tenant threat models.
//!
//! ## Overview
//!
//! Each tenant's models live under its namespace. A document is gzip
//! compressed, sealed with AES-256-GCM under a key derived from the tenant's
//! capability key by Argon2id, and stored as `nonce || ciphertext`. Before an
//! overwrite the previous sealed bytes are copied into a bounded history.
//!
//! ## Key Types
//!
//! - [`EncryptedModelVault`] - read / write / delete documents under locks
//! - [`FolderLockManager`] - per-resource async mutex registry
//! - [`HistoryArchive`] - backups before overwrite, pruned to a bound
//! - [`KdfParams`], [`VaultConfig`] - tuning
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use threatvault_core::{CapabilityKey, ModelId};
//! use threatvault_store::{BlobStore, MemoryStore};
//! use threatvault_vault::{EncryptedModelVault, VaultConfig};
//!
//! # async fn example() -> threatvault_vault::Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! let vault = EncryptedModelVault::new(Arc::clone(&store), VaultConfig::default());
//! let key = CapabilityKey::generate();
//! let id = ModelId::new();
//!
//! // Writes are refused unless the tenant marker exists.
//! store.put(&key.namespace().marker_key(), Bytes::new()).await?;
//!
//! vault.create(&key, &id, "title: A", "New Model Creation").await?;
//! vault.replace(&key, &id, "title: B", "Model Import").await?;
//! assert_eq!(vault.read(&key, &id).await?, "title: B");
//! # Ok(())
//! # }
//! ```
//!
//! ## Design Notes
//!
//! - Derived keys are never cached; each request pays the Argon2id cost.
//! - A failed tag check is [`VaultError::Integrity`] and yields no plaintext.
//! - All storage access to one model is serialized by its lock; different
//!   models proceed in parallel.
//! - Model creation also takes the namespace lock, which tenant deletion
//!   holds for its whole run.

pub mod crypto;
pub mod error;
pub mod history;
pub mod lock;
pub mod vault;

pub use crypto::{derive_symmetric_key, KdfParams, SymmetricKey, NONCE_LEN};
pub use error::{Result, VaultError};
pub use history::{sanitize_reason, HistoryArchive, BACKUP_SUFFIX, HISTORY_DIR};
pub use lock::{FolderLock, FolderLockManager};
pub use vault::{EncryptedModelVault, VaultConfig, DOCUMENT};
