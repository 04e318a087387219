//! Error types for the vault module.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The model or history entry does not exist.
    #[error("not found")]
    NotFound,

    /// A new model's id is already taken.
    #[error("model already exists")]
    AlreadyExists,

    /// Authentication tag check failed. Carries no detail on purpose.
    #[error("integrity check failed")]
    Integrity,

    /// Document exceeds the configured ceiling.
    #[error("document of {size} bytes exceeds limit of {limit}")]
    DocumentTooLarge { size: usize, limit: usize },

    /// The resource lock was not obtained in time.
    #[error("resource lock not acquired within {0:?}")]
    LockTimeout(Duration),

    /// Key derivation failed (bad parameters).
    #[error("key derivation failed: {0}")]
    Kdf(String),

    /// Compression or decompression failed.
    #[error("compression error: {0}")]
    Compression(#[from] std::io::Error),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] threatvault_store::StoreError),

    /// Blocking task failed.
    #[error("task error: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for VaultError {
    fn from(e: tokio::task::JoinError) -> Self {
        VaultError::Task(e.to_string())
    }
}

/// Result type for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
