//! Error types for the service facade.
//!
//! Every failure a caller can observe is one of these variants.
//! [`ServiceError::status_code`] and [`ServiceError::public_message`] give
//! the HTTP-style status and the text that may be shown to a client.

use threatvault_auth::{AuthError, ResourceKind};
use threatvault_core::CoreError;
use threatvault_store::StoreError;
use threatvault_vault::VaultError;
use thiserror::Error;

/// Longest client-visible message, in characters.
const MAX_PUBLIC_MESSAGE: usize = 200;

/// Errors that can occur during service operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Missing, malformed, expired or unknown key or token.
    #[error("not authenticated")]
    Authentication,

    /// Unknown model or history entry.
    #[error("not found")]
    NotFound,

    /// A stored document failed authentication.
    #[error("integrity check failed")]
    Integrity,

    /// Creation rate limit hit.
    #[error("creation throttle exceeded for {0}")]
    Throttled(ResourceKind),

    /// Upload exceeds the size ceiling.
    #[error("payload of {size} bytes exceeds limit of {limit}")]
    PayloadTooLarge { size: usize, limit: usize },

    /// The model validator rejected a document.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A resource lock could not be obtained in time.
    #[error("resource busy")]
    LockTimeout,

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A request handler panicked; the panic was contained.
    #[error("request aborted: {0}")]
    Aborted(String),

    /// Storage, crypto plumbing or task failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// HTTP-style status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::Authentication | ServiceError::NotFound => 404,
            ServiceError::Integrity => 500,
            ServiceError::Throttled(_) => 429,
            ServiceError::PayloadTooLarge { .. } => 413,
            ServiceError::Validation(_) | ServiceError::Aborted(_) => 400,
            ServiceError::LockTimeout => 503,
            ServiceError::Config(_) | ServiceError::Internal(_) => 500,
        }
    }

    /// Message safe to show a client.
    ///
    /// Authentication failures read exactly like a missing resource.
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::Authentication | ServiceError::NotFound => "not found".to_string(),
            ServiceError::Integrity => "unable to open model".to_string(),
            ServiceError::Throttled(_) => "too many creations, retry later".to_string(),
            ServiceError::PayloadTooLarge { .. } => "payload too large".to_string(),
            ServiceError::Validation(message) | ServiceError::Aborted(message) => {
                trim_message(message)
            }
            ServiceError::LockTimeout => "resource busy, retry later".to_string(),
            ServiceError::Config(_) | ServiceError::Internal(_) => "internal error".to_string(),
        }
    }
}

/// Trim whitespace and cap the length of a client-visible message.
pub(crate) fn trim_message(message: &str) -> String {
    message.trim().chars().take(MAX_PUBLIC_MESSAGE).collect()
}

impl From<AuthError> for ServiceError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Unauthenticated => ServiceError::Authentication,
            AuthError::Throttled(kind) => ServiceError::Throttled(kind),
            AuthError::NamespaceExists => ServiceError::Internal(e.to_string()),
            AuthError::Store(e) => e.into(),
        }
    }
}

impl From<VaultError> for ServiceError {
    fn from(e: VaultError) -> Self {
        match e {
            VaultError::NotFound => ServiceError::NotFound,
            VaultError::Integrity => ServiceError::Integrity,
            VaultError::DocumentTooLarge { size, limit } => {
                ServiceError::PayloadTooLarge { size, limit }
            }
            VaultError::LockTimeout(_) => ServiceError::LockTimeout,
            VaultError::Store(e) => e.into(),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        tracing::error!(error = %e, "storage failure");
        ServiceError::Internal(e.to_string())
    }
}

impl From<CoreError> for ServiceError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidModelId(_) => ServiceError::NotFound,
            _ => ServiceError::Authentication,
        }
    }
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
