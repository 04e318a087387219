//! Error types for the auth module.

use thiserror::Error;

use crate::throttle::ResourceKind;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing, malformed, expired or unknown key or token.
    ///
    /// Deliberately carries no detail: "wrong credential" and "no such
    /// tenant" must be indistinguishable to the caller.
    #[error("not authenticated")]
    Unauthenticated,

    /// The creation rate limit for this resource kind was hit.
    #[error("creation throttle exceeded for {0}")]
    Throttled(ResourceKind),

    /// A freshly drawn key collided with an existing namespace.
    #[error("tenant namespace already exists")]
    NamespaceExists,

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] threatvault_store::StoreError),
}

impl From<threatvault_core::CoreError> for AuthError {
    fn from(e: threatvault_core::CoreError) -> Self {
        tracing::debug!(error = %e, "rejecting credential");
        AuthError::Unauthenticated
    }
}

/// Result type for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;
