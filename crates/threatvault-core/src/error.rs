//! Error types for threatvault core.

use thiserror::Error;

/// Errors raised by the pure primitives.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// XOR operands differ in length.
    #[error("length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// A credential was empty, not base64url, or the wrong size.
    #[error("malformed credential: {0}")]
    MalformedCredential(String),

    /// A model identifier is not a UUID.
    #[error("invalid model id: {0}")]
    InvalidModelId(String),

    /// A namespace is not a 128-character lowercase hex digest.
    #[error("invalid namespace: {0}")]
    InvalidNamespace(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
