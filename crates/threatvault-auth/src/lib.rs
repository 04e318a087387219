//! # threatvault Auth
//!
//! Tenant authentication: capability keys, session tokens and the creation
//! throttle.
//!
//! ## Overview
//!
//! A client first obtains a capability key, exchanges it for a short-lived
//! session token, and presents the token on every later call. The server keeps
//! no durable secret: the key is returned once and only its SHA-512 digest
//! (the tenant namespace) ever touches storage.
//!
//! ## Key Types
//!
//! - [`CapabilityKeyStore`] - mints keys and maps them to namespaces
//! - [`SessionTokenBroker`] - issues, verifies and revokes session tokens
//! - [`CreationThrottle`] - sliding-window limit on resource creation
//! - [`Tenant`] - a verified `(key, namespace)` pair handed to the vault
//!
//! ## Token Model
//!
//! ```text
//! token = key XOR pad          (pad: fresh 256-bit random, server-held)
//! index = SHA-256(token)       -> { pad, created_at, last_accessed_at }
//! ```
//!
//! At most one live token exists per namespace. Records expire when idle
//! longer than the soft timeout or older than the hard timeout.

pub mod broker;
pub mod error;
pub mod keystore;
pub mod throttle;

pub use broker::{SessionTokenBroker, Tenant, TokenConfig};
pub use error::{AuthError, Result};
pub use keystore::CapabilityKeyStore;
pub use threatvault_core::TENANT_MARKER;
pub use throttle::{CreationThrottle, ResourceKind, ThrottleConfig};

/// Get current time in milliseconds.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
