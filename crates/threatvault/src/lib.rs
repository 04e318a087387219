//! # threatvault
//!
//! Multi-tenant, server-side storage for threat models that keeps no durable
//! secret.
//!
//! ## Overview
//!
//! A client obtains a **capability key**, exchanges it for a short-lived
//! **session token**, and presents the token on every model request. The
//! server derives the tenant's storage namespace and encryption key from the
//! key on each request and forgets both afterwards.
//!
//! - **Keys**: 256-bit random values; the namespace is their SHA-512 digest
//! - **Tokens**: `key XOR pad`, one live token per tenant, soft and hard expiry
//! - **Vault**: gzip + AES-256-GCM documents under an Argon2id-derived key
//! - **History**: sealed prior versions, bounded per model
//! - **Throttle**: sliding-window cap on key and model creation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use threatvault::{Service, ServiceConfig};
//! use threatvault::store::FsStore;
//!
//! async fn example() -> threatvault::Result<()> {
//!     let store = FsStore::open("/var/lib/threatvault").unwrap();
//!     let service = Service::new(store, ServiceConfig::default())?;
//!
//!     let key = service.create_key().await?;
//!     let token = service.create_token(&key).await?;
//!
//!     let id = service.create_model(&token).await?.to_string();
//!     service.import_model(&token, &id, "title: Payment Gateway").await?;
//!     let document = service.get_model(&token, &id).await?;
//!     assert_eq!(document, "title: Payment Gateway");
//!     Ok(())
//! }
//! ```
//!
//! ## Errors
//!
//! Every operation returns [`ServiceError`]. Use
//! [`ServiceError::status_code`] and [`ServiceError::public_message`] to
//! build a response; authentication failures are indistinguishable from
//! missing resources.
//!
//! ## Re-exports
//!
//! - `threatvault::core` - keys, tokens, namespaces, model ids
//! - `threatvault::store` - storage backends
//! - `threatvault::auth` - key store, token broker, throttle
//! - `threatvault::vault` - encrypted documents, locks, history

pub mod config;
pub mod error;
pub mod service;
pub mod validator;

// Re-export component crates
pub use threatvault_auth as auth;
pub use threatvault_core as core;
pub use threatvault_store as store;
pub use threatvault_vault as vault;

// Re-export main types for convenience
pub use config::{ServiceConfig, DEFAULT_STUB_MODEL};
pub use error::{Result, ServiceError};
pub use service::{Service, Stats, REASON_CREATE, REASON_IMPORT};
pub use validator::{AcceptAll, ModelValidator};

pub use threatvault_auth::{ResourceKind, Tenant};
pub use threatvault_core::{CapabilityKey, ModelId, Namespace, SessionToken};
