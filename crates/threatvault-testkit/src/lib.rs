//! # threatvault Testkit
//!
//! Testing utilities for threatvault.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a ready [`Service`](threatvault::Service) with cheap key
//!   derivation, plus helpers that mint a tenant and its token
//! - **Generators**: proptest strategies for keys, documents and reasons
//! - **Tracing**: [`init_test_tracing`] for readable logs in failing tests
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use threatvault_testkit::TestFixture;
//!
//! # async fn example() {
//! let fixture = TestFixture::new();
//! let tenant = fixture.tenant().await;
//! let id = fixture.service.create_model(&tenant.token).await.unwrap();
//! # }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use threatvault_testkit::generators::model_document;
//!
//! proptest! {
//!     #[test]
//!     fn documents_are_utf8(doc in model_document(256)) {
//!         prop_assert!(doc.len() <= 256 * 4);
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{fast_config, fast_kdf, FsFixture, TestFixture, TestTenant};

/// Install a `tracing` subscriber driven by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
