//! # threatvault Store
//!
//! Storage abstraction for threatvault. Tenant data is addressed by
//! slash-separated string keys and persisted as opaque byte blobs behind the
//! [`BlobStore`] trait, so the crypto and locking layers never touch a
//! filesystem directly.
//!
//! ## Key Types
//!
//! - [`BlobStore`] - The async trait: get / put / create / delete / list / delete-prefix
//! - [`FsStore`] - One file per key under a root directory (default deployment)
//! - [`SqliteStore`] - All blobs in a single SQLite file
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`InsertResult`] - Result of an exclusive create
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use threatvault_store::{BlobStore, FsStore, InsertResult};
//!
//! async fn example() {
//!     let store = FsStore::open("/var/lib/threatvault").unwrap();
//!
//!     let created = store
//!         .create("tenant/.tenant", Bytes::new())
//!         .await
//!         .unwrap();
//!     assert_eq!(created, InsertResult::Inserted);
//!
//!     store.put("tenant/model/document", Bytes::from_static(b"...")).await.unwrap();
//!     let keys = store.list("tenant/").await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Key hygiene**: every backend rejects empty, `.` and `..` components,
//!   so keys can never escape their prefix.
//! - **Atomic replace**: `put` either fully replaces the value or leaves the
//!   previous one untouched.
//! - **Exclusive create**: `create` never overwrites; it reports `AlreadyExists`.

pub mod error;
pub mod fs;
pub mod keys;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use fs::FsStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{BlobStore, InsertResult, StoreExt};
