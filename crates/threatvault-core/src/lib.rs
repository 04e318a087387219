//! # threatvault Core
//!
//! Pure primitives for the threatvault tenant subsystem: capability keys,
//! session tokens, storage namespaces and model identifiers.
//!
//! This crate contains no I/O, no storage, no clocks. It is pure computation
//! over fixed-size credential material.
//!
//! ## Key Types
//!
//! - [`CapabilityKey`] - 256-bit tenant capability; possession is authorization
//! - [`SessionToken`] - ephemeral bearer credential, `key XOR pad`
//! - [`TokenPad`] - the server-held half of a session token
//! - [`TokenHash`] - SHA-256 of a token, the only token-derived value indexed
//! - [`Namespace`] - hex SHA-512 of a capability key, the tenant's storage partition
//! - [`ModelId`] - UUID addressing one model resource inside a namespace
//!
//! ## Credential transport
//!
//! Keys and tokens travel as base64url without padding. See [`codec`].

pub mod codec;
pub mod crypto;
pub mod error;
pub mod types;

pub use codec::{decode_credential, encode_credential};
pub use crypto::{random_bytes, sha256, sha512_hex, xor, xor_fixed, KEY_SIZE};
pub use error::{CoreError, Result};
pub use types::{
    CapabilityKey, ModelId, Namespace, SessionToken, TokenHash, TokenPad, SALT_LEN, TENANT_MARKER,
};
