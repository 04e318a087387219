//! Strong type definitions for threatvault.
//!
//! All credentials and identifiers are newtypes to prevent misuse at compile
//! time. Secret material zeroizes on drop and never prints in `Debug`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::codec::{decode_credential, encode_credential};
use crate::crypto::{random_bytes, sha256, sha512_hex, xor_fixed, KEY_SIZE};
use crate::error::{CoreError, Result};

/// Bytes of the capability key used as Argon2 salt; the rest is the secret.
pub const SALT_LEN: usize = 16;

/// A 256-bit tenant capability.
///
/// Handed to the client exactly once and never persisted. The tenant's
/// storage partition is derived from it with [`CapabilityKey::namespace`].
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct CapabilityKey([u8; KEY_SIZE]);

impl CapabilityKey {
    /// Draw a fresh key from the OS CSPRNG.
    pub fn generate() -> Self {
        Self(random_bytes())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// The storage namespace of this tenant: hex SHA-512 of the key.
    pub fn namespace(&self) -> Namespace {
        Namespace(sha512_hex(&self.0))
    }

    /// First [`SALT_LEN`] bytes, used as the key-derivation salt.
    pub fn salt(&self) -> &[u8] {
        &self.0[..SALT_LEN]
    }

    /// Remaining bytes, used as the key-derivation secret.
    pub fn secret(&self) -> &[u8] {
        &self.0[SALT_LEN..]
    }

    /// Encode for the `key` header.
    pub fn to_base64(&self) -> String {
        encode_credential(&self.0)
    }

    /// Decode a `key` header value.
    pub fn from_base64(text: &str) -> Result<Self> {
        decode_credential(text).map(Self)
    }
}

impl fmt::Debug for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CapabilityKey(<redacted>)")
    }
}

/// The server-held random pad of a session token.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct TokenPad([u8; KEY_SIZE]);

impl TokenPad {
    /// Draw a fresh pad from the OS CSPRNG.
    pub fn generate() -> Self {
        Self(random_bytes())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for TokenPad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenPad(<redacted>)")
    }
}

/// An ephemeral bearer credential: `key XOR pad`.
///
/// On its own the token reveals nothing about the key; recovering the key
/// requires the pad, which only the server holds.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SessionToken([u8; KEY_SIZE]);

impl SessionToken {
    /// Derive the token for `key` under `pad`.
    pub fn derive(key: &CapabilityKey, pad: &TokenPad) -> Self {
        Self(xor_fixed(key.as_bytes(), pad.as_bytes()))
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Recover the capability key: `token XOR pad`.
    pub fn recover_key(&self, pad: &TokenPad) -> CapabilityKey {
        CapabilityKey(xor_fixed(&self.0, pad.as_bytes()))
    }

    /// SHA-256 of the token, the index under which its record is held.
    pub fn hash(&self) -> TokenHash {
        TokenHash(sha256(&self.0))
    }

    /// Encode for the `token` header.
    pub fn to_base64(&self) -> String {
        encode_credential(&self.0)
    }

    /// Decode a `token` header value.
    pub fn from_base64(text: &str) -> Result<Self> {
        decode_credential(text).map(Self)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// SHA-256 of a session token.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenHash(pub [u8; 32]);

impl TokenHash {
    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for TokenHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenHash({}...)", &self.to_hex()[..8])
    }
}

/// Name of the tenant marker inside a namespace.
pub const TENANT_MARKER: &str = ".tenant";

/// A tenant's storage partition: lowercase hex SHA-512 of its capability key.
///
/// Always a deterministic digest, never a client-supplied path fragment.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Namespace(String);

impl Namespace {
    /// Length of the hex digest.
    pub const LEN: usize = 128;

    /// Parse a stored namespace, checking that it is a SHA-512 hex digest.
    pub fn parse(text: &str) -> Result<Self> {
        let valid = text.len() == Self::LEN
            && text
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(Self(text.to_string()))
        } else {
            Err(CoreError::InvalidNamespace(text.chars().take(16).collect()))
        }
    }

    /// The full digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A short prefix, safe for logs.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }

    /// Storage key of the marker whose presence means the tenant exists.
    pub fn marker_key(&self) -> String {
        format!("{}/{}", self.0, TENANT_MARKER)
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Namespace({}...)", self.short())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one model resource inside a namespace.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelId(Uuid);

impl ModelId {
    /// Allocate a fresh random (v4) model id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse a model id from a path parameter.
    pub fn parse(text: &str) -> Result<Self> {
        Uuid::parse_str(text.trim())
            .map(Self)
            .map_err(|_| CoreError::InvalidModelId(text.chars().take(64).collect()))
    }
}

impl Default for ModelId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for ModelId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Debug for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelId({})", self.0)
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Canonical hyphenated lowercase form, also used in storage keys.
        write!(f, "{}", self.0.hyphenated())
    }
}
