//! Session token broker.
//!
//! Issues tokens of the form `key XOR pad`. The server keeps the pad and two
//! timestamps, indexed by the token's SHA-256; the key itself is never
//! retained and is recovered per request by XOR-ing the presented token with
//! the stored pad.
//!
//! # Invariants
//!
//! - At most one live token per namespace. Issuing a new one evicts the old
//!   record in the same critical section that inserts the new one.
//! - `by_namespace[ns] == h` implies `by_hash[h].namespace == ns`.
//! - Records are never persisted; a restart invalidates every token.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use threatvault_core::{CapabilityKey, Namespace, SessionToken, TokenHash, TokenPad};
use threatvault_store::BlobStore;

use crate::error::{AuthError, Result};
use crate::keystore::CapabilityKeyStore;
use crate::now_millis;

/// Token expiry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenConfig {
    /// Maximum idle time since the last successful verification.
    pub soft_timeout: Duration,
    /// Maximum absolute age.
    pub hard_timeout: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            soft_timeout: Duration::from_secs(30 * 60),
            hard_timeout: Duration::from_secs(10 * 60 * 60),
        }
    }
}

/// A verified tenant: the recovered key and its namespace.
///
/// Lives for one request; the key is zeroed on drop.
#[derive(Debug, Clone)]
pub struct Tenant {
    /// The tenant's capability key.
    pub key: CapabilityKey,
    /// The namespace derived from the key.
    pub namespace: Namespace,
}

/// Server-side state of one live token.
struct TokenRecord {
    pad: TokenPad,
    namespace: Namespace,
    created_at: i64,
    last_accessed_at: i64,
}

impl TokenRecord {
    fn is_expired(&self, now: i64, config: &TokenConfig) -> bool {
        now - self.last_accessed_at > config.soft_timeout.as_millis() as i64
            || now - self.created_at > config.hard_timeout.as_millis() as i64
    }
}

/// The two token indexes, always mutated together.
#[derive(Default)]
struct Registry {
    by_hash: HashMap<TokenHash, TokenRecord>,
    by_namespace: HashMap<Namespace, TokenHash>,
}

impl Registry {
    fn remove(&mut self, hash: &TokenHash) -> Option<TokenRecord> {
        let record = self.by_hash.remove(hash)?;
        if self.by_namespace.get(&record.namespace) == Some(hash) {
            self.by_namespace.remove(&record.namespace);
        }
        Some(record)
    }

    fn sweep(&mut self, now: i64, config: &TokenConfig) -> usize {
        let expired: Vec<TokenHash> = self
            .by_hash
            .iter()
            .filter(|(_, record)| record.is_expired(now, config))
            .map(|(hash, _)| *hash)
            .collect();
        for hash in &expired {
            self.remove(hash);
        }
        expired.len()
    }
}

/// Issues, verifies and revokes session tokens.
pub struct SessionTokenBroker<S: BlobStore> {
    keys: CapabilityKeyStore<S>,
    config: TokenConfig,
    registry: Mutex<Registry>,
}

impl<S: BlobStore> SessionTokenBroker<S> {
    /// Create a broker that checks tenant existence through `keys`.
    pub fn new(keys: CapabilityKeyStore<S>, config: TokenConfig) -> Self {
        Self {
            keys,
            config,
            registry: Mutex::new(Registry::default()),
        }
    }

    /// The active settings.
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Issue a token for an existing tenant, invalidating any prior one.
    pub async fn issue_token(&self, key: &CapabilityKey) -> Result<SessionToken> {
        self.issue_token_at(key, now_millis()).await
    }

    /// Issue a token at `now` (Unix ms).
    pub async fn issue_token_at(&self, key: &CapabilityKey, now: i64) -> Result<SessionToken> {
        let namespace = self.keys.require(key).await?;

        let pad = TokenPad::generate();
        let token = SessionToken::derive(key, &pad);
        let hash = token.hash();

        let mut registry = self.registry.lock();
        registry.sweep(now, &self.config);
        if let Some(previous) = registry.by_namespace.get(&namespace).copied() {
            registry.remove(&previous);
            tracing::debug!(namespace = namespace.short(), "invalidated previous token");
        }
        registry.by_hash.insert(
            hash,
            TokenRecord {
                pad,
                namespace: namespace.clone(),
                created_at: now,
                last_accessed_at: now,
            },
        );
        registry.by_namespace.insert(namespace.clone(), hash);
        drop(registry);

        tracing::debug!(namespace = namespace.short(), "issued session token");
        Ok(token)
    }

    /// Resolve a token to its tenant.
    pub async fn verify_token(&self, token: &SessionToken) -> Result<Tenant> {
        self.verify_token_at(token, now_millis()).await
    }

    /// Resolve a token to its tenant at `now` (Unix ms).
    ///
    /// A successful verification refreshes the idle timer.
    pub async fn verify_token_at(&self, token: &SessionToken, now: i64) -> Result<Tenant> {
        let hash = token.hash();

        let pad = {
            let mut registry = self.registry.lock();
            registry.sweep(now, &self.config);
            let Some(record) = registry.by_hash.get_mut(&hash) else {
                tracing::warn!("rejected unknown session token");
                return Err(AuthError::Unauthenticated);
            };
            record.last_accessed_at = now;
            record.pad.clone()
        };

        let key = token.recover_key(&pad);
        match self.keys.resolve(&key).await? {
            Some(namespace) => Ok(Tenant { key, namespace }),
            None => {
                // The tenant was deleted while the token was live.
                self.registry.lock().remove(&hash);
                tracing::warn!("rejected token of a deleted tenant");
                Err(AuthError::Unauthenticated)
            }
        }
    }

    /// Delete a token's record. Returns whether it was live.
    pub fn revoke(&self, token: &SessionToken) -> bool {
        self.revoke_at(token, now_millis())
    }

    /// Delete a token's record at `now` (Unix ms).
    pub fn revoke_at(&self, token: &SessionToken, now: i64) -> bool {
        let mut registry = self.registry.lock();
        registry.sweep(now, &self.config);
        let removed = registry.remove(&token.hash()).is_some();
        tracing::debug!(removed, "revoked session token");
        removed
    }

    /// Drop the live token of `namespace`, if any.
    pub fn revoke_namespace(&self, namespace: &Namespace) -> bool {
        let mut registry = self.registry.lock();
        match registry.by_namespace.get(namespace).copied() {
            Some(hash) => registry.remove(&hash).is_some(),
            None => false,
        }
    }

    /// Evict expired records at `now` (Unix ms). Returns how many were evicted.
    pub fn sweep_at(&self, now: i64) -> usize {
        let evicted = self.registry.lock().sweep(now, &self.config);
        if evicted > 0 {
            tracing::debug!(evicted, "swept expired session tokens");
        }
        evicted
    }

    /// Number of records currently held.
    pub fn live_tokens(&self) -> usize {
        self.registry.lock().by_hash.len()
    }
}
