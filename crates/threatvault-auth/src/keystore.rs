//! Capability key store.
//!
//! A tenant exists exactly when the marker blob `<namespace>/.tenant` exists.
//! The namespace is the SHA-512 digest of the key, so the store never sees
//! the key itself and never builds a path from client input.

use std::sync::Arc;

use bytes::Bytes;
use threatvault_core::{CapabilityKey, Namespace};
use threatvault_store::{BlobStore, InsertResult, StoreExt};

use crate::error::{AuthError, Result};

/// Mints capability keys and resolves them to namespaces.
pub struct CapabilityKeyStore<S: BlobStore> {
    store: Arc<S>,
}

impl<S: BlobStore> Clone for CapabilityKeyStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: BlobStore> CapabilityKeyStore<S> {
    /// Create a key store over the given backend.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Storage key of a namespace's marker blob.
    pub fn marker_key(namespace: &Namespace) -> String {
        namespace.marker_key()
    }

    /// Storage prefix covering everything a namespace owns.
    pub fn namespace_prefix(namespace: &Namespace) -> String {
        format!("{}/", namespace)
    }

    /// Draw a fresh key and create its namespace.
    ///
    /// The key is returned exactly once; nothing derived from it other than
    /// the namespace digest is persisted.
    pub async fn create_key(&self) -> Result<CapabilityKey> {
        let key = CapabilityKey::generate();
        let namespace = key.namespace();

        match self
            .store
            .create(&Self::marker_key(&namespace), Bytes::new())
            .await?
        {
            InsertResult::Inserted => {
                tracing::info!(namespace = namespace.short(), "created tenant namespace");
                Ok(key)
            }
            InsertResult::AlreadyExists => {
                tracing::error!(namespace = namespace.short(), "namespace collision on key creation");
                Err(AuthError::NamespaceExists)
            }
        }
    }

    /// Resolve a key to its namespace, if the tenant exists.
    pub async fn resolve(&self, key: &CapabilityKey) -> Result<Option<Namespace>> {
        let namespace = key.namespace();
        if self.contains(&namespace).await? {
            Ok(Some(namespace))
        } else {
            Ok(None)
        }
    }

    /// Resolve a key or fail with [`AuthError::Unauthenticated`].
    pub async fn require(&self, key: &CapabilityKey) -> Result<Namespace> {
        self.resolve(key).await?.ok_or(AuthError::Unauthenticated)
    }

    /// Delete a tenant and everything in its namespace.
    ///
    /// Unknown keys fail with [`AuthError::Unauthenticated`]. The marker goes
    /// last, so an interrupted delete leaves a tenant that can be deleted
    /// again rather than orphaned data.
    pub async fn delete_key(&self, key: &CapabilityKey) -> Result<()> {
        let namespace = self.require(key).await?;
        let marker = Self::marker_key(&namespace);

        let mut removed = 0;
        for child in self.store.list(&Self::namespace_prefix(&namespace)).await? {
            if child != marker && self.store.delete(&child).await? {
                removed += 1;
            }
        }
        removed += self.store.delete_prefix(&Self::namespace_prefix(&namespace)).await?;

        tracing::info!(namespace = namespace.short(), removed, "deleted tenant namespace");
        Ok(())
    }

    /// Whether a tenant owns `namespace`.
    pub async fn contains(&self, namespace: &Namespace) -> Result<bool> {
        Ok(self.store.exists(&Self::marker_key(namespace)).await?)
    }

    /// Every tenant namespace present, sorted.
    pub async fn namespaces(&self) -> Result<Vec<Namespace>> {
        let mut namespaces = Vec::new();
        for name in self.store.children("").await? {
            let Ok(namespace) = Namespace::parse(&name) else {
                continue;
            };
            if self.contains(&namespace).await? {
                namespaces.push(namespace);
            }
        }
        Ok(namespaces)
    }
}
