//! The Service: one owned instance of every shared registry.
//!
//! Brings together the key store, token broker, throttle and vault behind
//! the operations a request handler needs. Credentials arrive as the
//! base64url text of the `key` / `token` headers.
//!
//! Each operation runs as its own task. A panic inside it is contained,
//! logged and reported as [`ServiceError::Aborted`]; locks held by the task
//! are released as it unwinds.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use threatvault_auth::{
    CapabilityKeyStore, CreationThrottle, ResourceKind, SessionTokenBroker, Tenant,
};
use threatvault_core::{CapabilityKey, ModelId, SessionToken};
use threatvault_store::BlobStore;
use threatvault_vault::{EncryptedModelVault, FolderLock};

use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError};
use crate::validator::{AcceptAll, ModelValidator};

/// History reason recorded when a model is created.
pub const REASON_CREATE: &str = "New Model Creation";

/// History reason recorded when a model is imported.
pub const REASON_IMPORT: &str = "Model Import";

/// Tenant and model counts across the whole store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    /// Tenants present.
    pub key_count: usize,
    /// Models present across all tenants.
    pub model_count: usize,
}

/// Multi-tenant model storage service.
///
/// Cheap to clone; clones share every registry.
pub struct Service<S: BlobStore + 'static> {
    inner: Arc<Inner<S>>,
}

impl<S: BlobStore + 'static> Clone for Service<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<S: BlobStore> {
    store: Arc<S>,
    keys: CapabilityKeyStore<S>,
    broker: SessionTokenBroker<S>,
    throttle: CreationThrottle,
    vault: EncryptedModelVault<S>,
    validator: Box<dyn ModelValidator>,
    config: ServiceConfig,
}

impl<S: BlobStore + 'static> Service<S> {
    /// Create a service that accepts every document.
    pub fn new(store: S, config: ServiceConfig) -> Result<Self> {
        Self::with_validator(store, config, AcceptAll)
    }

    /// Create a service that checks imports and updates with `validator`.
    pub fn with_validator(
        store: S,
        config: ServiceConfig,
        validator: impl ModelValidator + 'static,
    ) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(store);
        let keys = CapabilityKeyStore::new(Arc::clone(&store));
        let inner = Inner {
            broker: SessionTokenBroker::new(keys.clone(), config.token),
            throttle: CreationThrottle::new(config.throttle),
            vault: EncryptedModelVault::new(Arc::clone(&store), config.vault.clone()),
            validator: Box::new(validator),
            store,
            keys,
            config,
        };

        tracing::info!(
            history_retention = inner.config.vault.history_retention,
            max_creations = inner.config.throttle.max_creations,
            "service started"
        );
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.inner.config
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<S> {
        &self.inner.store
    }

    /// The session token broker.
    pub fn broker(&self) -> &SessionTokenBroker<S> {
        &self.inner.broker
    }

    /// The creation throttle.
    pub fn throttle(&self) -> &CreationThrottle {
        &self.inner.throttle
    }

    /// The vault.
    pub fn vault(&self) -> &EncryptedModelVault<S> {
        &self.inner.vault
    }

    // =========================================================================
    // Keys and tokens
    // =========================================================================

    /// Create a tenant. Returns its capability key, exactly once.
    pub async fn create_key(&self) -> Result<String> {
        self.run("create_key", |inner| async move {
            inner.throttle.check(ResourceKind::Key)?;
            let key = inner.keys.create_key().await?;
            Ok(key.to_base64())
        })
        .await
    }

    /// Delete a tenant with all of its models and its live token.
    pub async fn delete_key(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.run("delete_key", |inner| async move {
            let key = CapabilityKey::from_base64(&key)?;
            let namespace = inner.keys.require(&key).await?;

            // The namespace lock keeps new models out; every model lock keeps
            // existing ones from being mid-write. Sorted order rules out cycles.
            let namespace_lock = inner.vault.lock_namespace(&namespace).await?;
            let mut held: Vec<FolderLock> = Vec::new();
            for id in inner.vault.list(&namespace).await? {
                let path = EncryptedModelVault::<S>::model_path(&namespace, &id);
                held.push(inner.vault.locks().acquire(&path).await?);
            }

            inner.broker.revoke_namespace(&namespace);
            inner.keys.delete_key(&key).await?;
            drop(held);
            drop(namespace_lock);
            Ok(())
        })
        .await
    }

    /// Exchange a capability key for a session token.
    ///
    /// Any previous token of the tenant stops working.
    pub async fn create_token(&self, key: &str) -> Result<String> {
        let key = key.to_string();
        self.run("create_token", |inner| async move {
            let key = CapabilityKey::from_base64(&key)?;
            let token = inner.broker.issue_token(&key).await?;
            Ok(token.to_base64())
        })
        .await
    }

    /// Revoke a session token. Unknown tokens are reported as not found.
    pub async fn delete_token(&self, token: &str) -> Result<()> {
        let token = token.to_string();
        self.run("delete_token", |inner| async move {
            let token = SessionToken::from_base64(&token)?;
            if inner.broker.revoke(&token) {
                Ok(())
            } else {
                Err(ServiceError::Authentication)
            }
        })
        .await
    }

    // =========================================================================
    // Models
    // =========================================================================

    /// Create a model holding the stub document. Returns its id.
    pub async fn create_model(&self, token: &str) -> Result<ModelId> {
        let token = token.to_string();
        self.run("create_model", |inner| async move {
            let tenant = inner.authenticate(&token).await?;
            inner.throttle.check(ResourceKind::Model)?;

            let id = ModelId::new();
            inner
                .vault
                .create(&tenant.key, &id, &inner.config.stub_model, REASON_CREATE)
                .await?;
            tracing::info!(model = %id, namespace = tenant.namespace.short(), "created model");
            Ok(id)
        })
        .await
    }

    /// Ids of the tenant's models, sorted.
    pub async fn list_models(&self, token: &str) -> Result<Vec<ModelId>> {
        let token = token.to_string();
        self.run("list_models", |inner| async move {
            let tenant = inner.authenticate(&token).await?;
            Ok(inner.vault.list(&tenant.namespace).await?)
        })
        .await
    }

    /// Decrypted document of one model.
    pub async fn get_model(&self, token: &str, model_id: &str) -> Result<String> {
        let (token, model_id) = (token.to_string(), model_id.to_string());
        self.run("get_model", |inner| async move {
            let tenant = inner.authenticate(&token).await?;
            let id = ModelId::parse(&model_id)?;
            Ok(inner.vault.read(&tenant.key, &id).await?)
        })
        .await
    }

    /// Replace a model's document with an uploaded one.
    pub async fn import_model(&self, token: &str, model_id: &str, document: &str) -> Result<()> {
        self.update_model(token, model_id, REASON_IMPORT, document).await
    }

    /// Replace a model's document, recording `reason` in its history.
    ///
    /// The model must exist and still open with the caller's key; the new
    /// document must pass the validator.
    pub async fn update_model(
        &self,
        token: &str,
        model_id: &str,
        reason: &str,
        document: &str,
    ) -> Result<()> {
        let limit = self.inner.config.vault.max_document_bytes;
        if document.len() > limit {
            return Err(ServiceError::PayloadTooLarge {
                size: document.len(),
                limit,
            });
        }

        let (token, model_id) = (token.to_string(), model_id.to_string());
        let (reason, document) = (reason.to_string(), document.to_string());
        self.run("update_model", |inner| async move {
            let tenant = inner.authenticate(&token).await?;
            let id = ModelId::parse(&model_id)?;
            inner.vault.read(&tenant.key, &id).await?;

            inner
                .validator
                .validate(&document)
                .map_err(ServiceError::Validation)?;
            inner
                .vault
                .replace(&tenant.key, &id, &document, &reason)
                .await?;
            Ok(())
        })
        .await
    }

    /// Delete a model and its history.
    pub async fn delete_model(&self, token: &str, model_id: &str) -> Result<()> {
        let (token, model_id) = (token.to_string(), model_id.to_string());
        self.run("delete_model", |inner| async move {
            let tenant = inner.authenticate(&token).await?;
            let id = ModelId::parse(&model_id)?;
            if inner.vault.delete(&tenant.key, &id).await? {
                Ok(())
            } else {
                Err(ServiceError::NotFound)
            }
        })
        .await
    }

    /// History entry names of a model, oldest first.
    pub async fn list_history(&self, token: &str, model_id: &str) -> Result<Vec<String>> {
        let (token, model_id) = (token.to_string(), model_id.to_string());
        self.run("list_history", |inner| async move {
            let tenant = inner.authenticate(&token).await?;
            let id = ModelId::parse(&model_id)?;
            if !inner.vault.exists(&tenant.key, &id).await? {
                return Err(ServiceError::NotFound);
            }
            Ok(inner.vault.list_history(&tenant.key, &id).await?)
        })
        .await
    }

    /// Decrypted content of one history entry.
    pub async fn read_history(&self, token: &str, model_id: &str, entry: &str) -> Result<String> {
        let (token, model_id, entry) = (token.to_string(), model_id.to_string(), entry.to_string());
        self.run("read_history", |inner| async move {
            let tenant = inner.authenticate(&token).await?;
            let id = ModelId::parse(&model_id)?;
            Ok(inner.vault.read_history(&tenant.key, &id, &entry).await?)
        })
        .await
    }

    /// Tenant and model counts.
    pub async fn stats(&self) -> Result<Stats> {
        self.run("stats", |inner| async move {
            let mut stats = Stats::default();
            for namespace in inner.keys.namespaces().await? {
                stats.key_count += 1;
                stats.model_count += inner.vault.list(&namespace).await?.len();
            }
            Ok(stats)
        })
        .await
    }

    /// Resolve a token to its tenant, for collaborators that stream derived
    /// artifacts of a model.
    pub async fn authenticate(&self, token: &str) -> Result<Tenant> {
        let token = token.to_string();
        self.run("authenticate", |inner| async move { inner.authenticate(&token).await })
            .await
    }

    /// Run one operation as a task, containing any panic.
    async fn run<T, F, Fut>(&self, operation: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(Arc<Inner<S>>) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let result = match tokio::spawn(f(Arc::clone(&self.inner))).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => {
                let message = panic_message(e.into_panic());
                tracing::error!(operation, panic = %message, "request handler panicked");
                Err(ServiceError::Aborted(message))
            }
            Err(e) => Err(ServiceError::Internal(e.to_string())),
        };

        if let Err(e) = &result {
            tracing::debug!(operation, status = e.status_code(), error = %e, "request failed");
        }
        result
    }
}

impl<S: BlobStore + 'static> Inner<S> {
    async fn authenticate(&self, token: &str) -> Result<Tenant> {
        let token = SessionToken::from_base64(token).map_err(|e| {
            tracing::warn!(error = %e, "rejected malformed token");
            ServiceError::Authentication
        })?;
        Ok(self.broker.verify_token(&token).await?)
    }
}

/// Text of a panic payload.
fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unexpected failure".to_string()),
    }
}
