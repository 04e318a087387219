//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use tempfile::TempDir;
use threatvault::{Service, ServiceConfig};
use threatvault_store::{FsStore, MemoryStore};
use threatvault_vault::KdfParams;

/// Argon2id parameters cheap enough for tests.
pub fn fast_kdf() -> KdfParams {
    KdfParams {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    }
}

/// Production defaults with [`fast_kdf`].
pub fn fast_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.vault.kdf = fast_kdf();
    config
}

/// A tenant's credentials, as a client would hold them.
#[derive(Debug, Clone)]
pub struct TestTenant {
    /// Base64url capability key.
    pub key: String,
    /// Base64url session token.
    pub token: String,
}

/// A service over an in-memory store.
pub struct TestFixture {
    pub service: Service<MemoryStore>,
}

impl TestFixture {
    /// Create a fixture with [`fast_config`].
    pub fn new() -> Self {
        Self::with_config(fast_config())
    }

    /// Create a fixture with the given configuration.
    pub fn with_config(config: ServiceConfig) -> Self {
        crate::init_test_tracing();
        let service = Service::new(MemoryStore::new(), config).expect("invalid test configuration");
        Self { service }
    }

    /// Create a tenant and issue it a token.
    pub async fn tenant(&self) -> TestTenant {
        let key = self.service.create_key().await.unwrap();
        let token = self.service.create_token(&key).await.unwrap();
        TestTenant { key, token }
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A service over a filesystem store in a temporary directory.
pub struct FsFixture {
    pub service: Service<FsStore>,
    /// Removed when the fixture is dropped.
    pub dir: TempDir,
}

impl FsFixture {
    /// Create a fixture with [`fast_config`].
    pub fn new() -> Self {
        crate::init_test_tracing();
        let dir = TempDir::new().unwrap();
        let store = FsStore::open(dir.path().join("keys")).unwrap();
        let service = Service::new(store, fast_config()).unwrap();
        Self { service, dir }
    }

    /// Create a tenant and issue it a token.
    pub async fn tenant(&self) -> TestTenant {
        let key = self.service.create_key().await.unwrap();
        let token = self.service.create_token(&key).await.unwrap();
        TestTenant { key, token }
    }
}

impl Default for FsFixture {
    fn default() -> Self {
        Self::new()
    }
}
