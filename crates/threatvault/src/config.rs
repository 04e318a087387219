//! Service configuration.
//!
//! [`ServiceConfig::default`] carries the production values. An override file
//! in JSON may set any subset of fields; durations are whole seconds.
//!
//! ```json
//! {
//!   "token": { "soft_timeout_secs": 1800, "hard_timeout_secs": 36000 },
//!   "throttle": { "window_secs": 180, "max_creations": 20 },
//!   "vault": {
//!     "history_retention": 50,
//!     "lock_timeout_secs": 60,
//!     "max_document_bytes": 50000000,
//!     "kdf": { "memory_kib": 65536, "iterations": 3, "parallelism": 2 }
//!   }
//! }
//! ```
//!
//! `"lock_timeout_secs": null` waits for locks without bound.

use std::time::Duration;

use serde::Deserialize;
use threatvault_auth::{ThrottleConfig, TokenConfig};
use threatvault_vault::{KdfParams, VaultConfig};

use crate::error::{Result, ServiceError};

/// Blank document written for a newly created model.
pub const DEFAULT_STUB_MODEL: &str = r#"title: New Threat Model
author:
  name: ""
  homepage: ""
date:
business_overview:
  description: ""
  images: []
technical_overview:
  description: ""
  images: []
business_criticality: ""
management_summary_comment: ""
questions: {}
abuse_cases: {}
security_requirements: {}
tags_available: []
data_assets: {}
technical_assets: {}
trust_boundaries: {}
shared_runtimes: {}
individual_risk_categories: {}
risk_tracking: {}
"#;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Session token expiry.
    pub token: TokenConfig,
    /// Creation throttle.
    pub throttle: ThrottleConfig,
    /// Vault, history and key derivation.
    pub vault: VaultConfig,
    /// Document written by `create_model`.
    pub stub_model: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            token: TokenConfig::default(),
            throttle: ThrottleConfig::default(),
            vault: VaultConfig::default(),
            stub_model: DEFAULT_STUB_MODEL.to_string(),
        }
    }
}

impl ServiceConfig {
    /// Parse an override document; missing fields keep their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let file: ConfigFile =
            serde_json::from_str(text).map_err(|e| ServiceError::Config(e.to_string()))?;
        let config = file.into_config();
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.throttle.max_creations == 0 {
            return Err(ServiceError::Config("throttle.max_creations must be positive".into()));
        }
        if self.vault.max_document_bytes == 0 {
            return Err(ServiceError::Config("vault.max_document_bytes must be positive".into()));
        }
        if self.stub_model.len() > self.vault.max_document_bytes {
            return Err(ServiceError::Config("stub_model exceeds max_document_bytes".into()));
        }
        if self.token.soft_timeout > self.token.hard_timeout {
            tracing::warn!("token soft timeout exceeds hard timeout; hard timeout governs");
        }
        Ok(())
    }
}

/// On-disk shape of the configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    token: TokenSection,
    throttle: ThrottleSection,
    vault: VaultSection,
    stub_model: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TokenSection {
    soft_timeout_secs: u64,
    hard_timeout_secs: u64,
}

impl Default for TokenSection {
    fn default() -> Self {
        let d = TokenConfig::default();
        Self {
            soft_timeout_secs: d.soft_timeout.as_secs(),
            hard_timeout_secs: d.hard_timeout.as_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ThrottleSection {
    window_secs: u64,
    max_creations: usize,
}

impl Default for ThrottleSection {
    fn default() -> Self {
        let d = ThrottleConfig::default();
        Self {
            window_secs: d.window.as_secs(),
            max_creations: d.max_creations,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct VaultSection {
    history_retention: usize,
    lock_timeout_secs: Option<u64>,
    max_document_bytes: usize,
    kdf: KdfParams,
}

impl Default for VaultSection {
    fn default() -> Self {
        let d = VaultConfig::default();
        Self {
            history_retention: d.history_retention,
            lock_timeout_secs: d.lock_timeout.map(|t| t.as_secs()),
            max_document_bytes: d.max_document_bytes,
            kdf: d.kdf,
        }
    }
}

impl ConfigFile {
    fn into_config(self) -> ServiceConfig {
        ServiceConfig {
            token: TokenConfig {
                soft_timeout: Duration::from_secs(self.token.soft_timeout_secs),
                hard_timeout: Duration::from_secs(self.token.hard_timeout_secs),
            },
            throttle: ThrottleConfig {
                window: Duration::from_secs(self.throttle.window_secs),
                max_creations: self.throttle.max_creations,
            },
            vault: VaultConfig {
                history_retention: self.vault.history_retention,
                lock_timeout: self.vault.lock_timeout_secs.map(Duration::from_secs),
                max_document_bytes: self.vault.max_document_bytes,
                kdf: self.vault.kdf,
            },
            stub_model: self.stub_model.unwrap_or_else(|| DEFAULT_STUB_MODEL.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_yields_defaults() {
        assert_eq!(ServiceConfig::from_json("{}").unwrap(), ServiceConfig::default());
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.token.soft_timeout, Duration::from_secs(30 * 60));
        assert_eq!(config.token.hard_timeout, Duration::from_secs(10 * 3600));
        assert_eq!(config.throttle.window, Duration::from_secs(180));
        assert_eq!(config.throttle.max_creations, 20);
        assert_eq!(config.vault.history_retention, 50);
        assert_eq!(config.vault.max_document_bytes, 50_000_000);
        assert_eq!(config.vault.kdf.memory_kib, 65536);
    }

    #[test]
    fn test_partial_override() {
        let config = ServiceConfig::from_json(
            r#"{
                "throttle": { "max_creations": 5 },
                "vault": { "lock_timeout_secs": null, "kdf": { "iterations": 1 } }
            }"#,
        )
        .unwrap();

        assert_eq!(config.throttle.max_creations, 5);
        assert_eq!(config.throttle.window, Duration::from_secs(180));
        assert_eq!(config.vault.lock_timeout, None);
        assert_eq!(config.vault.kdf.iterations, 1);
        assert_eq!(config.vault.kdf.memory_kib, 65536);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            ServiceConfig::from_json(r#"{ "tokens": {} }"#),
            Err(ServiceError::Config(_))
        ));
        assert!(matches!(
            ServiceConfig::from_json(r#"{ "throttle": { "max_creations": 0 } }"#),
            Err(ServiceError::Config(_))
        ));
        assert!(ServiceConfig::from_json("not json").is_err());
    }
}
