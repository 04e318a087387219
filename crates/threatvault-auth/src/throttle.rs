//! Sliding-window creation throttle.
//!
//! Each resource kind keeps the timestamps of its recent creations. A check
//! prunes entries older than the window and admits the request while fewer
//! than `max_creations` remain.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};
use crate::now_millis;

/// Kinds of resource whose creation is rate limited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourceKind {
    /// Capability keys (tenant namespaces).
    Key,
    /// Threat models.
    Model,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Key => write!(f, "KEY"),
            ResourceKind::Model => write!(f, "MODEL"),
        }
    }
}

/// Throttle settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// Length of the sliding window.
    pub window: Duration,
    /// Creations admitted per kind within one window.
    pub max_creations: usize,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(3 * 60),
            max_creations: 20,
        }
    }
}

/// Process-wide creation rate limiter.
#[derive(Debug, Default)]
pub struct CreationThrottle {
    config: ThrottleConfig,
    windows: Mutex<HashMap<ResourceKind, VecDeque<i64>>>,
}

impl CreationThrottle {
    /// Create a throttle with the given settings.
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// The active settings.
    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    /// Admit or reject one creation of `kind` now.
    pub fn check(&self, kind: ResourceKind) -> Result<()> {
        self.check_at(kind, now_millis())
    }

    /// Admit or reject one creation of `kind` at `now` (Unix ms).
    ///
    /// A rejected attempt is not recorded.
    pub fn check_at(&self, kind: ResourceKind, now: i64) -> Result<()> {
        let cutoff = now.saturating_sub(self.config.window.as_millis() as i64);
        let mut windows = self.windows.lock();

        // Prune every kind so idle windows do not linger.
        windows.retain(|_, stamps| {
            while stamps.front().is_some_and(|&t| t < cutoff) {
                stamps.pop_front();
            }
            !stamps.is_empty()
        });

        let stamps = windows.entry(kind).or_default();
        if stamps.len() < self.config.max_creations {
            stamps.push_back(now);
            Ok(())
        } else {
            tracing::warn!(%kind, recent = stamps.len(), "creation throttled");
            Err(AuthError::Throttled(kind))
        }
    }

    /// Creations of `kind` currently counted against the window.
    pub fn recent(&self, kind: ResourceKind) -> usize {
        self.windows.lock().get(&kind).map_or(0, VecDeque::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: i64 = 60_000;

    #[test]
    fn test_twentieth_allowed_twenty_first_rejected() {
        let throttle = CreationThrottle::default();
        let start = 1_700_000_000_000;

        for i in 0..20 {
            assert!(throttle.check_at(ResourceKind::Model, start + i).is_ok());
        }
        assert!(matches!(
            throttle.check_at(ResourceKind::Model, start + 20),
            Err(AuthError::Throttled(ResourceKind::Model))
        ));
        assert_eq!(throttle.recent(ResourceKind::Model), 20);
    }

    #[test]
    fn test_window_slides() {
        let throttle = CreationThrottle::default();
        let start = 1_700_000_000_000;

        for _ in 0..20 {
            throttle.check_at(ResourceKind::Key, start).unwrap();
        }
        assert!(throttle.check_at(ResourceKind::Key, start + 2 * MINUTE).is_err());
        assert!(throttle.check_at(ResourceKind::Key, start + 3 * MINUTE + 1).is_ok());
        assert_eq!(throttle.recent(ResourceKind::Key), 1);
    }

    #[test]
    fn test_kinds_are_independent() {
        let throttle = CreationThrottle::new(ThrottleConfig {
            window: Duration::from_secs(60),
            max_creations: 1,
        });

        assert!(throttle.check_at(ResourceKind::Key, 0).is_ok());
        assert!(throttle.check_at(ResourceKind::Key, 1).is_err());
        assert!(throttle.check_at(ResourceKind::Model, 1).is_ok());
    }

    proptest::proptest! {
        #[test]
        fn test_window_never_exceeds_cap(gaps in proptest::collection::vec(0i64..20_000, 1..200)) {
            let throttle = CreationThrottle::default();
            let mut now = 1_700_000_000_000;
            for gap in gaps {
                now += gap;
                let _ = throttle.check_at(ResourceKind::Model, now);
                proptest::prop_assert!(throttle.recent(ResourceKind::Model) <= 20);
            }
        }
    }

    #[test]
    fn test_resource_kind_names() {
        assert_eq!(ResourceKind::Key.to_string(), "KEY");
        assert_eq!(ResourceKind::Model.to_string(), "MODEL");
    }
}
