//! Configuration for the session manager.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::policy::EvictionPolicy;

/// Default capacity of the detached pool.
pub const DEFAULT_MAX_DETACHED_SESSIONS: usize = 100;

/// Default period between TTL sweeps.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(30);

/// Default maximum detached lifetime.
pub const DEFAULT_DETACHED_TTL: Duration = Duration::from_secs(600);

/// Upper bound for the cleanup interval and detached TTL (one year).
///
/// Keeps both well inside the range that can be added to an `Instant`.
pub const MAX_CONFIG_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Configuration captured once when a [`Manager`](crate::Manager) is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Maximum number of detached sessions retained for resume.
    pub max_detached_sessions: usize,

    /// Strategy used when the detached pool overflows.
    pub eviction_policy: EvictionPolicy,

    /// How often the background sweep runs.
    pub cleanup_interval: Duration,

    /// Maximum idle time of a detached session before a sweep removes it.
    pub detached_ttl: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_detached_sessions: DEFAULT_MAX_DETACHED_SESSIONS,
            eviction_policy: EvictionPolicy::default(),
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            detached_ttl: DEFAULT_DETACHED_TTL,
        }
    }
}

impl ManagerConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the capacity of the detached pool.
    pub fn with_max_detached_sessions(mut self, max: usize) -> Self {
        self.max_detached_sessions = max;
        self
    }

    /// Set the eviction policy.
    pub fn with_eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = policy;
        self
    }

    /// Set the sweep period.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Set the detached TTL.
    pub fn with_detached_ttl(mut self, ttl: Duration) -> Self {
        self.detached_ttl = ttl;
        self
    }

    /// Check that the configuration can drive a manager.
    pub fn validate(&self) -> Result<()> {
        if self.max_detached_sessions == 0 {
            return Err(Error::InvalidConfig(
                "max_detached_sessions must be at least 1".to_string(),
            ));
        }
        if self.cleanup_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "cleanup_interval must be greater than zero".to_string(),
            ));
        }
        if self.detached_ttl.is_zero() {
            return Err(Error::InvalidConfig(
                "detached_ttl must be greater than zero".to_string(),
            ));
        }
        if self.cleanup_interval > MAX_CONFIG_DURATION {
            return Err(Error::InvalidConfig(format!(
                "cleanup_interval must be at most {}s",
                MAX_CONFIG_DURATION.as_secs()
            )));
        }
        if self.detached_ttl > MAX_CONFIG_DURATION {
            return Err(Error::InvalidConfig(format!(
                "detached_ttl must be at most {}s",
                MAX_CONFIG_DURATION.as_secs()
            )));
        }
        Ok(())
    }

    /// Parse and validate a TOML settings document.
    ///
    /// ```toml
    /// max_detached_sessions = 100
    /// eviction_policy = "lru"
    /// cleanup_interval_secs = 30
    /// detached_ttl_secs = 600
    /// ```
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let settings: SessionSettings = toml::from_str(s)?;
        Self::try_from(settings)
    }
}

/// On-disk form of [`ManagerConfig`].
///
/// Every field is optional; missing fields take the defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionSettings {
    pub max_detached_sessions: usize,
    pub eviction_policy: EvictionPolicy,
    pub cleanup_interval_secs: u64,
    pub detached_ttl_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_detached_sessions: DEFAULT_MAX_DETACHED_SESSIONS,
            eviction_policy: EvictionPolicy::default(),
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL.as_secs(),
            detached_ttl_secs: DEFAULT_DETACHED_TTL.as_secs(),
        }
    }
}

impl TryFrom<SessionSettings> for ManagerConfig {
    type Error = Error;

    fn try_from(settings: SessionSettings) -> Result<Self> {
        let config = ManagerConfig {
            max_detached_sessions: settings.max_detached_sessions,
            eviction_policy: settings.eviction_policy,
            cleanup_interval: Duration::from_secs(settings.cleanup_interval_secs),
            detached_ttl: Duration::from_secs(settings.detached_ttl_secs),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ManagerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_detached_sessions, DEFAULT_MAX_DETACHED_SESSIONS);
        assert_eq!(config.eviction_policy, EvictionPolicy::Lru);
    }

    #[test]
    fn test_builder() {
        let config = ManagerConfig::new()
            .with_max_detached_sessions(2)
            .with_eviction_policy(EvictionPolicy::Oldest)
            .with_cleanup_interval(Duration::from_millis(50))
            .with_detached_ttl(Duration::from_secs(1));

        assert_eq!(config.max_detached_sessions, 2);
        assert_eq!(config.eviction_policy, EvictionPolicy::Oldest);
        assert_eq!(config.cleanup_interval, Duration::from_millis(50));
        assert_eq!(config.detached_ttl, Duration::from_secs(1));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = ManagerConfig::new()
            .with_max_detached_sessions(0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_zero_durations_rejected() {
        assert!(
            ManagerConfig::new()
                .with_cleanup_interval(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(
            ManagerConfig::new()
                .with_detached_ttl(Duration::ZERO)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_oversized_durations_rejected() {
        assert!(
            ManagerConfig::new()
                .with_cleanup_interval(MAX_CONFIG_DURATION)
                .with_detached_ttl(MAX_CONFIG_DURATION)
                .validate()
                .is_ok()
        );
        assert!(matches!(
            ManagerConfig::new()
                .with_cleanup_interval(Duration::MAX)
                .validate(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            ManagerConfig::new()
                .with_detached_ttl(MAX_CONFIG_DURATION + Duration::from_secs(1))
                .validate(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            ManagerConfig::from_toml_str("cleanup_interval_secs = 9223372036854775807"),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            ManagerConfig::from_toml_str("detached_ttl_secs = 9223372036854775807"),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_from_toml() {
        let config = ManagerConfig::from_toml_str(
            r#"
            max_detached_sessions = 8
            eviction_policy = "random"
            cleanup_interval_secs = 5
            detached_ttl_secs = 120
            "#,
        )
        .unwrap();

        assert_eq!(config.max_detached_sessions, 8);
        assert_eq!(config.eviction_policy, EvictionPolicy::Random);
        assert_eq!(config.cleanup_interval, Duration::from_secs(5));
        assert_eq!(config.detached_ttl, Duration::from_secs(120));
    }

    #[test]
    fn test_from_toml_partial_uses_defaults() {
        let config = ManagerConfig::from_toml_str(r#"eviction_policy = "oldest""#).unwrap();
        assert_eq!(config.eviction_policy, EvictionPolicy::Oldest);
        assert_eq!(config.max_detached_sessions, DEFAULT_MAX_DETACHED_SESSIONS);
        assert_eq!(config.detached_ttl, DEFAULT_DETACHED_TTL);
    }

    #[test]
    fn test_from_toml_rejects_bad_input() {
        assert!(matches!(
            ManagerConfig::from_toml_str(r#"eviction_policy = "fifo""#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ManagerConfig::from_toml_str("max_detached_sessions = 0"),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            ManagerConfig::from_toml_str("unknown_key = 1"),
            Err(Error::Config(_))
        ));
    }
}
