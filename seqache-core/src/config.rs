//! Configuration types

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;
use crate::SeqacheResult;

/// Default namespace prefix for every group key.
pub const DEFAULT_KEY_PREFIX: &str = "seqache";

/// One day.
pub const DEFAULT_TTL_SECONDS: u64 = 86_400;

pub const DEFAULT_MAX_GROUP_SIZE: u64 = 1_000;

/// Largest ttl a store can be asked for; Redis EXPIRE takes a signed 64-bit
/// seconds count.
pub const MAX_TTL_SECONDS: u64 = i64::MAX as u64;

/// Cache-wide settings. The store itself is not configuration; it is
/// handed to the cache constructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeqacheConfig {
    /// Prefix of every group key (`prefix:namespace:name`).
    pub key_prefix: String,
    /// Emit informational hit/miss/purge events.
    pub logging: bool,
    /// Group expiry applied on every write, in seconds.
    pub ttl_seconds: u64,
    /// Maximum number of cached queries per dataset.
    pub max_group_size: u64,
}

impl Default for SeqacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            logging: false,
            ttl_seconds: DEFAULT_TTL_SECONDS,
            max_group_size: DEFAULT_MAX_GROUP_SIZE,
        }
    }
}

impl SeqacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.logging = enabled;
        self
    }

    /// Set the default ttl. Sub-second precision is dropped.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_seconds = ttl.as_secs();
        self
    }

    pub fn with_max_group_size(mut self, max: u64) -> Self {
        self.max_group_size = max;
        self
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - key_prefix is non-empty
    /// - 0 < ttl_seconds <= MAX_TTL_SECONDS
    /// - max_group_size > 0
    pub fn validate(&self) -> SeqacheResult<()> {
        if self.key_prefix.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "key_prefix".to_string(),
                value: self.key_prefix.clone(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }

        if self.ttl_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ttl_seconds".to_string(),
                value: self.ttl_seconds.to_string(),
                reason: "must be at least one second".to_string(),
            }
            .into());
        }

        if self.ttl_seconds > MAX_TTL_SECONDS {
            return Err(ConfigError::InvalidValue {
                field: "ttl_seconds".to_string(),
                value: self.ttl_seconds.to_string(),
                reason: format!("must be at most {} seconds", MAX_TTL_SECONDS),
            }
            .into());
        }

        if self.max_group_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_group_size".to_string(),
                value: self.max_group_size.to_string(),
                reason: "must be at least one".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Resolve per-dataset overrides against the defaults.
    pub fn resolve(&self, overrides: &CacheOverrides) -> (Duration, u64) {
        let ttl = overrides
            .ttl_seconds
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.ttl());
        let max = overrides.max_group_size.unwrap_or(self.max_group_size);
        (ttl, max)
    }
}

/// Per-dataset overrides of the cache defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheOverrides {
    pub ttl_seconds: Option<u64>,
    pub max_group_size: Option<u64>,
}

impl CacheOverrides {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_seconds = Some(ttl.as_secs());
        self
    }

    pub fn with_max_group_size(mut self, max: u64) -> Self {
        self.max_group_size = Some(max);
        self
    }
}
