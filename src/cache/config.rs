//! Cache configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{PerfError, Result};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// What `set` does with a value that alone exceeds the whole budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OversizePolicy {
    /// Evict everything else and insert anyway; the budget is exceeded
    /// by that single entry until it is removed.
    #[default]
    Admit,
    /// Leave the cache untouched and report [`PerfError::EntryTooLarge`].
    Reject,
}

/// Configuration for a [`CacheManager`](super::CacheManager)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// When false the cache stores nothing and every read misses
    pub enabled: bool,

    /// Byte budget for all live entries
    pub max_size_bytes: u64,

    /// Maximum entry age since insertion
    pub ttl_seconds: u64,

    /// Handling of values larger than the whole budget
    pub oversize_policy: OversizePolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size_bytes: 100 * BYTES_PER_MB,
            ttl_seconds: 3600,
            oversize_policy: OversizePolicy::Admit,
        }
    }
}

impl CacheConfig {
    /// Budget given in megabytes
    pub fn new(max_size_mb: u64, ttl_seconds: u64) -> Self {
        Self {
            max_size_bytes: max_size_mb.saturating_mul(BYTES_PER_MB),
            ttl_seconds,
            ..Default::default()
        }
    }

    /// Budget given in raw bytes
    pub fn with_max_size_bytes(max_size_bytes: u64, ttl_seconds: u64) -> Self {
        Self {
            max_size_bytes,
            ttl_seconds,
            ..Default::default()
        }
    }

    pub fn with_oversize_policy(mut self, policy: OversizePolicy) -> Self {
        self.oversize_policy = policy;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Budget in whole-or-fractional megabytes
    pub fn max_size_mb(&self) -> f64 {
        self.max_size_bytes as f64 / BYTES_PER_MB as f64
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_size_bytes == 0 {
            return Err(PerfError::Config("cache max_size_bytes must be positive".to_string()));
        }
        Ok(())
    }
}
