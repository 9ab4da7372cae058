//! Cache store configuration.

use serde::Deserialize;
use std::time::Duration;

/// Configuration for the cache store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Soft capacity. Above it, a sweep evicts the longest-unused entries
    /// that have no subscribers and no fetch in flight.
    pub max_entries: usize,
    /// How long an entry without subscribers is kept for instant reuse.
    #[serde(rename = "keep_unused_for_ms", with = "millis")]
    pub keep_unused_for: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 256,
            keep_unused_for: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the soft capacity.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    /// Set how long unused entries survive a sweep.
    pub fn with_keep_unused_for(mut self, duration: Duration) -> Self {
        self.keep_unused_for = duration;
        self
    }
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_config_builder() {
        let config = CacheConfig::new()
            .with_max_entries(32)
            .with_keep_unused_for(Duration::from_secs(5));

        assert_eq!(config.max_entries, 32);
        assert_eq!(config.keep_unused_for, Duration::from_secs(5));
    }

    #[test]
    fn test_cache_config_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.max_entries, 256);
        assert_eq!(config.keep_unused_for, Duration::from_secs(60));
    }
}
