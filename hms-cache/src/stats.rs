//! Cache usage counters.

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Subscriptions served from a resolved entry.
    pub hits: u64,
    /// Subscriptions that found no usable data.
    pub misses: u64,
    /// Number of entries currently in the store.
    pub entry_count: u64,
    /// Entries removed by a sweep.
    pub evictions: u64,
    /// Fetch results dropped because the entry moved to a newer generation.
    pub discarded_results: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
