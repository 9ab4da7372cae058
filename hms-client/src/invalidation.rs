//! Invalidation Engine: turns a successful mutation's tags into stale
//! entries and refetches the ones somebody is still watching.

use hms_cache::CacheStore;
use hms_core::{QueryKey, TagSet};
use std::sync::Arc;

use crate::fetch::Fetcher;

/// What one invalidation pass touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationReport {
    /// Every key marked stale, sorted.
    pub invalidated: Vec<QueryKey>,
    /// The subset with live subscribers, refetched immediately.
    pub refetched: Vec<QueryKey>,
}

impl InvalidationReport {
    pub fn is_empty(&self) -> bool {
        self.invalidated.is_empty()
    }
}

#[derive(Clone)]
pub struct InvalidationEngine {
    store: Arc<CacheStore>,
    fetcher: Fetcher,
}

impl InvalidationEngine {
    pub fn new(fetcher: Fetcher) -> Self {
        Self {
            store: Arc::clone(fetcher.store()),
            fetcher,
        }
    }

    /// Mark every entry tagged with any of `tags` stale and refetch those
    /// with subscribers. Unsubscribed entries stay stale until next used.
    ///
    /// Tags are matched exactly: `Patient` does not reach `Patient:42`.
    /// Must be called inside a Tokio runtime.
    pub fn apply(&self, tags: &TagSet) -> InvalidationReport {
        if tags.is_empty() {
            return InvalidationReport::default();
        }
        let mut report = InvalidationReport::default();
        for entry in self.store.invalidate(tags) {
            if entry.subscribers > 0 {
                if let Some(descriptor) = self.store.descriptor(&entry.key) {
                    self.fetcher.start(&descriptor);
                    report.refetched.push(entry.key.clone());
                }
            }
            report.invalidated.push(entry.key);
        }
        tracing::debug!(
            tags = ?tags,
            invalidated = report.invalidated.len(),
            refetched = report.refetched.len(),
            "invalidation applied"
        );
        report
    }
}
