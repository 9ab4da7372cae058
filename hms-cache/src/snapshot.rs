//! Point-in-time views of a cache entry.
//!
//! Subscribers never see the entry itself, only snapshots published on every
//! transition, so the store remains the sole owner of entry state.

use chrono::{DateTime, Utc};
use hms_core::{HttpFailure, QueryKey};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Lifecycle state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryStatus {
    /// Known key, nothing fetched yet.
    Uninitialized,
    /// Exactly one fetch is in flight.
    Pending,
    Resolved,
    Failed,
    /// Outdated by a mutation; refetched on demand.
    Stale,
}

impl QueryStatus {
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Resolved | Self::Failed)
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Pending => "pending",
            Self::Resolved => "resolved",
            Self::Failed => "failed",
            Self::Stale => "stale",
        };
        f.write_str(name)
    }
}

/// Per-key fetch generation.
///
/// Drawn from one store-wide counter, so it only ever grows for a key, even
/// across eviction and re-creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    pub fn zero() -> Self {
        Self(0)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn is_newer_than(&self, other: &Generation) -> bool {
        self.0 > other.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of one fetch, shared among all callers waiting on it.
pub type FetchOutcome = Result<Arc<Value>, HttpFailure>;

/// Snapshot of an entry as published to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySnapshot {
    pub key: QueryKey,
    pub status: QueryStatus,
    /// Last successful payload; kept while stale or refetching.
    pub data: Option<Arc<Value>>,
    pub error: Option<HttpFailure>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub generation: Generation,
}

impl QuerySnapshot {
    pub fn uninitialized(key: QueryKey) -> Self {
        Self {
            key,
            status: QueryStatus::Uninitialized,
            data: None,
            error: None,
            fetched_at: None,
            generation: Generation::zero(),
        }
    }

    /// Loading with nothing to show yet.
    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Pending && self.data.is_none()
    }

    pub fn is_fetching(&self) -> bool {
        self.status == QueryStatus::Pending
    }

    pub fn is_settled(&self) -> bool {
        self.status.is_settled()
    }

    /// Outcome if the entry has settled.
    pub fn outcome(&self) -> Option<FetchOutcome> {
        match self.status {
            QueryStatus::Resolved => self.data.clone().map(Ok),
            QueryStatus::Failed => self.error.clone().map(Err),
            _ => None,
        }
    }

    /// Decode the payload into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> Option<Result<T, serde_json::Error>> {
        self.data
            .as_deref()
            .map(|value| T::deserialize(value))
    }

    /// Time since the payload was fetched; zero if never fetched.
    pub fn staleness(&self) -> Duration {
        self.fetched_at
            .map(|at| {
                Utc::now()
                    .signed_duration_since(at)
                    .to_std()
                    .unwrap_or(Duration::ZERO)
            })
            .unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key() -> QueryKey {
        QueryKey::new("hospital", &())
    }

    #[test]
    fn test_uninitialized_snapshot() {
        let snapshot = QuerySnapshot::uninitialized(key());
        assert_eq!(snapshot.status, QueryStatus::Uninitialized);
        assert!(!snapshot.is_loading());
        assert!(snapshot.outcome().is_none());
        assert_eq!(snapshot.staleness(), Duration::ZERO);
    }

    #[test]
    fn test_resolved_outcome_and_decode() {
        let snapshot = QuerySnapshot {
            status: QueryStatus::Resolved,
            data: Some(Arc::new(json!({ "data": 7 }))),
            fetched_at: Some(Utc::now() - chrono::Duration::seconds(5)),
            ..QuerySnapshot::uninitialized(key())
        };
        let outcome = snapshot.outcome().unwrap().unwrap();
        assert_eq!(outcome["data"], 7);

        let decoded: serde_json::Map<String, Value> = snapshot.decode().unwrap().unwrap();
        assert_eq!(decoded["data"], json!(7));
        assert!(snapshot.staleness() >= Duration::from_secs(4));
    }

    #[test]
    fn test_pending_with_previous_data_is_fetching_not_loading() {
        let snapshot = QuerySnapshot {
            status: QueryStatus::Pending,
            data: Some(Arc::new(json!([]))),
            ..QuerySnapshot::uninitialized(key())
        };
        assert!(snapshot.is_fetching());
        assert!(!snapshot.is_loading());
        assert!(!snapshot.is_settled());
    }

    #[test]
    fn test_generation_ordering() {
        let g = Generation::zero().next();
        assert!(g.next().is_newer_than(&g));
        assert_eq!(g.value(), 1);
    }
}
