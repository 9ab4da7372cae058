//! HMS Cache - Query Result Store
//!
//! In-memory, page-session lifetime cache for query results:
//!
//! - entries keyed by [`hms_core::QueryKey`], one fetch in flight per key
//! - a tag -> keys index driving invalidation
//! - subscriber counts with lazy eviction of unused entries
//! - per-key fetch generations so a result racing an invalidation can never
//!   overwrite the stale marker
//!
//! Traditional caches hide their staleness. Here every transition is
//! published as a [`QuerySnapshot`] carrying status, generation and fetch
//! time, so subscribers always know what they are looking at.

pub mod config;
pub mod snapshot;
pub mod stats;
pub mod store;

pub use config::CacheConfig;
pub use snapshot::{FetchOutcome, Generation, QuerySnapshot, QueryStatus};
pub use stats::CacheStats;
pub use store::{
    BeginFetchError, CacheStore, FetchTicket, InFlight, InvalidatedEntry, WriteOutcome,
};
