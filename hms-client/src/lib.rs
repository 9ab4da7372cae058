//! HMS Client - Authenticated Data Layer
//!
//! Fetches, caches and invalidates backend data for the hospital records
//! client:
//!
//! - [`SessionGuard`] absorbs expired sessions with one shared refresh
//! - [`QueryCoordinator`] serves reads from the cache store, one fetch per key
//! - [`InvalidationEngine`] turns mutation tags into stale entries and refetches
//! - [`api`] describes every backend endpoint as a descriptor or mutation
//!
//! [`HmsClient`] composes all of it over a [`Transport`](hms_core::Transport).

pub mod api;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fetch;
pub mod invalidation;
pub mod persistence;
pub mod session;
pub mod telemetry;
pub mod transport;

pub use client::HmsClient;
pub use config::{ClientConfig, ConfigError, LoggingConfig};
pub use coordinator::{QueryCoordinator, QueryHandle};
pub use error::{ClientError, ClientResult};
pub use fetch::Fetcher;
pub use invalidation::{InvalidationEngine, InvalidationReport};
pub use persistence::{PersistedIdentity, PersistenceError};
pub use session::{SessionGuard, SessionState, SessionStatus};
pub use transport::HttpTransport;

pub use hms_cache::{CacheConfig, CacheStats, CacheStore, QuerySnapshot, QueryStatus};
pub use hms_core::{
    ApiRequest, AuthUser, Credentials, EntityTag, Envelope, GetPatientsQuery, HmsResult,
    HttpFailure, Method, Mutation, QueryDescriptor, QueryKey, SignupPayload, TagSet, Transport,
};
