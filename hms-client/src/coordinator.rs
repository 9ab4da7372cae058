//! Query Coordinator: the single entry point for cached reads and for
//! mutations.
//!
//! Reads go through the cache store: the first subscriber of a key starts a
//! fetch, concurrent subscribers share it, and later subscribers are served
//! from cache. Mutations bypass the cache and, on success, hand their
//! declared tags to the [`InvalidationEngine`] before returning.

use hms_cache::{CacheStore, QuerySnapshot, QueryStatus};
use hms_core::{HmsResult, HttpFailure, Mutation, QueryDescriptor, QueryKey};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::ClientError;
use crate::fetch::Fetcher;
use crate::invalidation::{InvalidationEngine, InvalidationReport};
use crate::session::SessionGuard;

#[derive(Clone)]
pub struct QueryCoordinator {
    store: Arc<CacheStore>,
    fetcher: Fetcher,
    engine: InvalidationEngine,
}

impl QueryCoordinator {
    pub fn new(store: Arc<CacheStore>, guard: SessionGuard) -> Self {
        let fetcher = Fetcher::new(Arc::clone(&store), guard);
        let engine = InvalidationEngine::new(fetcher.clone());
        Self {
            store,
            fetcher,
            engine,
        }
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    pub fn guard(&self) -> &SessionGuard {
        self.fetcher.guard()
    }

    pub fn engine(&self) -> &InvalidationEngine {
        &self.engine
    }

    /// Subscribe to a cached read.
    ///
    /// Starts a fetch when the entry has never loaded, is stale, or failed
    /// last time; joins a pending one; serves a resolved one from cache.
    /// Must be called inside a Tokio runtime.
    pub fn query(&self, descriptor: QueryDescriptor) -> QueryHandle {
        let receiver = self.store.subscribe(&descriptor);
        let status = receiver.borrow().status;
        match status {
            QueryStatus::Uninitialized | QueryStatus::Stale | QueryStatus::Failed => {
                self.fetcher.start(&descriptor);
            }
            QueryStatus::Pending | QueryStatus::Resolved => {
                tracing::trace!(key = %descriptor.key(), %status, "served from cache");
            }
        }
        QueryHandle {
            descriptor,
            receiver,
            fetcher: self.fetcher.clone(),
        }
    }

    /// One-shot read: subscribe, wait for the outcome, unsubscribe.
    pub async fn fetch(&self, descriptor: QueryDescriptor) -> HmsResult<Arc<Value>> {
        self.query(descriptor).settled().await
    }

    /// One-shot read decoded into `T`.
    pub async fn fetch_as<T: DeserializeOwned>(
        &self,
        descriptor: QueryDescriptor,
    ) -> Result<T, ClientError> {
        self.query(descriptor).typed().await
    }

    /// Run a mutation. On success its tags are invalidated before this
    /// returns; on failure nothing is invalidated.
    pub async fn mutate(&self, mutation: &Mutation) -> HmsResult<Value> {
        let (body, report) = self.mutate_with_report(mutation).await?;
        tracing::debug!(
            mutation = mutation.name(),
            invalidated = report.invalidated.len(),
            "mutation succeeded"
        );
        Ok(body)
    }

    /// [`Self::mutate`], also returning what was invalidated.
    pub async fn mutate_with_report(
        &self,
        mutation: &Mutation,
    ) -> HmsResult<(Value, InvalidationReport)> {
        match self.fetcher.guard().guarded_send(mutation.request()).await {
            Ok(body) => {
                let report = self.engine.apply(mutation.invalidated_tags());
                Ok((body, report))
            }
            Err(failure) => {
                tracing::debug!(mutation = mutation.name(), error = %failure, "mutation failed");
                Err(failure)
            }
        }
    }
}

impl fmt::Debug for QueryCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCoordinator")
            .field("store", &self.store)
            .finish()
    }
}

/// A live subscription to one cache entry.
///
/// Dropping the handle unsubscribes; a fetch in flight keeps running and
/// still populates the cache.
pub struct QueryHandle {
    descriptor: QueryDescriptor,
    receiver: watch::Receiver<QuerySnapshot>,
    fetcher: Fetcher,
}

impl QueryHandle {
    pub fn key(&self) -> &QueryKey {
        self.descriptor.key()
    }

    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }

    /// Latest published snapshot.
    pub fn current(&self) -> QuerySnapshot {
        self.receiver.borrow().clone()
    }

    /// Wait for the next transition. `None` once the entry is gone.
    pub async fn changed(&mut self) -> Option<QuerySnapshot> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// Wait until the entry resolves or fails and return the outcome.
    ///
    /// A stale or reset entry is refetched first, so this always makes
    /// progress.
    pub async fn settled(&mut self) -> HmsResult<Arc<Value>> {
        loop {
            let snapshot = self.receiver.borrow_and_update().clone();
            if let Some(outcome) = snapshot.outcome() {
                return outcome;
            }
            if matches!(snapshot.status, QueryStatus::Uninitialized | QueryStatus::Stale) {
                self.fetcher.start(&self.descriptor);
            }
            if self.receiver.changed().await.is_err() {
                return Err(HttpFailure::network(format!(
                    "cache entry for {} was dropped",
                    self.descriptor.key()
                )));
            }
        }
    }

    /// Settle and decode into `T`.
    pub async fn typed<T: DeserializeOwned>(&mut self) -> Result<T, ClientError> {
        let value = self.settled().await?;
        Ok(T::deserialize(value.as_ref())?)
    }

    /// Force a refetch unless one is already in flight.
    pub fn refetch(&self) {
        self.fetcher.start(&self.descriptor);
    }
}

impl Drop for QueryHandle {
    fn drop(&mut self) {
        self.fetcher.store().unsubscribe(self.descriptor.key());
    }
}

impl fmt::Debug for QueryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryHandle")
            .field("key", self.descriptor.key())
            .field("status", &self.receiver.borrow().status)
            .finish()
    }
}
