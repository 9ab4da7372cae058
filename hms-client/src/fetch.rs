//! The fetch path shared by the coordinator and the invalidation engine.

use futures_util::FutureExt;
use hms_cache::{CacheStore, FetchTicket, InFlight, WriteOutcome};
use hms_core::QueryDescriptor;
use std::sync::Arc;

use crate::session::SessionGuard;

/// Starts single-flight fetches and writes their outcome back to the store.
#[derive(Clone)]
pub struct Fetcher {
    store: Arc<CacheStore>,
    guard: SessionGuard,
}

impl Fetcher {
    pub fn new(store: Arc<CacheStore>, guard: SessionGuard) -> Self {
        Self { store, guard }
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    pub fn guard(&self) -> &SessionGuard {
        &self.guard
    }

    /// Join the fetch in flight for the descriptor's key, or start one.
    ///
    /// A started fetch runs as its own task: dropping every handle on it
    /// never cancels the request, and its result is written back only if
    /// the entry is still on the generation it was started under.
    pub fn start(&self, descriptor: &QueryDescriptor) -> InFlight {
        let store = Arc::clone(&self.store);
        let guard = self.guard.clone();
        let owned = descriptor.clone();

        let ticket = self.store.join_or_begin_fetch(descriptor, move |generation| {
            async move {
                let outcome = guard.guarded_send(owned.request()).await.map(Arc::new);
                let written = match &outcome {
                    Ok(data) => store.put(
                        owned.key(),
                        generation,
                        Arc::clone(data),
                        owned.provided_tags().clone(),
                    ),
                    Err(failure) => store.fail(owned.key(), generation, failure.clone()),
                };
                if written == WriteOutcome::Discarded {
                    tracing::debug!(key = %owned.key(), %generation, "late result dropped");
                }
                outcome
            }
            .boxed()
            .shared()
        });

        match ticket {
            FetchTicket::Started(_, in_flight) => {
                tokio::spawn(in_flight.clone());
                in_flight
            }
            FetchTicket::Joined(in_flight) => in_flight,
        }
    }
}
