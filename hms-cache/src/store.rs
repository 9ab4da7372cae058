//! The cache store: keyed table of query results.
//!
//! Owns every entry's lifetime. Callers observe entries through
//! [`QuerySnapshot`]s and mutate them only through the methods below, each of
//! which runs under one short lock that is never held across an await.
//!
//! # Invariants
//!
//! - A `Pending` entry always holds its in-flight future, and at most one
//!   fetch per key is registered at a time (`begin_fetch` refuses otherwise).
//! - A completing fetch applies its result only when its generation is still
//!   the entry's generation. Invalidation moves the entry to a fresh
//!   generation, so a result racing a mutation is dropped silently.
//! - The tag index always mirrors the tags of live entries.

use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, Shared};
use hms_core::{EntityTag, HttpFailure, QueryDescriptor, QueryKey, TagSet};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;

use crate::config::CacheConfig;
use crate::snapshot::{FetchOutcome, Generation, QuerySnapshot, QueryStatus};
use crate::stats::CacheStats;

/// Shared handle on the fetch currently in flight for a key.
pub type InFlight = Shared<BoxFuture<'static, FetchOutcome>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BeginFetchError {
    #[error("a fetch is already in flight for this key")]
    AlreadyPending,
}

/// Whether a completing fetch was applied to its entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied,
    /// The entry moved on (invalidated, cleared or evicted); result dropped.
    Discarded,
}

/// Result of [`CacheStore::join_or_begin_fetch`].
#[derive(Clone)]
pub enum FetchTicket {
    /// A new fetch was registered under this generation.
    Started(Generation, InFlight),
    /// A fetch was already in flight; share it.
    Joined(InFlight),
}

impl FetchTicket {
    pub fn in_flight(&self) -> &InFlight {
        match self {
            Self::Started(_, in_flight) | Self::Joined(in_flight) => in_flight,
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started(..))
    }
}

/// An entry marked stale by [`CacheStore::invalidate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidatedEntry {
    pub key: QueryKey,
    pub subscribers: usize,
}

struct CacheEntry {
    descriptor: QueryDescriptor,
    status: QueryStatus,
    data: Option<Arc<Value>>,
    error: Option<HttpFailure>,
    tags: TagSet,
    subscribers: usize,
    in_flight: Option<InFlight>,
    generation: Generation,
    fetched_at: Option<DateTime<Utc>>,
    released_at: Option<DateTime<Utc>>,
    sender: watch::Sender<QuerySnapshot>,
}

impl CacheEntry {
    fn new(descriptor: &QueryDescriptor) -> Self {
        let (sender, _) = watch::channel(QuerySnapshot::uninitialized(descriptor.key().clone()));
        Self {
            descriptor: descriptor.clone(),
            status: QueryStatus::Uninitialized,
            data: None,
            error: None,
            tags: TagSet::new(),
            subscribers: 0,
            in_flight: None,
            generation: Generation::zero(),
            fetched_at: None,
            released_at: None,
            sender,
        }
    }

    fn snapshot(&self) -> QuerySnapshot {
        QuerySnapshot {
            key: self.descriptor.key().clone(),
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            fetched_at: self.fetched_at,
            generation: self.generation,
        }
    }

    fn publish(&self) {
        self.sender.send_replace(self.snapshot());
    }

    fn is_idle(&self) -> bool {
        self.subscribers == 0 && self.status != QueryStatus::Pending
    }
}

#[derive(Default)]
struct StoreInner {
    entries: HashMap<QueryKey, CacheEntry>,
    tag_index: HashMap<EntityTag, HashSet<QueryKey>>,
    last_generation: Generation,
    stats: CacheStats,
}

impl StoreInner {
    fn next_generation(&mut self) -> Generation {
        self.last_generation = self.last_generation.next();
        self.last_generation
    }

    fn reindex(&mut self, key: &QueryKey, old: &TagSet, new: &TagSet) {
        for tag in old.difference(new) {
            if let Some(keys) = self.tag_index.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tag_index.remove(tag);
                }
            }
        }
        for tag in new.difference(old) {
            self.tag_index
                .entry(tag.clone())
                .or_default()
                .insert(key.clone());
        }
    }

    fn replace_tags(&mut self, key: &QueryKey, tags: TagSet) {
        let old = match self.entries.get_mut(key) {
            Some(entry) => std::mem::replace(&mut entry.tags, tags.clone()),
            None => return,
        };
        self.reindex(key, &old, &tags);
    }

    fn evict(&mut self, key: &QueryKey) {
        if let Some(entry) = self.entries.remove(key) {
            self.reindex(key, &entry.tags, &TagSet::new());
            self.stats.evictions += 1;
            tracing::debug!(key = %key, "evicted cache entry");
        }
    }

    fn sweep(&mut self, now: DateTime<Utc>, config: &CacheConfig) -> usize {
        let expired: Vec<QueryKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_idle())
            .filter(|(_, entry)| {
                entry
                    .released_at
                    .map(|at| idle_for(now, at) >= config.keep_unused_for)
                    .unwrap_or(false)
            })
            .map(|(key, _)| key.clone())
            .collect();
        let mut evicted = expired.len();
        for key in &expired {
            self.evict(key);
        }

        if self.entries.len() > config.max_entries {
            let mut idle: Vec<(DateTime<Utc>, QueryKey)> = self
                .entries
                .iter()
                .filter(|(_, entry)| entry.is_idle())
                .map(|(key, entry)| (entry.released_at.unwrap_or(now), key.clone()))
                .collect();
            idle.sort();
            let excess = self.entries.len() - config.max_entries;
            for (_, key) in idle.into_iter().take(excess) {
                self.evict(&key);
                evicted += 1;
            }
        }
        evicted
    }
}

fn idle_for(now: DateTime<Utc>, released_at: DateTime<Utc>) -> Duration {
    now.signed_duration_since(released_at)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

/// Keyed table of cached query results with tag index and subscriber counts.
pub struct CacheStore {
    inner: Mutex<StoreInner>,
    config: CacheConfig,
}

impl CacheStore {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the entry for `key`, if any. No side effect.
    pub fn get(&self, key: &QueryKey) -> Option<QuerySnapshot> {
        self.lock().entries.get(key).map(CacheEntry::snapshot)
    }

    /// Descriptor the entry was created from; used to refetch it.
    pub fn descriptor(&self, key: &QueryKey) -> Option<QueryDescriptor> {
        self.lock()
            .entries
            .get(key)
            .map(|entry| entry.descriptor.clone())
    }

    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        self.lock()
            .entries
            .get(key)
            .map(|entry| entry.subscribers)
            .unwrap_or(0)
    }

    /// Register a subscriber, creating an uninitialized entry if needed.
    pub fn subscribe(&self, descriptor: &QueryDescriptor) -> watch::Receiver<QuerySnapshot> {
        let mut inner = self.lock();
        let key = descriptor.key();
        let created = !inner.entries.contains_key(key);
        let receiver = {
            let entry = inner
                .entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::new(descriptor));
            entry.subscribers += 1;
            entry.released_at = None;
            let hit = entry.status == QueryStatus::Resolved;
            let receiver = entry.sender.subscribe();
            if hit {
                inner.stats.hits += 1;
            } else {
                inner.stats.misses += 1;
            }
            receiver
        };
        if created && inner.entries.len() > self.config.max_entries {
            inner.sweep(Utc::now(), &self.config);
        }
        receiver
    }

    /// Drop one subscriber. The entry stays for reuse until a sweep.
    pub fn unsubscribe(&self, key: &QueryKey) {
        let mut inner = self.lock();
        if let Some(entry) = inner.entries.get_mut(key) {
            entry.subscribers = entry.subscribers.saturating_sub(1);
            if entry.subscribers == 0 {
                entry.released_at = Some(Utc::now());
            }
        }
    }

    /// Move the entry to `Pending` under a new generation.
    ///
    /// `make` builds the fetch future for the assigned generation; it runs
    /// under the store lock and must not touch the store itself. Refused when
    /// a fetch is already in flight for the key.
    pub fn begin_fetch<F>(
        &self,
        descriptor: &QueryDescriptor,
        make: F,
    ) -> Result<(Generation, InFlight), BeginFetchError>
    where
        F: FnOnce(Generation) -> InFlight,
    {
        let mut inner = self.lock();
        if inner.entries.get(descriptor.key()).and_then(pending_flight).is_some() {
            return Err(BeginFetchError::AlreadyPending);
        }
        Ok(start_fetch(&mut inner, descriptor, make))
    }

    /// Join the fetch in flight for the key, or begin one if there is none.
    /// The check and the start happen under one lock.
    pub fn join_or_begin_fetch<F>(&self, descriptor: &QueryDescriptor, make: F) -> FetchTicket
    where
        F: FnOnce(Generation) -> InFlight,
    {
        let mut inner = self.lock();
        if let Some(in_flight) = inner.entries.get(descriptor.key()).and_then(pending_flight) {
            return FetchTicket::Joined(in_flight);
        }
        let (generation, in_flight) = start_fetch(&mut inner, descriptor, make);
        FetchTicket::Started(generation, in_flight)
    }

    /// The shared fetch in flight for `key`, if pending.
    pub fn in_flight(&self, key: &QueryKey) -> Option<InFlight> {
        self.lock()
            .entries
            .get(key)
            .and_then(|entry| entry.in_flight.clone())
    }

    /// Resolve the entry with fresh data if `generation` is still current.
    pub fn put(
        &self,
        key: &QueryKey,
        generation: Generation,
        data: Arc<Value>,
        tags: TagSet,
    ) -> WriteOutcome {
        let mut inner = self.lock();
        let current = match inner.entries.get_mut(key) {
            Some(entry) if entry.status == QueryStatus::Pending && entry.generation == generation => {
                entry.status = QueryStatus::Resolved;
                entry.data = Some(data);
                entry.error = None;
                entry.in_flight = None;
                entry.fetched_at = Some(Utc::now());
                true
            }
            _ => false,
        };
        if !current {
            return discard(&mut inner, key, generation);
        }
        inner.replace_tags(key, tags);
        if let Some(entry) = inner.entries.get(key) {
            entry.publish();
        }
        tracing::debug!(key = %key, %generation, "fetch applied");
        WriteOutcome::Applied
    }

    /// Fail the entry if `generation` is still current. Previous data is kept.
    pub fn fail(&self, key: &QueryKey, generation: Generation, error: HttpFailure) -> WriteOutcome {
        let mut inner = self.lock();
        match inner.entries.get_mut(key) {
            Some(entry) if entry.status == QueryStatus::Pending && entry.generation == generation => {
                tracing::debug!(key = %key, %generation, error = %error, "fetch failed");
                entry.status = QueryStatus::Failed;
                entry.error = Some(error);
                entry.in_flight = None;
                entry.publish();
                WriteOutcome::Applied
            }
            _ => discard(&mut inner, key, generation),
        }
    }

    /// Mark every entry carrying one of `tags` as stale.
    ///
    /// Returns the affected keys with their subscriber counts; refetching is
    /// left to the caller.
    pub fn invalidate(&self, tags: &TagSet) -> Vec<InvalidatedEntry> {
        let mut inner = self.lock();
        let mut keys: Vec<QueryKey> = tags
            .iter()
            .filter_map(|tag| inner.tag_index.get(tag))
            .flatten()
            .cloned()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        keys.sort();

        let mut invalidated = Vec::with_capacity(keys.len());
        for key in keys {
            let generation = inner.next_generation();
            if let Some(entry) = inner.entries.get_mut(&key) {
                entry.status = QueryStatus::Stale;
                entry.generation = generation;
                entry.in_flight = None;
                entry.publish();
                invalidated.push(InvalidatedEntry {
                    key,
                    subscribers: entry.subscribers,
                });
            }
        }
        tracing::debug!(tags = ?tags, count = invalidated.len(), "invalidated cache entries");
        invalidated
    }

    /// Lazy eviction pass. Returns the number of evicted entries.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        self.lock().sweep(now, &self.config)
    }

    /// Drop all cached data. Entries with live subscribers are reset to
    /// uninitialized so their subscriptions stay valid.
    pub fn clear(&self) {
        let mut inner = self.lock();
        let keys: Vec<QueryKey> = inner.entries.keys().cloned().collect();
        for key in keys {
            let subscribed = inner
                .entries
                .get(&key)
                .map(|entry| entry.subscribers > 0)
                .unwrap_or(false);
            if !subscribed {
                inner.entries.remove(&key);
                continue;
            }
            let generation = inner.next_generation();
            if let Some(entry) = inner.entries.get_mut(&key) {
                entry.status = QueryStatus::Uninitialized;
                entry.data = None;
                entry.error = None;
                entry.in_flight = None;
                entry.fetched_at = None;
                entry.generation = generation;
                entry.tags.clear();
                entry.publish();
            }
        }
        inner.tag_index.clear();
        tracing::debug!("cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            entry_count: inner.entries.len() as u64,
            ..inner.stats.clone()
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys currently indexed under `tag`, sorted.
    pub fn keys_for_tag(&self, tag: &EntityTag) -> Vec<QueryKey> {
        let inner = self.lock();
        let mut keys: Vec<QueryKey> = inner
            .tag_index
            .get(tag)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

fn pending_flight(entry: &CacheEntry) -> Option<InFlight> {
    if entry.status == QueryStatus::Pending {
        entry.in_flight.clone()
    } else {
        None
    }
}

fn start_fetch<F>(inner: &mut StoreInner, descriptor: &QueryDescriptor, make: F) -> (Generation, InFlight)
where
    F: FnOnce(Generation) -> InFlight,
{
    let key = descriptor.key();
    let generation = inner.next_generation();
    let in_flight = make(generation);
    {
        let entry = inner.entries.entry(key.clone()).or_insert_with(|| {
            let mut entry = CacheEntry::new(descriptor);
            entry.released_at = Some(Utc::now());
            entry
        });
        entry.status = QueryStatus::Pending;
        entry.generation = generation;
        entry.error = None;
        entry.in_flight = Some(in_flight.clone());
        entry.publish();
    }
    inner.replace_tags(key, descriptor.provided_tags().clone());
    tracing::debug!(key = %key, %generation, "fetch started");
    (generation, in_flight)
}

fn discard(inner: &mut StoreInner, key: &QueryKey, generation: Generation) -> WriteOutcome {
    inner.stats.discarded_results += 1;
    tracing::debug!(key = %key, %generation, "discarded result of superseded fetch");
    WriteOutcome::Discarded
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use hms_core::ApiRequest;
    use serde_json::json;

    fn descriptor(page: u32) -> QueryDescriptor {
        QueryDescriptor::new(
            "patients",
            &json!({ "page": page }),
            ApiRequest::get("/patients").param("page", page),
        )
        .provides([EntityTag::patient()])
    }

    fn ready(value: Value) -> impl FnOnce(Generation) -> InFlight {
        move |_| futures_util::future::ready(Ok(Arc::new(value))).boxed().shared()
    }

    #[test]
    fn test_fetch_lifecycle() {
        let store = CacheStore::with_defaults();
        let d = descriptor(1);
        let _rx = store.subscribe(&d);
        assert_eq!(store.get(d.key()).unwrap().status, QueryStatus::Uninitialized);

        let (generation, _) = store.begin_fetch(&d, ready(json!(null))).unwrap();
        let snapshot = store.get(d.key()).unwrap();
        assert_eq!(snapshot.status, QueryStatus::Pending);
        assert!(store.in_flight(d.key()).is_some());

        let outcome = store.put(d.key(), generation, Arc::new(json!([1])), d.provided_tags().clone());
        assert_eq!(outcome, WriteOutcome::Applied);
        let snapshot = store.get(d.key()).unwrap();
        assert_eq!(snapshot.status, QueryStatus::Resolved);
        assert_eq!(*snapshot.data.unwrap(), json!([1]));
        assert!(store.in_flight(d.key()).is_none());
    }

    #[test]
    fn test_begin_fetch_is_single_flight() {
        let store = CacheStore::with_defaults();
        let d = descriptor(1);
        store.begin_fetch(&d, ready(json!(1))).unwrap();
        let second = store.begin_fetch(&d, ready(json!(2)));
        assert_eq!(second.err(), Some(BeginFetchError::AlreadyPending));
    }

    #[test]
    fn test_invalidation_discards_in_flight_result() {
        let store = CacheStore::with_defaults();
        let d = descriptor(1);
        let (generation, _) = store.begin_fetch(&d, ready(json!(1))).unwrap();

        let invalidated = store.invalidate(&hms_core::tags(["Patient"]));
        assert_eq!(invalidated.len(), 1);

        let outcome = store.put(d.key(), generation, Arc::new(json!(1)), TagSet::new());
        assert_eq!(outcome, WriteOutcome::Discarded);
        let snapshot = store.get(d.key()).unwrap();
        assert_eq!(snapshot.status, QueryStatus::Stale);
        assert!(snapshot.generation.is_newer_than(&generation));
        assert_eq!(store.stats().discarded_results, 1);
    }

    #[test]
    fn test_join_or_begin_shares_pending_fetch() {
        let store = CacheStore::with_defaults();
        let d = descriptor(1);
        let first = store.join_or_begin_fetch(&d, ready(json!(1)));
        let second = store.join_or_begin_fetch(&d, |_| panic!("must not start a second fetch"));
        assert!(first.is_started());
        assert!(!second.is_started());
    }

    #[test]
    fn test_fail_keeps_previous_data() {
        let store = CacheStore::with_defaults();
        let d = descriptor(1);
        let (g1, _) = store.begin_fetch(&d, ready(json!(1))).unwrap();
        store.put(d.key(), g1, Arc::new(json!("old")), TagSet::new());

        let (g2, _) = store.begin_fetch(&d, ready(json!(1))).unwrap();
        let outcome = store.fail(d.key(), g2, HttpFailure::network("reset"));
        assert_eq!(outcome, WriteOutcome::Applied);

        let snapshot = store.get(d.key()).unwrap();
        assert_eq!(snapshot.status, QueryStatus::Failed);
        assert_eq!(*snapshot.data.unwrap(), json!("old"));
        assert!(snapshot.error.unwrap().is_network());
    }

    #[test]
    fn test_put_replaces_tags_in_index() {
        let store = CacheStore::with_defaults();
        let d = descriptor(1);
        let (generation, _) = store.begin_fetch(&d, ready(json!(1))).unwrap();
        assert_eq!(store.keys_for_tag(&EntityTag::patient()), vec![d.key().clone()]);

        store.put(
            d.key(),
            generation,
            Arc::new(json!(1)),
            hms_core::tags([EntityTag::patient_id(7)]),
        );
        assert!(store.keys_for_tag(&EntityTag::patient()).is_empty());
        assert_eq!(store.keys_for_tag(&EntityTag::patient_id(7)).len(), 1);
    }

    #[test]
    fn test_invalidate_reports_subscribers() {
        let store = CacheStore::with_defaults();
        let watched = descriptor(1);
        let unwatched = descriptor(2);
        let _a = store.subscribe(&watched);
        let _b = store.subscribe(&watched);
        store.begin_fetch(&watched, ready(json!(1))).unwrap();
        store.begin_fetch(&unwatched, ready(json!(1))).unwrap();

        let mut invalidated = store.invalidate(&hms_core::tags(["Patient"]));
        invalidated.sort_by(|a, b| a.key.cmp(&b.key));
        assert_eq!(invalidated[0].subscribers, 2);
        assert_eq!(invalidated[1].subscribers, 0);
    }

    #[test]
    fn test_invalidate_ignores_other_tags() {
        let store = CacheStore::with_defaults();
        let d = descriptor(1);
        store.begin_fetch(&d, ready(json!(1))).unwrap();
        assert!(store.invalidate(&hms_core::tags(["Dashboard"])).is_empty());
        assert_eq!(store.get(d.key()).unwrap().status, QueryStatus::Pending);
    }

    #[test]
    fn test_unsubscribe_never_underflows() {
        let store = CacheStore::with_defaults();
        let d = descriptor(1);
        let _rx = store.subscribe(&d);
        store.unsubscribe(d.key());
        store.unsubscribe(d.key());
        assert_eq!(store.subscriber_count(d.key()), 0);
        assert!(store.get(d.key()).is_some());
    }

    #[test]
    fn test_sweep_is_lazy_and_respects_subscribers() {
        let store = CacheStore::new(CacheConfig::new().with_keep_unused_for(Duration::from_secs(60)));
        let kept = descriptor(1);
        let released = descriptor(2);
        let _rx = store.subscribe(&kept);
        let _rx2 = store.subscribe(&released);
        store.unsubscribe(released.key());

        assert_eq!(store.sweep(Utc::now()), 0);
        assert_eq!(store.len(), 2);

        let later = Utc::now() + chrono::Duration::seconds(61);
        assert_eq!(store.sweep(later), 1);
        assert!(store.get(released.key()).is_none());
        assert!(store.get(kept.key()).is_some());
    }

    #[test]
    fn test_capacity_pressure_evicts_oldest_idle_entries() {
        let store = CacheStore::new(CacheConfig::new().with_max_entries(2));
        for page in 1..=2 {
            let d = descriptor(page);
            let _rx = store.subscribe(&d);
            store.unsubscribe(d.key());
        }
        let newest = descriptor(3);
        let _rx = store.subscribe(&newest);

        assert_eq!(store.len(), 2);
        assert!(store.get(descriptor(1).key()).is_none());
        assert!(store.get(newest.key()).is_some());
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn test_sweep_never_evicts_pending_entries() {
        let store = CacheStore::new(CacheConfig::new().with_keep_unused_for(Duration::ZERO));
        let d = descriptor(1);
        store.begin_fetch(&d, ready(json!(1))).unwrap();
        assert_eq!(store.sweep(Utc::now() + chrono::Duration::seconds(1)), 0);
        assert!(store.get(d.key()).is_some());
    }

    #[test]
    fn test_clear_resets_subscribed_entries() {
        let store = CacheStore::with_defaults();
        let subscribed = descriptor(1);
        let idle = descriptor(2);
        let rx = store.subscribe(&subscribed);
        for d in [&subscribed, &idle] {
            let (g, _) = store.begin_fetch(d, ready(json!(1))).unwrap();
            store.put(d.key(), g, Arc::new(json!(1)), d.provided_tags().clone());
        }

        store.clear();
        assert_eq!(store.len(), 1);
        assert_eq!(rx.borrow().status, QueryStatus::Uninitialized);
        assert!(store.keys_for_tag(&EntityTag::patient()).is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_observe_transitions() {
        let store = CacheStore::with_defaults();
        let d = descriptor(1);
        let mut rx = store.subscribe(&d);
        let (generation, _) = store.begin_fetch(&d, ready(json!(1))).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().status, QueryStatus::Pending);

        store.put(d.key(), generation, Arc::new(json!(5)), TagSet::new());
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().status, QueryStatus::Resolved);
    }

    #[test]
    fn test_hits_and_misses() {
        let store = CacheStore::with_defaults();
        let d = descriptor(1);
        let _a = store.subscribe(&d);
        let (g, _) = store.begin_fetch(&d, ready(json!(1))).unwrap();
        store.put(d.key(), g, Arc::new(json!(1)), TagSet::new());
        let _b = store.subscribe(&d);

        let stats = store.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.entry_count, 1);
    }
}
