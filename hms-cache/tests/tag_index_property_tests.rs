//! Property-Based Tests for the Cache Store Tag Index
//!
//! **Property: Index Mirrors Entries**
//!
//! After any sequence of fetch/resolve/invalidate operations, invalidating a
//! tag reaches exactly the entries whose current tags contain it, and no
//! entry without that tag changes status.

use futures_util::FutureExt;
use hms_cache::{CacheStore, InFlight, QueryStatus};
use hms_core::{ApiRequest, EntityTag, QueryDescriptor, TagSet};
use proptest::prelude::*;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

const TAGS: [&str; 5] = ["Patient", "Patient:1", "Patient:2", "Dashboard", "Hospital"];

#[derive(Debug, Clone)]
enum Op {
    Resolve { slot: u8, tags: Vec<usize> },
    Invalidate { tag: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..6, prop::collection::vec(0usize..TAGS.len(), 0..3))
            .prop_map(|(slot, tags)| Op::Resolve { slot, tags }),
        (0usize..TAGS.len()).prop_map(|tag| Op::Invalidate { tag }),
    ]
}

fn descriptor(slot: u8) -> QueryDescriptor {
    QueryDescriptor::new("slot", &json!({ "slot": slot }), ApiRequest::get("/slot"))
}

fn pending(_: hms_cache::Generation) -> InFlight {
    futures_util::future::pending().boxed().shared()
}

fn tag_set(indices: &[usize]) -> TagSet {
    indices.iter().map(|i| EntityTag::new(TAGS[*i])).collect()
}

proptest! {
    #[test]
    fn invalidation_reaches_exactly_tagged_entries(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let store = CacheStore::with_defaults();
        let mut model: BTreeMap<u8, TagSet> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Resolve { slot, tags } => {
                    let d = descriptor(slot);
                    let (generation, _) = match store.begin_fetch(&d, pending) {
                        Ok(started) => started,
                        Err(_) => continue,
                    };
                    let tags = tag_set(&tags);
                    store.put(d.key(), generation, Arc::new(json!(slot)), tags.clone());
                    model.insert(slot, tags);
                }
                Op::Invalidate { tag } => {
                    let tag = EntityTag::new(TAGS[tag]);
                    let before: BTreeMap<u8, QueryStatus> = model
                        .keys()
                        .map(|slot| (*slot, store.get(descriptor(*slot).key()).unwrap().status))
                        .collect();

                    let invalidated = store.invalidate(&[tag.clone()].into_iter().collect());
                    let expected: Vec<u8> = model
                        .iter()
                        .filter(|(_, tags)| tags.contains(&tag))
                        .map(|(slot, _)| *slot)
                        .collect();
                    prop_assert_eq!(invalidated.len(), expected.len());

                    for (slot, status) in before {
                        let now = store.get(descriptor(slot).key()).unwrap().status;
                        if expected.contains(&slot) {
                            prop_assert_eq!(now, QueryStatus::Stale);
                        } else {
                            prop_assert_eq!(now, status);
                        }
                    }
                }
            }
        }
    }
}
