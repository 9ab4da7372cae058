//! Fuzz test for query argument canonicalization
//!
//! Feeds arbitrary JSON documents through `canonical_args` to find:
//! - Panics on deep or unusual documents
//! - Keys that depend on member order
//!
//! Run with: cargo +nightly fuzz run query_key_fuzz -- -max_total_time=60

#![no_main]

use hms_core::{canonical_args, QueryKey};
use libfuzzer_sys::fuzz_target;
use serde_json::Value;

fn reversed(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .rev()
                .map(|(k, v)| (k.clone(), reversed(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(reversed).collect()),
        other => other.clone(),
    }
}

fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<Value>(data) else {
        return;
    };

    let canonical = canonical_args(&value);

    // The canonical form is itself valid JSON.
    assert!(serde_json::from_str::<Value>(&canonical).is_ok());

    // Member order never changes the key.
    assert_eq!(canonical, canonical_args(&reversed(&value)));
    assert_eq!(
        QueryKey::new("fuzz", &value),
        QueryKey::new("fuzz", &reversed(&value))
    );
});
