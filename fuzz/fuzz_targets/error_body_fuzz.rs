//! Fuzz test for failure classification
//!
//! Classifies arbitrary status codes with arbitrary bodies and checks that
//! the taxonomy is total and every failure carries a displayable message.
//!
//! Run with: cargo +nightly fuzz run error_body_fuzz -- -max_total_time=60

#![no_main]

use hms_core::HttpFailure;
use libfuzzer_sys::fuzz_target;
use serde_json::{Map, Value};

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let status = u16::from_le_bytes([data[0], data[1]]);
    let body = serde_json::from_slice::<Value>(&data[2..]).unwrap_or(Value::Object(Map::new()));

    let failure = HttpFailure::from_status(status, &body);

    assert!(!failure.message().is_empty());
    assert_eq!(failure.status(), Some(status));
    assert_eq!(failure.is_authentication(), status == 401);
});
