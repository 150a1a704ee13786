//! Fuzz test for field-key derivation
//!
//! Feeds arbitrary JSON documents through canonical encoding and digesting
//! to find panics and non-deterministic keys.
//!
//! Run with: cargo +nightly fuzz run field_key_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use seqache_storage::{canonical_json, derive_field_key, QueryArgs};
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<Value>(data) else {
        return;
    };

    let args = QueryArgs::new(vec![value]);
    let first = derive_field_key(&args);
    let second = derive_field_key(&args);

    match (first, second) {
        (Ok(a), Ok(b)) => {
            assert_eq!(a, b, "field key must be deterministic");
            assert_eq!(a.as_str().len(), 32);
        }
        (Err(_), Err(_)) => {}
        _ => panic!("derivation succeeded only once"),
    }

    // Canonical output must itself be valid JSON.
    if let Ok(bytes) = canonical_json(&args.without_raw_flag()) {
        assert!(serde_json::from_slice::<Value>(&bytes).is_ok());
    }
});
