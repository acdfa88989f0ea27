//! Fuzz harness for canonical JSON serialization.
//!
//! This target feeds arbitrary byte sequences through JSON parsing and
//! canonicalization, ensuring no panics occur on malformed input, and that
//! for every value that does parse, the canonical form is stable: parsing
//! the canonical output and canonicalizing again yields identical bytes.

#![no_main]
use libfuzzer_sys::fuzz_target;
use provenance_core::canonical::{canonical_string, is_canonical};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(text) else {
        return;
    };

    let canonical = canonical_string(&value);
    assert!(
        is_canonical(&canonical),
        "canonical output must be a fixed point"
    );

    let reparsed: serde_json::Value =
        serde_json::from_str(&canonical).expect("canonical output must parse");
    assert_eq!(
        canonical_string(&reparsed),
        canonical,
        "canonicalization must be idempotent"
    );
});
