//! Canonical JSON serialization for deterministic hashing.
//!
//! Fingerprints and content identifiers are hashes over a canonical byte
//! representation of a JSON value:
//!
//! - Object keys are sorted lexicographically (byte order) at every nesting
//!   level, so key insertion order never changes the bytes.
//! - No whitespace between tokens.
//! - Strings use minimal escaping (only `"`, `\`, and control characters
//!   U+0000 through U+001F).
//! - Numbers keep their `serde_json` representation: integers in decimal,
//!   floats in shortest round-trip form. The same logical value always emits
//!   the same bytes.
//!
//! The same logical object therefore always produces the same bytes, and the
//! same bytes always produce the same hash.
//!
//! # Example
//!
//! ```
//! use provenance_core::canonical::canonical_string;
//! use serde_json::json;
//!
//! let value = json!({"z": 1, "a": {"k": true}});
//! assert_eq!(canonical_string(&value), r#"{"a":{"k":true},"z":1}"#);
//! ```

use std::fmt::Write as _;

use serde_json::{Map, Number, Value};

/// Serializes a JSON value to its canonical UTF-8 bytes.
#[must_use]
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    canonical_string(value).into_bytes()
}

/// Serializes a JSON value to its canonical string form.
#[must_use]
pub fn canonical_string(value: &Value) -> String {
    let mut output = String::new();
    emit_value(value, &mut output);
    output
}

/// Checks whether a JSON string is already in canonical form.
#[must_use]
pub fn is_canonical(input: &str) -> bool {
    serde_json::from_str::<Value>(input).is_ok_and(|value| canonical_string(&value) == input)
}

/// Emits a JSON value in canonical form.
fn emit_value(value: &Value, output: &mut String) {
    match value {
        Value::Null => output.push_str("null"),
        Value::Bool(b) => output.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => emit_number(n, output),
        Value::String(s) => emit_string(s, output),
        Value::Array(arr) => emit_array(arr, output),
        Value::Object(obj) => emit_object(obj, output),
    }
}

/// Emits a number in canonical form.
///
/// Integers emit their decimal representation. Floats fall through to
/// `serde_json`'s shortest round-trip formatting, which is a pure function
/// of the stored bits.
fn emit_number(n: &Number, output: &mut String) {
    if let Some(i) = n.as_i64() {
        let _ = write!(output, "{i}");
    } else if let Some(u) = n.as_u64() {
        let _ = write!(output, "{u}");
    } else {
        let _ = write!(output, "{n}");
    }
}

/// Emits a string with minimal escaping.
///
/// Only `"`, `\`, and control characters U+0000 through U+001F are escaped;
/// control characters use the short escapes where JSON defines them and
/// `\uXXXX` otherwise.
fn emit_string(s: &str, output: &mut String) {
    output.push('"');
    for c in s.chars() {
        match c {
            '"' => output.push_str("\\\""),
            '\\' => output.push_str("\\\\"),
            '\u{0008}' => output.push_str("\\b"),
            '\u{000C}' => output.push_str("\\f"),
            '\n' => output.push_str("\\n"),
            '\r' => output.push_str("\\r"),
            '\t' => output.push_str("\\t"),
            c if ('\u{0000}'..='\u{001F}').contains(&c) => {
                let _ = write!(output, "\\u{:04x}", c as u32);
            },
            c => output.push(c),
        }
    }
    output.push('"');
}

/// Emits an array, preserving element order.
fn emit_array(arr: &[Value], output: &mut String) {
    output.push('[');
    for (i, item) in arr.iter().enumerate() {
        if i > 0 {
            output.push(',');
        }
        emit_value(item, output);
    }
    output.push(']');
}

/// Emits an object with keys sorted in byte order.
fn emit_object(obj: &Map<String, Value>, output: &mut String) {
    let mut sorted_keys: Vec<&String> = obj.keys().collect();
    sorted_keys.sort();

    output.push('{');
    for (i, key) in sorted_keys.iter().enumerate() {
        if i > 0 {
            output.push(',');
        }
        emit_string(key, output);
        output.push(':');
        emit_value(&obj[*key], output);
    }
    output.push('}');
}


#[cfg(test)]
mod property_tests {
    use proptest::collection::btree_map;
    use proptest::prelude::*;
    use serde_json::Value;

    use super::canonical_string;

    /// Strategy for a small set of unique string keys with scalar values.
    fn scalar_entries() -> impl Strategy<Value = Vec<(String, Value)>> {
        btree_map(
            "[a-z]{1,8}",
            prop_oneof![
                any::<i64>().prop_map(Value::from),
                any::<bool>().prop_map(Value::from),
                "[ -~]{0,16}".prop_map(Value::from),
            ],
            0..8,
        )
        .prop_map(|m| m.into_iter().collect())
    }

    proptest! {
        #[test]
        fn canonical_form_is_parse_stable(entries in scalar_entries()) {
            let value = Value::Object(entries.into_iter().collect());
            let canonical = canonical_string(&value);
            let reparsed: Value = serde_json::from_str(&canonical).unwrap();
            prop_assert_eq!(canonical_string(&reparsed), canonical);
        }

        #[test]
        fn insertion_order_never_matters(entries in scalar_entries()) {
            let forward = Value::Object(entries.clone().into_iter().collect());
            let reversed = Value::Object(entries.into_iter().rev().collect());
            prop_assert_eq!(canonical_string(&forward), canonical_string(&reversed));
        }
    }
}
