//! Deterministic action fingerprinting.
//!
//! A fingerprint commits to exactly three things: the action's inputs, its
//! outputs, and the integer-second timestamp it was recorded at. The hashed
//! material is the canonical serialization of the bundle
//! `{"inputs": .., "outputs": .., "ts": ..}`, so semantically identical JSON
//! with different key insertion order produces the identical fingerprint,
//! while the same action recorded at a different time does not.
//!
//! Nothing non-deterministic (request ids, random seeds, metadata) belongs in
//! the bundle; callers that want such fields keep them in the stored payload,
//! outside the hash.
//!
//! # Example
//!
//! ```
//! use provenance_core::fingerprint::fingerprint;
//! use serde_json::json;
//!
//! let a = fingerprint(&json!({"q": "sky", "lang": "en"}), &json!({"answer": "blue"}), 1000).unwrap();
//! let b = fingerprint(&json!({"lang": "en", "q": "sky"}), &json!({"answer": "blue"}), 1000).unwrap();
//! assert_eq!(a, b);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::canonical::canonical_bytes;
use crate::crypto::{ActionHasher, Hash, HashParseError, hex};

/// Errors that can occur while fingerprinting an action.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FingerprintError {
    /// The inputs or outputs could not be converted to a JSON value.
    #[error("serialization failed: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },
}

impl From<serde_json::Error> for FingerprintError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

/// A deterministic 32-byte fingerprint of an action record.
///
/// Displayed and serialized as a `0x`-prefixed lowercase hex string. Once
/// computed a fingerprint is never mutated; equality is byte equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(Hash);

impl Fingerprint {
    /// Wraps a raw 32-byte hash.
    #[must_use]
    pub const fn from_bytes(bytes: Hash) -> Self {
        Self(bytes)
    }

    /// Returns the raw hash bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &Hash {
        &self.0
    }

    /// Renders the fingerprint as a `0x`-prefixed hex string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Fingerprint {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        hex::decode(s).map(Self)
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// An action record: the triple a fingerprint commits to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Structured inputs the agent acted on.
    pub inputs: Value,

    /// Structured outputs the agent produced.
    pub outputs: Value,

    /// Unix timestamp in integer seconds.
    pub timestamp: i64,
}

impl ActionRecord {
    /// Computes this record's fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint_value(&self.inputs, &self.outputs, self.timestamp)
    }
}

/// Computes the fingerprint of an action from serializable inputs/outputs.
///
/// # Errors
///
/// Returns [`FingerprintError::Serialization`] if either argument cannot be
/// represented as a JSON value (e.g. a map with non-string keys or a
/// non-finite float). Nothing is coerced; the call fails instead.
pub fn fingerprint<I, O>(inputs: &I, outputs: &O, timestamp: i64) -> Result<Fingerprint, FingerprintError>
where
    I: Serialize,
    O: Serialize,
{
    let inputs = serde_json::to_value(inputs)?;
    let outputs = serde_json::to_value(outputs)?;
    Ok(fingerprint_value(&inputs, &outputs, timestamp))
}

/// Computes the fingerprint of an action already in JSON-value form.
///
/// This is the infallible core: JSON values always canonicalize.
#[must_use]
pub fn fingerprint_value(inputs: &Value, outputs: &Value, timestamp: i64) -> Fingerprint {
    let bundle = bundle(inputs, outputs, timestamp);
    Fingerprint(ActionHasher::hash_content(&canonical_bytes(&bundle)))
}

/// Builds the minimal bundle committed to by the hash.
fn bundle(inputs: &Value, outputs: &Value, timestamp: i64) -> Value {
    let mut map = Map::new();
    map.insert("inputs".to_string(), inputs.clone());
    map.insert("outputs".to_string(), outputs.clone());
    map.insert("ts".to_string(), Value::from(timestamp));
    Value::Object(map)
}

#[cfg(test)]
mod unit_tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;
    use crate::crypto::HASH_SIZE;

    #[test]
    fn test_idempotent() {
        let inputs = json!({"query": "weather", "city": "Lisbon"});
        let outputs = json!({"forecast": "sunny"});

        let a = fingerprint(&inputs, &outputs, 1000).unwrap();
        let b = fingerprint(&inputs, &outputs, 1000).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_order_independence() {
        let a: Value = serde_json::from_str(r#"{"x": 1, "y": {"b": 2, "a": 3}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"y": {"a": 3, "b": 2}, "x": 1}"#).unwrap();

        assert_eq!(
            fingerprint(&a, &json!({}), 42).unwrap(),
            fingerprint(&b, &json!({}), 42).unwrap()
        );
    }

    #[test]
    fn test_timestamp_sensitivity() {
        let inputs = json!({"q": "same"});
        let outputs = json!({"a": "same"});

        assert_ne!(
            fingerprint(&inputs, &outputs, 1000).unwrap(),
            fingerprint(&inputs, &outputs, 1001).unwrap()
        );
    }

    #[test]
    fn test_inputs_and_outputs_both_matter() {
        let base = fingerprint(&json!({"q": 1}), &json!({"a": 1}), 0).unwrap();
        assert_ne!(
            base,
            fingerprint(&json!({"q": 2}), &json!({"a": 1}), 0).unwrap()
        );
        assert_ne!(
            base,
            fingerprint(&json!({"q": 1}), &json!({"a": 2}), 0).unwrap()
        );
    }

    #[test]
    fn test_non_string_map_keys_rejected() {
        let mut bad = HashMap::new();
        bad.insert(vec![1u8, 2u8], "value");

        let result = fingerprint(&bad, &json!({}), 0);
        assert!(matches!(
            result,
            Err(FingerprintError::Serialization { .. })
        ));
    }

    #[test]
    fn test_action_record_matches_free_function() {
        let record = ActionRecord {
            inputs: json!({"prompt": "hello"}),
            outputs: json!({"reply": "hi"}),
            timestamp: 1_697_654_321,
        };
        assert_eq!(
            record.fingerprint(),
            fingerprint(&record.inputs, &record.outputs, record.timestamp).unwrap()
        );
    }

    #[test]
    fn test_display_and_parse_roundtrip() {
        let fp = fingerprint_value(&json!({"k": 1}), &json!(null), 7);
        let rendered = fp.to_string();
        assert!(rendered.starts_with("0x"));
        assert_eq!(rendered.len(), 2 + HASH_SIZE * 2);

        let parsed: Fingerprint = rendered.parse().unwrap();
        assert_eq!(parsed, fp);
    }

    #[test]
    fn test_serde_as_hex_string() {
        let fp = fingerprint_value(&json!({"k": 1}), &json!(null), 7);
        let encoded = serde_json::to_string(&fp).unwrap();
        assert_eq!(encoded, format!("\"{fp}\""));

        let decoded: Fingerprint = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, fp);
    }
}
