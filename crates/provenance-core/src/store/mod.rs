//! Content-addressed storage for action payloads.
//!
//! Payloads are arbitrary JSON; the store persists whatever it is given and
//! performs no schema validation. Identifiers are derived from the canonical
//! bytes of the payload, which makes `put` idempotent:
//!
//! - storing the same logical payload twice returns the same id and does not
//!   duplicate storage;
//! - concurrent `put` of identical content is harmless, since content is
//!   immutable per id.
//!
//! The store is a seam: the [`ContentStore`] trait is what the rest of the
//! crate depends on, and [`MemoryStore`] is the shipped backend. A ledger
//! entry holds a content id as a weak reference — a missing id is a
//! retrievable-but-absent condition ([`StoreError::NotFound`]), never a
//! ledger corruption.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::canonical::canonical_bytes;
use crate::crypto::{ActionHasher, hex};

/// Default maximum canonical payload size in bytes (1 MiB).
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// No payload is stored under the given id.
    #[error("content not found for id: {id}")]
    NotFound {
        /// The id that was not found.
        id: ContentId,
    },

    /// The payload's canonical form exceeds the configured ceiling.
    #[error("payload too large: {size} bytes exceeds maximum of {max_size} bytes")]
    PayloadTooLarge {
        /// The canonical payload size.
        size: usize,
        /// The configured maximum.
        max_size: usize,
    },
}

/// An opaque content identifier.
///
/// Derived from the payload hash by the shipped backend, but callers must
/// treat it as an opaque string: the only guarantee is uniqueness per
/// content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    /// Wraps an existing identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derives the identifier for a payload from its canonical bytes.
    #[must_use]
    pub fn for_payload(payload: &Value) -> Self {
        let digest = ActionHasher::hash_content(&canonical_bytes(payload));
        Self(hex::encode(&digest))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Trait for content-addressed payload storage backends.
///
/// Implementations must keep `put` idempotent (same payload, same id, no
/// duplicate storage) and must report an unknown id as
/// [`StoreError::NotFound`] rather than failing in any other way.
pub trait ContentStore: Send + Sync {
    /// Stores a payload and returns its content id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PayloadTooLarge`] if the canonical payload
    /// exceeds the backend's size ceiling.
    fn put(&self, payload: &Value) -> Result<ContentId, StoreError>;

    /// Retrieves a payload by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if nothing is stored under `id`.
    fn get(&self, id: &ContentId) -> Result<Value, StoreError>;

    /// Checks whether a payload is stored under `id`.
    fn exists(&self, id: &ContentId) -> bool;
}

/// In-memory content store.
///
/// Suitable for tests and single-process deployments; a distributed content
/// network or disk-backed blob store slots in behind the same trait.
#[derive(Debug)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<ContentId, Value>>,
    max_payload_bytes: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates a store with the default payload ceiling.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_payload_bytes(DEFAULT_MAX_PAYLOAD_BYTES)
    }

    /// Creates a store with a custom payload ceiling.
    #[must_use]
    pub fn with_max_payload_bytes(max_payload_bytes: usize) -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            max_payload_bytes,
        }
    }

    /// Returns the number of distinct payloads stored.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (indicates a thread panic).
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.read().expect("lock poisoned").len()
    }

    /// Returns true if nothing is stored.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (indicates a thread panic).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.read().expect("lock poisoned").is_empty()
    }
}

impl ContentStore for MemoryStore {
    fn put(&self, payload: &Value) -> Result<ContentId, StoreError> {
        let bytes = canonical_bytes(payload);
        if bytes.len() > self.max_payload_bytes {
            return Err(StoreError::PayloadTooLarge {
                size: bytes.len(),
                max_size: self.max_payload_bytes,
            });
        }

        let id = ContentId::new(hex::encode(&ActionHasher::hash_content(&bytes)));

        let mut blobs = self.blobs.write().expect("lock poisoned");
        if !blobs.contains_key(&id) {
            debug!(id = %id, size = bytes.len(), "stored payload");
            blobs.insert(id.clone(), payload.clone());
        }
        Ok(id)
    }

    fn get(&self, id: &ContentId) -> Result<Value, StoreError> {
        let blobs = self.blobs.read().expect("lock poisoned");
        blobs
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })
    }

    fn exists(&self, id: &ContentId) -> bool {
        self.blobs.read().expect("lock poisoned").contains_key(id)
    }
}

#[cfg(test)]
mod unit_tests {
    use std::sync::Arc;
    use std::thread;

    use serde_json::json;

    use super::*;

    #[test]
    fn test_put_and_get() {
        let store = MemoryStore::new();
        let payload = json!({"input": {"prompt": "hello"}, "output": {"reply": "hi"}});

        let id = store.put(&payload).unwrap();
        assert_eq!(store.get(&id).unwrap(), payload);
    }

    #[test]
    fn test_put_idempotent() {
        let store = MemoryStore::new();
        let payload = json!({"k": "v", "n": 1});

        let id1 = store.put(&payload).unwrap();
        let id2 = store.put(&payload).unwrap();

        assert_eq!(id1, id2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_key_order_does_not_change_id() {
        let store = MemoryStore::new();
        let a: Value = serde_json::from_str(r#"{"x": 1, "y": 2}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"y": 2, "x": 1}"#).unwrap();

        assert_eq!(store.put(&a).unwrap(), store.put(&b).unwrap());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_different_payloads_different_ids() {
        let store = MemoryStore::new();
        let id1 = store.put(&json!({"n": 1})).unwrap();
        let id2 = store.put(&json!({"n": 2})).unwrap();

        assert_ne!(id1, id2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_get_unknown_id() {
        let store = MemoryStore::new();
        let result = store.get(&ContentId::new("no-such-id"));
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_exists() {
        let store = MemoryStore::new();
        let id = store.put(&json!(["a", "b"])).unwrap();

        assert!(store.exists(&id));
        assert!(!store.exists(&ContentId::new("missing")));
    }

    #[test]
    fn test_payload_too_large() {
        let store = MemoryStore::with_max_payload_bytes(16);
        let result = store.put(&json!({"text": "well over sixteen bytes of content"}));
        assert!(matches!(result, Err(StoreError::PayloadTooLarge { .. })));
    }

    #[test]
    fn test_no_schema_validation() {
        let store = MemoryStore::new();
        // Scalars, arrays, and null are all storable payloads.
        store.put(&json!(null)).unwrap();
        store.put(&json!(42)).unwrap();
        store.put(&json!([1, [2, [3]]])).unwrap();
    }

    #[test]
    fn test_concurrent_identical_puts() {
        let store = Arc::new(MemoryStore::new());
        let payload = json!({"shared": true, "n": 7});

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let payload = payload.clone();
                thread::spawn(move || store.put(&payload).unwrap())
            })
            .collect();

        let ids: Vec<ContentId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&ids[0]).unwrap(), payload);
    }

    #[test]
    fn test_content_id_for_payload_matches_put() {
        let store = MemoryStore::new();
        let payload = json!({"stable": "id"});
        assert_eq!(store.put(&payload).unwrap(), ContentId::for_payload(&payload));
    }
}
