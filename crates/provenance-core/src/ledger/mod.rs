//! Append-only provenance ledger.
//!
//! This module keeps one append-only sequence of action entries per agent,
//! an insertion-ordered registry of every agent ever seen, a global feed of
//! appends across agents, and a fingerprint lookup index. Entries are
//! create-only: once appended they are never updated or deleted, and the
//! index assigned at append time is valid forever.
//!
//! # Example
//!
//! ```
//! use provenance_core::identity::{AgentId, Caller};
//! use provenance_core::ledger::ProvenanceLedger;
//! use provenance_core::fingerprint::fingerprint;
//! use provenance_core::store::ContentId;
//! use serde_json::json;
//!
//! let ledger = ProvenanceLedger::new();
//! let agent = AgentId::new("0xabc");
//! let fp = fingerprint(&json!({"q": 1}), &json!({"a": 2}), 1000).unwrap();
//!
//! let index = ledger
//!     .append(&Caller::agent("0xabc"), &agent, fp, ContentId::new("cid-1"), 1000)
//!     .unwrap();
//! assert_eq!(index, 0);
//! assert_eq!(ledger.count(&agent), 1);
//! ```

mod provenance;

pub use provenance::{FeedItem, LedgerEntry, LedgerError, ProvenanceLedger};
