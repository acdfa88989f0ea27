//! Core library for the action provenance ledger.
//!
//! This crate records AI-agent actions in a tamper-evident, content-addressed
//! audit trail and keeps a reputation score per agent that moves only through
//! evaluations of specific recorded actions.
//!
//! # Architecture
//!
//! ```text
//! inputs / outputs / timestamp
//!         |
//!         v
//!   fingerprint (canonical JSON -> SHA-256)
//!         |
//!         +--> store (content-addressed payload, idempotent put)
//!         |
//!         v
//!   ledger (per-agent append-only entries, dense indices, registry)
//!         |
//!         +--> reputation (signed balance, evaluation audit trail)
//!         |
//!         v
//!   commit service (durable anchoring on the external ledger)
//!
//!   anchor (merkle batches over off-chain attestations, inclusion proofs)
//! ```
//!
//! The [`service::ProvenanceService`] facade wires the pieces together for
//! the serving layer; each module is also usable on its own.
//!
//! # Guarantees
//!
//! - **Hash determinism**: identical logical JSON yields identical
//!   fingerprints regardless of key insertion order; recomputation is
//!   idempotent.
//! - **Append-only ordering**: per-agent indices are dense, contiguous, and
//!   immutable, even under concurrent appends.
//! - **Idempotent storage**: storing identical content twice yields the same
//!   id and one stored copy.
//! - **Consistent accounting**: concurrent evaluations never lose an update;
//!   every applied evaluation is auditable.
//! - **Compact anchoring**: a window of attestations commits as one merkle
//!   root with O(log n) inclusion proofs.

pub mod anchor;
pub mod canonical;
pub mod commit;
pub mod config;
pub mod crypto;
pub mod fingerprint;
pub mod identity;
pub mod ledger;
pub mod reputation;
pub mod service;
pub mod store;
