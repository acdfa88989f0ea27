//! The ledger-commit seam: durable anchoring on an external ledger.
//!
//! The core treats the underlying distributed ledger as an abstract service
//! that durably persists appended entries, evaluation events, and batch
//! roots, returning an opaque commit reference (a transaction identifier)
//! for each. Commit latency, finality, and retry policy live with the
//! caller; the core only requires that a commit either returns a reference
//! or fails with a typed error — nothing blocks indefinitely here.
//!
//! [`MemoryCommitService`] is the shipped backend: it records commits in
//! memory and mints deterministic pseudo transaction ids, which keeps tests
//! and local runs free of network plumbing.

// Mutex poisoning indicates a panic in another thread, which is unrecoverable.
#![allow(clippy::missing_panics_doc)]

use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::crypto::{ActionHasher, Hash, hex};
use crate::identity::AgentId;
use crate::ledger::LedgerEntry;
use crate::reputation::EvaluationEvent;

/// Errors that can occur when committing to the external ledger.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CommitError {
    /// The ledger service could not be reached or did not answer in time.
    #[error("commit service unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },

    /// The ledger service refused the commit.
    #[error("commit rejected: {message}")]
    Rejected {
        /// The rejection reason reported by the service.
        message: String,
    },
}

/// An opaque reference to a durable commit (transaction-id-like).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitRef(String);

impl CommitRef {
    /// Wraps an existing reference string.
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Returns the reference as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trait for the external ledger-commit service.
///
/// Implementations must be safe to call from multiple threads and must fail
/// with a [`CommitError`] rather than blocking without bound.
pub trait CommitService: Send + Sync {
    /// Durably commits an appended ledger entry.
    ///
    /// # Errors
    ///
    /// Returns [`CommitError`] if the service is unavailable or refuses the
    /// commit.
    fn commit_entry(&self, agent: &AgentId, entry: &LedgerEntry) -> Result<CommitRef, CommitError>;

    /// Durably commits an applied evaluation event.
    ///
    /// # Errors
    ///
    /// Returns [`CommitError`] if the service is unavailable or refuses the
    /// commit.
    fn commit_evaluation(&self, event: &EvaluationEvent) -> Result<CommitRef, CommitError>;

    /// Durably commits a batch root for a time window.
    ///
    /// # Errors
    ///
    /// Returns [`CommitError`] if the service is unavailable or refuses the
    /// commit.
    fn commit_batch_root(
        &self,
        window_start: i64,
        window_end: i64,
        root: &Hash,
    ) -> Result<CommitRef, CommitError>;
}

/// One commit recorded by the in-memory service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommittedItem {
    /// An appended ledger entry.
    Entry {
        /// The agent the entry belongs to.
        agent: AgentId,
        /// The committed entry.
        entry: LedgerEntry,
    },

    /// An applied evaluation event.
    Evaluation {
        /// The committed event.
        event: EvaluationEvent,
    },

    /// A batch root for a time window.
    BatchRoot {
        /// Start of the covered window.
        window_start: i64,
        /// End of the covered window.
        window_end: i64,
        /// The committed merkle root.
        root: Hash,
    },
}

/// In-memory commit service.
///
/// Commit references are deterministic for a given commit history: each is
/// the SHA-256 of the commit's description and its sequence position,
/// rendered as a `0x`-prefixed hex string.
#[derive(Debug, Default)]
pub struct MemoryCommitService {
    log: Mutex<Vec<CommittedItem>>,
}

impl MemoryCommitService {
    /// Creates an empty commit service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every commit in order.
    #[must_use]
    pub fn commits(&self) -> Vec<CommittedItem> {
        self.log.lock().expect("lock poisoned").clone()
    }

    /// Returns the number of commits recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.log.lock().expect("lock poisoned").len()
    }

    /// Returns true if nothing was committed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.log.lock().expect("lock poisoned").is_empty()
    }

    /// Records an item and mints its pseudo transaction id.
    fn record(&self, item: CommittedItem, description: &str) -> CommitRef {
        let mut log = self.log.lock().expect("lock poisoned");
        let material = format!("{}:{}", log.len(), description);
        let digest = ActionHasher::hash_content(material.as_bytes());
        log.push(item);
        debug!(seq = log.len(), description, "recorded commit");
        CommitRef::new(format!("0x{}", hex::encode(&digest)))
    }
}

impl CommitService for MemoryCommitService {
    fn commit_entry(&self, agent: &AgentId, entry: &LedgerEntry) -> Result<CommitRef, CommitError> {
        let description = format!("entry:{}:{}:{}", agent, entry.index, entry.fingerprint);
        Ok(self.record(
            CommittedItem::Entry {
                agent: agent.clone(),
                entry: entry.clone(),
            },
            &description,
        ))
    }

    fn commit_evaluation(&self, event: &EvaluationEvent) -> Result<CommitRef, CommitError> {
        let description = format!(
            "evaluation:{}:{}:{}:{}",
            event.agent, event.index, event.good, event.delta
        );
        Ok(self.record(
            CommittedItem::Evaluation {
                event: event.clone(),
            },
            &description,
        ))
    }

    fn commit_batch_root(
        &self,
        window_start: i64,
        window_end: i64,
        root: &Hash,
    ) -> Result<CommitRef, CommitError> {
        let description = format!(
            "batch:{window_start}:{window_end}:{}",
            hex::encode(root)
        );
        Ok(self.record(
            CommittedItem::BatchRoot {
                window_start,
                window_end,
                root: *root,
            },
            &description,
        ))
    }
}
