//! Per-agent append-only entry logs with registry and lookup indices.

// Mutex poisoning indicates a panic in another thread, which is unrecoverable.
#![allow(clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::fingerprint::Fingerprint;
use crate::identity::{AgentId, AgentMetadata, AgentRecord, Caller};
use crate::store::ContentId;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LedgerError {
    /// The caller may not write records attributed to the target agent.
    #[error("caller {caller} is not authorized to write for agent {agent}")]
    NotAuthorized {
        /// The credential presented.
        caller: String,
        /// The agent the record was attributed to.
        agent: AgentId,
    },

    /// The requested entry index does not exist for the agent.
    #[error("index {index} out of range for agent {agent}: {count} entries recorded")]
    IndexOutOfRange {
        /// The agent whose log was read.
        agent: AgentId,
        /// The requested index.
        index: u64,
        /// The number of entries the agent has.
        count: u64,
    },
}

/// One immutable, indexed record of an agent's action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Deterministic fingerprint of the action.
    pub fingerprint: Fingerprint,

    /// Content id of the stored payload (weak reference; the payload may be
    /// absent from the store without invalidating this entry).
    pub content_id: ContentId,

    /// Unix timestamp in integer seconds.
    pub timestamp: i64,

    /// Zero-based position in the agent's log, assigned at append time.
    pub index: u64,
}

/// One item of the global append feed: an entry plus the agent it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    /// The agent the entry is attributed to.
    pub agent: AgentId,

    /// The appended entry.
    pub entry: LedgerEntry,
}

/// One agent's append-only entry log.
#[derive(Debug, Default)]
struct AgentLog {
    entries: Vec<LedgerEntry>,
}

/// Insertion-ordered agent registry.
#[derive(Debug, Default)]
struct Registry {
    order: Vec<AgentId>,
    records: HashMap<AgentId, AgentRecord>,
}

impl Registry {
    /// Registers an agent on first appearance; later calls are no-ops.
    fn ensure(&mut self, agent: &AgentId) {
        if !self.records.contains_key(agent) {
            self.order.push(agent.clone());
            self.records.insert(
                agent.clone(),
                AgentRecord {
                    address: agent.clone(),
                    metadata: None,
                },
            );
        }
    }
}

/// The append-only provenance ledger.
///
/// Entry lifecycle is exclusively create-only: `append` is the sole mutator,
/// and an entry, once visible, is visible forever at the same index.
///
/// Index assignment is serialized per agent: each agent's log sits behind its
/// own mutex, so concurrent appends for one agent queue while appends for
/// different agents proceed independently. Indices are dense and contiguous
/// from zero.
#[derive(Debug, Default)]
pub struct ProvenanceLedger {
    /// Per-agent logs; the outer lock only guards map shape, never appends.
    logs: RwLock<HashMap<AgentId, Arc<Mutex<AgentLog>>>>,

    /// Every agent ever seen, in first-appearance order.
    registry: Mutex<Registry>,

    /// Cross-agent feed in global append order.
    feed: Mutex<Vec<FeedItem>>,

    /// Fingerprint lookup: every `(agent, index)` a fingerprint was recorded
    /// at. Double-recording is legal and both occurrences are kept.
    by_fingerprint: RwLock<HashMap<Fingerprint, Vec<(AgentId, u64)>>>,
}

impl ProvenanceLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an action record for `agent` and returns the assigned index.
    ///
    /// On the agent's first appearance it is added to the registry. The
    /// entry is visible to readers before this method returns.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotAuthorized`] if `caller` is neither the
    /// operator nor `agent` itself.
    pub fn append(
        &self,
        caller: &Caller,
        agent: &AgentId,
        fingerprint: Fingerprint,
        content_id: ContentId,
        timestamp: i64,
    ) -> Result<u64, LedgerError> {
        if !caller.may_act_for(agent) {
            return Err(LedgerError::NotAuthorized {
                caller: caller.to_string(),
                agent: agent.clone(),
            });
        }

        let log = self.log_handle(agent);
        let mut log = log.lock().expect("lock poisoned");

        let index = log.entries.len() as u64;
        let entry = LedgerEntry {
            fingerprint,
            content_id,
            timestamp,
            index,
        };
        log.entries.push(entry.clone());

        // Secondary indices update while the agent log is still held, so a
        // reader that sees the feed item can already resolve the entry.
        self.feed.lock().expect("lock poisoned").push(FeedItem {
            agent: agent.clone(),
            entry,
        });
        self.by_fingerprint
            .write()
            .expect("lock poisoned")
            .entry(fingerprint)
            .or_default()
            .push((agent.clone(), index));

        debug!(agent = %agent, index, fingerprint = %fingerprint, "appended entry");
        Ok(index)
    }

    /// Registers an agent with descriptive metadata.
    ///
    /// Registration is idempotent on the address: a first registration (or a
    /// registration after the agent was auto-registered by an append)
    /// attaches the metadata; re-registering an agent that already carries
    /// metadata keeps the existing record unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotAuthorized`] if `caller` is neither the
    /// operator nor `agent` itself.
    pub fn register_agent(
        &self,
        caller: &Caller,
        agent: &AgentId,
        metadata: AgentMetadata,
    ) -> Result<(), LedgerError> {
        if !caller.may_act_for(agent) {
            return Err(LedgerError::NotAuthorized {
                caller: caller.to_string(),
                agent: agent.clone(),
            });
        }

        let mut registry = self.registry.lock().expect("lock poisoned");
        registry.ensure(agent);
        let record = registry
            .records
            .get_mut(agent)
            .expect("agent registered above");
        if record.metadata.is_none() {
            record.metadata = Some(metadata);
        }
        Ok(())
    }

    /// Returns the entry at `index` in `agent`'s log.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::IndexOutOfRange`] if the agent has fewer than
    /// `index + 1` entries (including agents never seen).
    pub fn get(&self, agent: &AgentId, index: u64) -> Result<LedgerEntry, LedgerError> {
        let out_of_range = |count| LedgerError::IndexOutOfRange {
            agent: agent.clone(),
            index,
            count,
        };

        let logs = self.logs.read().expect("lock poisoned");
        let log = logs.get(agent).ok_or_else(|| out_of_range(0))?;
        let log = log.lock().expect("lock poisoned");
        log.entries
            .get(index as usize)
            .cloned()
            .ok_or_else(|| out_of_range(log.entries.len() as u64))
    }

    /// Returns all of `agent`'s entries in append order.
    ///
    /// An agent never seen has an empty log, not an error.
    #[must_use]
    pub fn list(&self, agent: &AgentId) -> Vec<LedgerEntry> {
        let logs = self.logs.read().expect("lock poisoned");
        logs.get(agent).map_or_else(Vec::new, |log| {
            log.lock().expect("lock poisoned").entries.clone()
        })
    }

    /// Returns the number of entries recorded for `agent`.
    #[must_use]
    pub fn count(&self, agent: &AgentId) -> u64 {
        let logs = self.logs.read().expect("lock poisoned");
        logs.get(agent).map_or(0, |log| {
            log.lock().expect("lock poisoned").entries.len() as u64
        })
    }

    /// Returns every agent ever seen, in first-appearance order.
    #[must_use]
    pub fn list_agents(&self) -> Vec<AgentRecord> {
        let registry = self.registry.lock().expect("lock poisoned");
        registry
            .order
            .iter()
            .map(|agent| registry.records[agent].clone())
            .collect()
    }

    /// Returns every `(agent, index)` the fingerprint was recorded at, in
    /// global append order. Empty if the fingerprint was never recorded.
    #[must_use]
    pub fn find_by_fingerprint(&self, fingerprint: &Fingerprint) -> Vec<(AgentId, u64)> {
        self.by_fingerprint
            .read()
            .expect("lock poisoned")
            .get(fingerprint)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the most recent `limit` appends across all agents, newest
    /// first.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<FeedItem> {
        let feed = self.feed.lock().expect("lock poisoned");
        feed.iter().rev().take(limit).cloned().collect()
    }

    /// Fetches (or lazily creates) the log handle for an agent.
    ///
    /// Creation registers the agent, so registry order is first-append
    /// order for agents that were never explicitly registered.
    fn log_handle(&self, agent: &AgentId) -> Arc<Mutex<AgentLog>> {
        if let Some(log) = self.logs.read().expect("lock poisoned").get(agent) {
            return Arc::clone(log);
        }

        let mut logs = self.logs.write().expect("lock poisoned");
        let log = logs.entry(agent.clone()).or_insert_with(|| {
            self.registry.lock().expect("lock poisoned").ensure(agent);
            Arc::new(Mutex::new(AgentLog::default()))
        });
        Arc::clone(log)
    }
}
