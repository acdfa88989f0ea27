//! The facade the serving layer calls into.
//!
//! [`ProvenanceService`] wires the fingerprinter, content store, provenance
//! ledger, reputation ledger, and commit service together behind one
//! surface. Logging an action runs the full pipeline in a fixed order:
//!
//! 1. fingerprint the `(inputs, outputs, timestamp)` triple,
//! 2. persist the payload in the content store,
//! 3. append the `(fingerprint, content id, timestamp)` entry to the
//!    agent's log,
//! 4. anchor the entry on the external ledger through the commit service.
//!
//! A commit-service failure after a successful append does not undo the
//! append: the entry is recorded, the result carries the assigned index with
//! no commit reference, and the caller may re-anchor later. Batch anchoring,
//! by contrast, surfaces commit failures as typed errors since re-anchoring
//! a committed batch is idempotent.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::anchor::{AnchorError, AttestationBatch};
use crate::commit::{CommitError, CommitRef, CommitService};
use crate::config::CoreConfig;
use crate::fingerprint::{Fingerprint, FingerprintError, fingerprint_value};
use crate::identity::{AgentId, AgentMetadata, AgentRecord, Caller};
use crate::ledger::{FeedItem, LedgerEntry, LedgerError, ProvenanceLedger};
use crate::reputation::{EvaluationEvent, ReputationError, ReputationLedger};
use crate::store::{ContentId, ContentStore, MemoryStore, StoreError};

/// Errors surfaced by the facade.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServiceError {
    /// Fingerprinting failed.
    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),

    /// The content store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The provenance ledger rejected the operation.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The reputation ledger rejected the operation.
    #[error(transparent)]
    Reputation(#[from] ReputationError),

    /// A batch-anchor operation failed.
    #[error(transparent)]
    Anchor(#[from] AnchorError),

    /// The external commit service failed.
    #[error(transparent)]
    Commit(#[from] CommitError),
}

/// The result of logging an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedAction {
    /// Deterministic fingerprint of the action.
    pub fingerprint: Fingerprint,

    /// Content id of the stored payload.
    pub content_id: ContentId,

    /// The timestamp the record was fingerprinted with.
    pub timestamp: i64,

    /// The index assigned in the agent's log.
    pub index: u64,

    /// Reference to the durable commit, or `None` if the external ledger
    /// was unavailable (the entry itself is recorded either way).
    pub commit_ref: Option<CommitRef>,
}

/// One row of the leaderboard projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    /// Rank, starting at 1.
    pub rank: usize,

    /// The ranked agent.
    pub agent: AgentId,

    /// The agent's current balance.
    pub balance: i64,

    /// The number of actions the agent has recorded.
    pub action_count: u64,
}

/// The core facade: fingerprint, store, append, evaluate, anchor.
pub struct ProvenanceService {
    store: Arc<dyn ContentStore>,
    commit: Arc<dyn CommitService>,
    ledger: ProvenanceLedger,
    reputation: ReputationLedger,
    config: CoreConfig,
}

impl ProvenanceService {
    /// Creates a service over explicit store and commit backends.
    #[must_use]
    pub fn new(
        config: CoreConfig,
        store: Arc<dyn ContentStore>,
        commit: Arc<dyn CommitService>,
    ) -> Self {
        Self {
            store,
            commit,
            ledger: ProvenanceLedger::new(),
            reputation: ReputationLedger::new(),
            config,
        }
    }

    /// Creates a fully in-memory service with the given configuration.
    #[must_use]
    pub fn in_memory(config: CoreConfig) -> Self {
        let store = Arc::new(MemoryStore::with_max_payload_bytes(
            config.max_payload_bytes,
        ));
        let commit = Arc::new(crate::commit::MemoryCommitService::new());
        Self::new(config, store, commit)
    }

    /// Logs an action for `agent`: fingerprint, store, append, anchor.
    ///
    /// With `timestamp: None` the current wall-clock second is used.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::Fingerprint`] if inputs or outputs cannot be
    ///   represented as JSON (nothing is coerced; the call fails).
    /// - [`ServiceError::Store`] if the payload exceeds the store ceiling.
    /// - [`ServiceError::Ledger`] if `caller` may not write for `agent`.
    pub fn log_action<I, O>(
        &self,
        caller: &Caller,
        agent: &AgentId,
        inputs: &I,
        outputs: &O,
        timestamp: Option<i64>,
    ) -> Result<LoggedAction, ServiceError>
    where
        I: Serialize + ?Sized,
        O: Serialize + ?Sized,
    {
        let timestamp = timestamp.unwrap_or_else(now_secs);
        let inputs = serde_json::to_value(inputs).map_err(FingerprintError::from)?;
        let outputs = serde_json::to_value(outputs).map_err(FingerprintError::from)?;
        let fingerprint = fingerprint_value(&inputs, &outputs, timestamp);

        // The stored payload carries the agent attribution alongside the
        // hashed triple; only the triple feeds the fingerprint.
        let mut payload = Map::new();
        payload.insert("agent".to_string(), Value::String(agent.to_string()));
        payload.insert("inputs".to_string(), inputs);
        payload.insert("outputs".to_string(), outputs);
        payload.insert("timestamp".to_string(), Value::from(timestamp));
        let content_id = self.store.put(&Value::Object(payload))?;

        let index = self
            .ledger
            .append(caller, agent, fingerprint, content_id.clone(), timestamp)?;

        let entry = LedgerEntry {
            fingerprint,
            content_id: content_id.clone(),
            timestamp,
            index,
        };
        let commit_ref = match self.commit.commit_entry(agent, &entry) {
            Ok(reference) => Some(reference),
            Err(err) => {
                warn!(agent = %agent, index, error = %err, "entry recorded but not anchored");
                None
            },
        };

        Ok(LoggedAction {
            fingerprint,
            content_id,
            timestamp,
            index,
            commit_ref,
        })
    }

    /// Applies an evaluation and returns the agent's new balance.
    ///
    /// The applied event is forwarded to the commit service; an anchoring
    /// failure is logged and does not undo the evaluation.
    ///
    /// # Errors
    ///
    /// Propagates [`ReputationError`] preconditions (authorization, delta
    /// sign, entry existence).
    pub fn evaluate(
        &self,
        caller: &Caller,
        agent: &AgentId,
        index: u64,
        good: bool,
        delta: i64,
        reason: &str,
    ) -> Result<i64, ServiceError> {
        let balance =
            self.reputation
                .evaluate(caller, &self.ledger, agent, index, good, delta, reason)?;

        let event = EvaluationEvent {
            agent: agent.clone(),
            index,
            good,
            delta: delta.unsigned_abs(),
            reason: reason.to_string(),
            balance_after: balance,
        };
        if let Err(err) = self.commit.commit_evaluation(&event) {
            warn!(agent = %agent, index, error = %err, "evaluation applied but not anchored");
        }

        Ok(balance)
    }

    /// Registers an agent with descriptive metadata (idempotent).
    ///
    /// # Errors
    ///
    /// Propagates [`LedgerError::NotAuthorized`].
    pub fn register_agent(
        &self,
        caller: &Caller,
        agent: &AgentId,
        metadata: AgentMetadata,
    ) -> Result<(), ServiceError> {
        self.ledger.register_agent(caller, agent, metadata)?;
        Ok(())
    }

    /// Begins an attestation batch sized by this service's configuration.
    #[must_use]
    pub fn begin_batch(&self, window_start: i64, window_end: i64) -> AttestationBatch {
        AttestationBatch::begin_with_max_leaves(
            window_start,
            window_end,
            self.config.max_batch_leaves,
        )
    }

    /// Commits a batch (if still open) and anchors its root.
    ///
    /// On success the batch carries the returned reference. A commit-service
    /// failure leaves the batch committed but unanchored; calling again
    /// retries only the anchoring.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::Anchor`] (`EmptyBatch`) for a batch with no leaves.
    /// - [`ServiceError::Commit`] if the external ledger fails.
    pub fn anchor_batch(&self, batch: &mut AttestationBatch) -> Result<CommitRef, ServiceError> {
        let root = match batch.root() {
            Some(root) => *root,
            None => batch.commit()?,
        };

        let reference =
            self.commit
                .commit_batch_root(batch.window_start(), batch.window_end(), &root)?;
        batch.set_anchor_reference(reference.as_str());
        Ok(reference)
    }

    /// Returns the entry at `index` in `agent`'s log.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Ledger`] (`IndexOutOfRange`) if absent.
    pub fn action(&self, agent: &AgentId, index: u64) -> Result<LedgerEntry, ServiceError> {
        Ok(self.ledger.get(agent, index)?)
    }

    /// Returns all of `agent`'s entries in append order.
    #[must_use]
    pub fn actions(&self, agent: &AgentId) -> Vec<LedgerEntry> {
        self.ledger.list(agent)
    }

    /// Returns the stored payload for a content id.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Store`] (`NotFound`) for an unknown or
    /// since-lost id; a ledger entry referencing it remains valid.
    pub fn payload(&self, id: &ContentId) -> Result<Value, ServiceError> {
        Ok(self.store.get(id)?)
    }

    /// Returns every agent ever seen, in first-appearance order.
    #[must_use]
    pub fn agents(&self) -> Vec<AgentRecord> {
        self.ledger.list_agents()
    }

    /// Returns `agent`'s current reputation balance.
    #[must_use]
    pub fn balance(&self, agent: &AgentId) -> i64 {
        self.reputation.balance(agent)
    }

    /// Returns the most recent appends across all agents, newest first.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<FeedItem> {
        self.ledger.recent(limit)
    }

    /// Returns every `(agent, index)` a fingerprint was recorded at.
    #[must_use]
    pub fn find_by_fingerprint(&self, fingerprint: &Fingerprint) -> Vec<(AgentId, u64)> {
        self.ledger.find_by_fingerprint(fingerprint)
    }

    /// Builds the leaderboard: a read-only projection over balances and
    /// action counts, ranked by balance, then action count, then address.
    #[must_use]
    pub fn leaderboard(&self) -> Vec<LeaderboardRow> {
        let mut rows: Vec<LeaderboardRow> = self
            .ledger
            .list_agents()
            .into_iter()
            .map(|record| LeaderboardRow {
                rank: 0,
                balance: self.reputation.balance(&record.address),
                action_count: self.ledger.count(&record.address),
                agent: record.address,
            })
            .collect();

        rows.sort_by(|a, b| {
            b.balance
                .cmp(&a.balance)
                .then_with(|| b.action_count.cmp(&a.action_count))
                .then_with(|| a.agent.cmp(&b.agent))
        });
        for (i, row) in rows.iter_mut().enumerate() {
            row.rank = i + 1;
        }
        rows
    }

    /// Direct access to the provenance ledger.
    #[must_use]
    pub const fn ledger(&self) -> &ProvenanceLedger {
        &self.ledger
    }

    /// Direct access to the reputation ledger.
    #[must_use]
    pub const fn reputation(&self) -> &ReputationLedger {
        &self.reputation
    }
}

/// Current wall-clock time in integer seconds.
fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
