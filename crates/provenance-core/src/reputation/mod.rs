//! Reputation accounting driven by evaluation events.
//!
//! Each agent carries one signed integer balance, default zero, mutated only
//! by applying an evaluation event that references a specific recorded
//! action. Good evaluations add the delta, bad ones subtract it, and the
//! balance has no floor: persistently poor behavior stays visible as a
//! negative score.
//!
//! Evaluations are additive and repeatable: evaluating the same
//! `(agent, index)` twice applies twice. The ledger keeps an append-only
//! audit trail of evaluation events, not a single mutable rating per entry.
//!
//! Balance mutation is serialized per agent (one mutex per balance), so
//! concurrent evaluations never lose an update; evaluations of different
//! agents share no lock.

// Mutex poisoning indicates a panic in another thread, which is unrecoverable.
#![allow(clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::identity::{AgentId, Caller};
use crate::ledger::{LedgerError, ProvenanceLedger};

/// Errors that can occur during reputation operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReputationError {
    /// The referenced ledger entry does not exist.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The evaluation magnitude was negative.
    ///
    /// The sign of an evaluation is carried by its `good` flag; the delta is
    /// a magnitude and must be non-negative.
    #[error("invalid delta {delta}: evaluation magnitude must be non-negative")]
    InvalidDelta {
        /// The rejected delta.
        delta: i64,
    },

    /// The caller may not apply evaluations.
    #[error("caller {caller} is not authorized to evaluate agent {agent}")]
    NotAuthorized {
        /// The credential presented.
        caller: String,
        /// The agent being evaluated.
        agent: AgentId,
    },
}

/// One applied evaluation, kept for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationEvent {
    /// The agent whose balance was adjusted.
    pub agent: AgentId,

    /// Index of the ledger entry the evaluation references.
    pub index: u64,

    /// Whether the action was judged good (`true` adds, `false` subtracts).
    pub good: bool,

    /// Magnitude of the adjustment.
    pub delta: u64,

    /// Free-text justification supplied by the evaluator.
    pub reason: String,

    /// The agent's balance after applying this event.
    pub balance_after: i64,
}

/// Signed point balances per agent, mutated only through evaluations.
#[derive(Debug, Default)]
pub struct ReputationLedger {
    /// Per-agent balances; the outer lock only guards map shape.
    balances: RwLock<HashMap<AgentId, Arc<Mutex<i64>>>>,

    /// Append-only audit trail of applied evaluations.
    events: Mutex<Vec<EvaluationEvent>>,
}

impl ReputationLedger {
    /// Creates an empty reputation ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies an evaluation of `agent`'s entry at `index` and returns the
    /// new balance.
    ///
    /// The referenced entry is not mutated or invalidated; the evaluation is
    /// recorded in the audit trail. Re-evaluating the same entry applies
    /// again.
    ///
    /// # Errors
    ///
    /// - [`ReputationError::NotAuthorized`] unless `caller` is the operator
    ///   (evaluations are on-behalf judgments by nature).
    /// - [`ReputationError::InvalidDelta`] if `delta` is negative.
    /// - [`ReputationError::Ledger`] (`IndexOutOfRange`) if `agent` has no
    ///   entry at `index`.
    #[allow(clippy::too_many_arguments)]
    pub fn evaluate(
        &self,
        caller: &Caller,
        ledger: &ProvenanceLedger,
        agent: &AgentId,
        index: u64,
        good: bool,
        delta: i64,
        reason: &str,
    ) -> Result<i64, ReputationError> {
        if !caller.is_operator() {
            return Err(ReputationError::NotAuthorized {
                caller: caller.to_string(),
                agent: agent.clone(),
            });
        }

        let Ok(magnitude) = u64::try_from(delta) else {
            return Err(ReputationError::InvalidDelta { delta });
        };

        // Existence check before touching the balance; the referenced entry
        // can never disappear afterwards (the ledger is append-only).
        ledger.get(agent, index)?;

        let balance = self.balance_handle(agent);
        let mut balance = balance.lock().expect("lock poisoned");

        let signed = i64::try_from(magnitude).unwrap_or(i64::MAX);
        *balance = if good {
            balance.saturating_add(signed)
        } else {
            balance.saturating_sub(signed)
        };
        let new_balance = *balance;

        self.events.lock().expect("lock poisoned").push(EvaluationEvent {
            agent: agent.clone(),
            index,
            good,
            delta: magnitude,
            reason: reason.to_string(),
            balance_after: new_balance,
        });

        debug!(agent = %agent, index, good, delta = magnitude, new_balance, "applied evaluation");
        Ok(new_balance)
    }

    /// Returns `agent`'s current balance (zero if never evaluated).
    #[must_use]
    pub fn balance(&self, agent: &AgentId) -> i64 {
        let balances = self.balances.read().expect("lock poisoned");
        balances
            .get(agent)
            .map_or(0, |b| *b.lock().expect("lock poisoned"))
    }

    /// Returns the full audit trail in application order.
    #[must_use]
    pub fn events(&self) -> Vec<EvaluationEvent> {
        self.events.lock().expect("lock poisoned").clone()
    }

    /// Returns the audit trail filtered to one agent, in application order.
    #[must_use]
    pub fn events_for(&self, agent: &AgentId) -> Vec<EvaluationEvent> {
        self.events
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter(|e| &e.agent == agent)
            .cloned()
            .collect()
    }

    /// Fetches (or lazily creates) the balance handle for an agent.
    fn balance_handle(&self, agent: &AgentId) -> Arc<Mutex<i64>> {
        if let Some(balance) = self.balances.read().expect("lock poisoned").get(agent) {
            return Arc::clone(balance);
        }

        let mut balances = self.balances.write().expect("lock poisoned");
        let balance = balances
            .entry(agent.clone())
            .or_insert_with(|| Arc::new(Mutex::new(0)));
        Arc::clone(balance)
    }
}
