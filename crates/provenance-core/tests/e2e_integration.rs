//! End-to-end integration tests for the provenance workflow.
//!
//! These tests walk the complete pipeline the serving layer drives:
//!
//! - fingerprint -> store -> append -> commit for a sequence of actions
//! - evaluation of recorded actions and the resulting balances
//! - registry and feed projections over multiple agents
//! - folding attestations into a merkle batch and verifying inclusion
//!   against the anchored root
//!
//! ```text
//! ActionRequest
//!     |
//!     v
//! ProvenanceService::log_action
//!     |
//!     +--> MemoryStore (payload by content id)
//!     +--> ProvenanceLedger (indexed entry)
//!     +--> MemoryCommitService (pseudo tx reference)
//!     |
//!     v
//! ProvenanceService::evaluate -> ReputationLedger
//!     |
//!     v
//! AttestationBatch -> anchor_batch -> inclusion proofs
//! ```

use std::sync::Arc;

use provenance_core::anchor::verify_inclusion;
use provenance_core::commit::{CommitService, CommittedItem, MemoryCommitService};
use provenance_core::config::CoreConfig;
use provenance_core::crypto::ActionHasher;
use provenance_core::fingerprint::fingerprint;
use provenance_core::identity::{AgentId, AgentMetadata, Caller};
use provenance_core::ledger::LedgerError;
use provenance_core::reputation::ReputationError;
use provenance_core::service::{ProvenanceService, ServiceError};
use provenance_core::store::MemoryStore;
use serde_json::json;

fn in_memory_service() -> (ProvenanceService, Arc<MemoryCommitService>) {
    let commit = Arc::new(MemoryCommitService::new());
    let store = Arc::new(MemoryStore::new());
    let commit_dyn: Arc<dyn CommitService> = commit.clone();
    let service = ProvenanceService::new(CoreConfig::default(), store, commit_dyn);
    (service, commit)
}

#[test]
fn test_full_provenance_scenario() {
    let (service, commit) = in_memory_service();
    let operator = Caller::Operator;
    let a1 = AgentId::new("0x1234567890123456789012345678901234567890");

    // First action: index 0.
    let first = service
        .log_action(
            &operator,
            &a1,
            &json!({"query": "What is the market trend?", "user_id": "user123"}),
            &json!({"analysis": "Tech stocks are bullish", "confidence": 0.85}),
            Some(1000),
        )
        .unwrap();
    assert_eq!(first.index, 0);
    assert!(first.commit_ref.is_some());

    // Second action, different outputs: index 1, different fingerprint.
    let second = service
        .log_action(
            &operator,
            &a1,
            &json!({"query": "What is the market trend?", "user_id": "user123"}),
            &json!({"analysis": "Sideways consolidation", "confidence": 0.62}),
            Some(1000),
        )
        .unwrap();
    assert_eq!(second.index, 1);
    assert_ne!(second.fingerprint, first.fingerprint);

    // Evaluate both: +1 on the first, -3 on the second.
    let balance = service
        .evaluate(&operator, &a1, 0, true, 1, "Good analysis")
        .unwrap();
    assert_eq!(balance, 1);
    let balance = service
        .evaluate(&operator, &a1, 1, false, 3, "Incorrect information")
        .unwrap();
    assert_eq!(balance, -2);
    assert_eq!(service.balance(&a1), -2);

    // The agent is registered exactly once.
    let agents = service.agents();
    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0].address, a1);

    // The payloads round-trip through the content store.
    let payload = service.payload(&first.content_id).unwrap();
    assert_eq!(payload["outputs"]["confidence"], json!(0.85));

    // The commit service saw two entries and two evaluations.
    let commits = commit.commits();
    assert_eq!(commits.len(), 4);
    assert!(matches!(commits[0], CommittedItem::Entry { .. }));
    assert!(matches!(commits[3], CommittedItem::Evaluation { .. }));
}

#[test]
fn test_fingerprint_determinism_through_the_stack() {
    let (service, _commit) = in_memory_service();
    let agent = AgentId::new("0xdeterminism");

    // The same logical action, keys in a different order.
    let logged = service
        .log_action(
            &Caller::Operator,
            &agent,
            &serde_json::from_str::<serde_json::Value>(r#"{"b": 2, "a": 1}"#).unwrap(),
            &serde_json::from_str::<serde_json::Value>(r#"{"y": false, "x": true}"#).unwrap(),
            Some(7777),
        )
        .unwrap();

    let recomputed = fingerprint(
        &serde_json::from_str::<serde_json::Value>(r#"{"a": 1, "b": 2}"#).unwrap(),
        &serde_json::from_str::<serde_json::Value>(r#"{"x": true, "y": false}"#).unwrap(),
        7777,
    )
    .unwrap();
    assert_eq!(logged.fingerprint, recomputed);

    // A different timestamp must change the fingerprint.
    let shifted = service
        .log_action(
            &Caller::Operator,
            &agent,
            &serde_json::from_str::<serde_json::Value>(r#"{"a": 1, "b": 2}"#).unwrap(),
            &serde_json::from_str::<serde_json::Value>(r#"{"x": true, "y": false}"#).unwrap(),
            Some(7778),
        )
        .unwrap();
    assert_ne!(shifted.fingerprint, logged.fingerprint);
}

#[test]
fn test_multi_agent_registry_and_feed() {
    let (service, _commit) = in_memory_service();
    let operator = Caller::Operator;

    let agents: Vec<AgentId> = ["0xfin", "0xmed", "0xlegal"]
        .iter()
        .map(|a| AgentId::new(*a))
        .collect();

    service
        .register_agent(
            &operator,
            &agents[0],
            AgentMetadata {
                name: "Financial Advisor Bot".to_string(),
                owner_org: "Demo Corp".to_string(),
                pubkey: "demo_pubkey_1".to_string(),
                stake_address: "0xfin".to_string(),
            },
        )
        .unwrap();

    for (i, agent) in agents.iter().enumerate() {
        service
            .log_action(
                &operator,
                agent,
                &json!({"task": i}),
                &json!({"done": true}),
                Some(2000 + i as i64),
            )
            .unwrap();
    }

    // Registry order: explicit registration first, then first-append order.
    let records = service.agents();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].address, agents[0]);
    assert!(records[0].metadata.is_some());
    assert_eq!(records[1].address, agents[1]);
    assert_eq!(records[2].address, agents[2]);

    // Feed returns newest first.
    let recent = service.recent(2);
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].agent, agents[2]);
    assert_eq!(recent[1].agent, agents[1]);
}

#[test]
fn test_authorization_boundaries() {
    let (service, _commit) = in_memory_service();
    let victim = AgentId::new("0xvictim");
    let intruder = Caller::agent("0xintruder");

    // Cross-agent append by a non-operator fails.
    let result = service.log_action(&intruder, &victim, &json!({}), &json!({}), Some(1000));
    assert!(matches!(
        result,
        Err(ServiceError::Ledger(LedgerError::NotAuthorized { .. }))
    ));

    // Self-append is fine.
    service
        .log_action(
            &Caller::agent("0xvictim"),
            &victim,
            &json!({}),
            &json!({}),
            Some(1000),
        )
        .unwrap();

    // Evaluation requires the operator credential.
    let result = service.evaluate(&intruder, &victim, 0, true, 1, "nope");
    assert!(matches!(
        result,
        Err(ServiceError::Reputation(ReputationError::NotAuthorized { .. }))
    ));

    // Out-of-range evaluation on an agent with no entries.
    let empty = AgentId::new("0xempty");
    let result = service.evaluate(&Caller::Operator, &empty, 999, true, 1, "phantom");
    assert!(matches!(
        result,
        Err(ServiceError::Reputation(ReputationError::Ledger(
            LedgerError::IndexOutOfRange { .. }
        )))
    ));
}

#[test]
fn test_attestation_batch_anchoring() {
    let (service, commit) = in_memory_service();
    let operator = Caller::Operator;
    let agent = AgentId::new("0xattested");

    // Record a window of actions and fold their fingerprints into a batch.
    let mut batch = service.begin_batch(3000, 4000);
    let mut leaves = Vec::new();
    for i in 0..9i64 {
        let logged = service
            .log_action(
                &operator,
                &agent,
                &json!({"step": i}),
                &json!({"ok": true}),
                Some(3000 + i),
            )
            .unwrap();
        let leaf = *logged.fingerprint.as_bytes();
        batch.add_leaf(leaf).unwrap();
        leaves.push(leaf);
    }

    let reference = service.anchor_batch(&mut batch).unwrap();
    let root = *batch.root().unwrap();
    assert_eq!(batch.anchor_reference(), Some(reference.as_str()));

    // Every attestation proves inclusion against the anchored root.
    for leaf in &leaves {
        let proof = batch.prove_inclusion(leaf).unwrap();
        assert!(verify_inclusion(&root, leaf, &proof));
    }

    // A foreign attestation does not.
    let foreign = ActionHasher::hash_content(b"not in the window");
    assert!(batch.prove_inclusion(&foreign).is_err());

    // The root the commit service anchored matches the batch's root.
    let anchored = commit.commits().into_iter().find_map(|item| match item {
        CommittedItem::BatchRoot { root, .. } => Some(root),
        _ => None,
    });
    assert_eq!(anchored, Some(root));
}

#[test]
fn test_missing_payload_does_not_invalidate_entry() {
    // A ledger entry holds its content id as a weak reference: wiring the
    // service to a store that never saw the payload must leave reads of the
    // entry intact while the payload reports as absent.
    let commit = Arc::new(MemoryCommitService::new());
    let store = Arc::new(MemoryStore::new());
    let service = ProvenanceService::new(CoreConfig::default(), store, commit);
    let agent = AgentId::new("0xa1");

    let logged = service
        .log_action(&Caller::Operator, &agent, &json!({"k": 1}), &json!({}), Some(1000))
        .unwrap();

    // Entry reads fine.
    let entry = service.action(&agent, logged.index).unwrap();
    assert_eq!(entry.content_id, logged.content_id);

    // An id the store never saw is a typed absence, not a crash.
    let missing = provenance_core::store::ContentId::new("unseen-id");
    let result = service.payload(&missing);
    assert!(matches!(
        result,
        Err(ServiceError::Store(
            provenance_core::store::StoreError::NotFound { .. }
        ))
    ));
}
