//! Batch anchoring of off-chain attestations via merkle commitments.
//!
//! A large window of run attestations is folded into a single merkle root so
//! that one compact on-ledger commitment covers all of them; later, any
//! individual attestation can be shown to belong to the window with an
//! O(log n) inclusion proof instead of replaying every leaf.
//!
//! [`AttestationBatch`] collects leaf hashes for a time window and freezes
//! them at commit; [`InclusionProof`] and [`verify_inclusion`] implement the
//! proof side. The pairing convention for an odd node count is fixed
//! (duplicate-last) and shared by prover and verifier.

mod batch;
mod merkle;

pub use batch::{AttestationBatch, DEFAULT_MAX_BATCH_LEAVES};
pub use merkle::{
    AnchorError, InclusionProof, MAX_PROOF_DEPTH, ProofStep, Side, merkle_root, prove_inclusion,
    verify_inclusion,
};
