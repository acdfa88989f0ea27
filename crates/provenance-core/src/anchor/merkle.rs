//! Merkle tree construction, inclusion proofs, and verification.
//!
//! Leaves are ordered by insertion. Each level pairs adjacent nodes and
//! hashes them upward with `SHA-256(left || right)`; an odd trailing node is
//! paired with itself (duplicate-last). A single-leaf tree's root is the
//! leaf itself.
//!
//! The duplicate-last convention is load-bearing: anchored roots were
//! produced with it, so the verifier must recompute with the same rule or
//! every proof over an odd level would fail.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{ActionHasher, HASH_SIZE, Hash};

/// Maximum number of steps in an inclusion proof.
///
/// A tree over `2^64` leaves needs 64 levels; anything longer is malformed.
pub const MAX_PROOF_DEPTH: usize = 64;

/// Bytes per encoded proof step: one direction byte plus one sibling hash.
const STEP_ENCODED_LEN: usize = 1 + HASH_SIZE;

/// Errors that can occur during batch-anchor operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AnchorError {
    /// The batch has been committed; its leaf set is frozen.
    #[error("batch is closed: committed batches accept no further changes")]
    BatchClosed,

    /// The batch is still open; proofs are only issued against a frozen
    /// leaf set.
    #[error("batch is open: commit it before requesting proofs")]
    BatchOpen,

    /// A root is undefined for zero leaves.
    #[error("cannot commit an empty batch")]
    EmptyBatch,

    /// The proof bytes are malformed.
    #[error("invalid proof: {reason}")]
    InvalidProof {
        /// What made the proof malformed.
        reason: String,
    },

    /// The leaf is not part of the batch.
    #[error("leaf {leaf} is not part of this batch")]
    LeafNotFound {
        /// Hex encoding of the missing leaf.
        leaf: String,
    },

    /// The batch's leaf ceiling was reached.
    #[error("too many leaves: {count} exceeds maximum of {max}")]
    TooManyLeaves {
        /// Leaves already in the batch.
        count: usize,
        /// The configured ceiling.
        max: usize,
    },
}

/// Which side of the running hash the sibling sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    /// The sibling is the left operand: `parent = H(sibling || acc)`.
    Left,
    /// The sibling is the right operand: `parent = H(acc || sibling)`.
    Right,
}

/// One step of an inclusion proof: a sibling hash and its side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    /// The sibling node at this level.
    pub sibling: Hash,

    /// The sibling's position relative to the running hash.
    pub side: Side,
}

/// An inclusion proof: the sibling path from a leaf to the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    steps: Vec<ProofStep>,
}

impl InclusionProof {
    /// Returns the proof's steps, leaf level first.
    #[must_use]
    pub fn steps(&self) -> &[ProofStep] {
        &self.steps
    }

    /// Returns the number of levels the proof climbs.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.steps.len()
    }

    /// Encodes the proof for transport: per step, one direction byte
    /// (0 = left, 1 = right) followed by the 32-byte sibling.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.steps.len() * STEP_ENCODED_LEN);
        for step in &self.steps {
            bytes.push(match step.side {
                Side::Left => 0,
                Side::Right => 1,
            });
            bytes.extend_from_slice(&step.sibling);
        }
        bytes
    }

    /// Decodes a proof from its transport encoding.
    ///
    /// # Errors
    ///
    /// Returns [`AnchorError::InvalidProof`] if the byte length is not a
    /// multiple of the step size, a direction byte is unknown, or the proof
    /// climbs more than [`MAX_PROOF_DEPTH`] levels. Malformed input never
    /// panics.
    pub fn decode(bytes: &[u8]) -> Result<Self, AnchorError> {
        if bytes.len() % STEP_ENCODED_LEN != 0 {
            return Err(AnchorError::InvalidProof {
                reason: format!(
                    "length {} is not a multiple of the {STEP_ENCODED_LEN}-byte step size",
                    bytes.len()
                ),
            });
        }
        let step_count = bytes.len() / STEP_ENCODED_LEN;
        if step_count > MAX_PROOF_DEPTH {
            return Err(AnchorError::InvalidProof {
                reason: format!("depth {step_count} exceeds maximum of {MAX_PROOF_DEPTH}"),
            });
        }

        let mut steps = Vec::with_capacity(step_count);
        for chunk in bytes.chunks_exact(STEP_ENCODED_LEN) {
            let side = match chunk[0] {
                0 => Side::Left,
                1 => Side::Right,
                other => {
                    return Err(AnchorError::InvalidProof {
                        reason: format!("unknown direction byte {other}"),
                    });
                },
            };
            let mut sibling = [0u8; HASH_SIZE];
            sibling.copy_from_slice(&chunk[1..]);
            steps.push(ProofStep { sibling, side });
        }
        Ok(Self { steps })
    }
}

/// Computes the merkle root of an ordered, non-empty leaf set.
///
/// Returns `None` for zero leaves: a root is undefined there.
#[must_use]
pub fn merkle_root(leaves: &[Hash]) -> Option<Hash> {
    if leaves.is_empty() {
        return None;
    }
    let levels = build_levels(leaves);
    Some(levels[levels.len() - 1][0])
}

/// Builds an inclusion proof for the leaf at `leaf_index`.
///
/// Callers obtain proofs through [`AttestationBatch::prove_inclusion`]
/// (which resolves the leaf to its index); this is the index-addressed core.
///
/// [`AttestationBatch::prove_inclusion`]: super::AttestationBatch::prove_inclusion
#[must_use]
pub(crate) fn prove_at(leaves: &[Hash], leaf_index: usize) -> InclusionProof {
    debug_assert!(leaf_index < leaves.len());

    let levels = build_levels(leaves);
    let mut steps = Vec::new();
    let mut position = leaf_index;

    // The last level is the root; every level below contributes one sibling.
    for level in &levels[..levels.len() - 1] {
        let step = if position % 2 == 0 {
            // Left node: sibling is the right partner, or the node itself
            // when it is the odd trailing node.
            let sibling_index = if position + 1 < level.len() {
                position + 1
            } else {
                position
            };
            ProofStep {
                sibling: level[sibling_index],
                side: Side::Right,
            }
        } else {
            ProofStep {
                sibling: level[position - 1],
                side: Side::Left,
            }
        };
        steps.push(step);
        position /= 2;
    }

    InclusionProof { steps }
}

/// Builds an inclusion proof for `leaf` within `leaves`.
///
/// # Errors
///
/// Returns [`AnchorError::LeafNotFound`] if the leaf is not present. For a
/// duplicated leaf the proof covers its first occurrence.
pub fn prove_inclusion(leaves: &[Hash], leaf: &Hash) -> Result<InclusionProof, AnchorError> {
    let index = leaves
        .iter()
        .position(|l| l == leaf)
        .ok_or_else(|| AnchorError::LeafNotFound {
            leaf: crate::crypto::hex::encode(leaf),
        })?;
    Ok(prove_at(leaves, index))
}

/// Verifies that `leaf` is included under `root` via `proof`.
///
/// Pure function of its arguments: it recomputes the root by folding the
/// leaf with each sibling in order and compares the result. Returns `false`
/// for any mismatch, including proofs deeper than [`MAX_PROOF_DEPTH`].
#[must_use]
pub fn verify_inclusion(root: &Hash, leaf: &Hash, proof: &InclusionProof) -> bool {
    if proof.steps.len() > MAX_PROOF_DEPTH {
        return false;
    }

    let mut acc = *leaf;
    for step in &proof.steps {
        acc = match step.side {
            Side::Left => ActionHasher::hash_pair(&step.sibling, &acc),
            Side::Right => ActionHasher::hash_pair(&acc, &step.sibling),
        };
    }
    acc == *root
}

/// Builds every tree level, leaves first, root (single node) last.
fn build_levels(leaves: &[Hash]) -> Vec<Vec<Hash>> {
    let mut levels = vec![leaves.to_vec()];
    while levels[levels.len() - 1].len() > 1 {
        let current = &levels[levels.len() - 1];
        let mut next = Vec::with_capacity(current.len().div_ceil(2));
        for pair in current.chunks(2) {
            let left = pair[0];
            // Duplicate-last: an odd trailing node pairs with itself.
            let right = if pair.len() == 2 { pair[1] } else { pair[0] };
            next.push(ActionHasher::hash_pair(&left, &right));
        }
        levels.push(next);
    }
    levels
}
