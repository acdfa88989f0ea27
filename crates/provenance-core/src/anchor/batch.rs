//! Attestation batches: windowed leaf collection with one-way commit.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::merkle::{self, AnchorError, InclusionProof};
use crate::crypto::{Hash, hex};

/// Default ceiling on leaves per batch.
pub const DEFAULT_MAX_BATCH_LEAVES: usize = 4096;

/// A window of off-chain attestations folded into one merkle commitment.
///
/// A batch starts open: leaves accumulate in insertion order. `commit`
/// computes the root and freezes the leaf set permanently; the root and the
/// leaves never change afterwards, and further `add_leaf` calls fail with
/// [`AnchorError::BatchClosed`]. Inclusion proofs are only issued against a
/// committed batch so that every issued proof stays verifiable forever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationBatch {
    /// Start of the covered time window (inclusive, integer seconds).
    window_start: i64,

    /// End of the covered time window (inclusive, integer seconds).
    window_end: i64,

    /// Attestation leaf hashes in insertion order.
    leaves: Vec<Hash>,

    /// The committed root; `None` while the batch is open.
    root: Option<Hash>,

    /// Identifier of the on-ledger commitment transaction, once anchored.
    anchor_reference: Option<String>,

    /// Leaf ceiling for this batch.
    max_leaves: usize,
}

impl AttestationBatch {
    /// Begins an open batch for a time window.
    #[must_use]
    pub fn begin(window_start: i64, window_end: i64) -> Self {
        Self::begin_with_max_leaves(window_start, window_end, DEFAULT_MAX_BATCH_LEAVES)
    }

    /// Begins an open batch with a custom leaf ceiling.
    #[must_use]
    pub fn begin_with_max_leaves(window_start: i64, window_end: i64, max_leaves: usize) -> Self {
        Self {
            window_start,
            window_end,
            leaves: Vec::new(),
            root: None,
            anchor_reference: None,
            max_leaves,
        }
    }

    /// Adds an attestation leaf hash to an open batch.
    ///
    /// # Errors
    ///
    /// - [`AnchorError::BatchClosed`] if the batch was committed.
    /// - [`AnchorError::TooManyLeaves`] at the leaf ceiling.
    pub fn add_leaf(&mut self, leaf: Hash) -> Result<(), AnchorError> {
        if self.root.is_some() {
            return Err(AnchorError::BatchClosed);
        }
        if self.leaves.len() >= self.max_leaves {
            return Err(AnchorError::TooManyLeaves {
                count: self.leaves.len(),
                max: self.max_leaves,
            });
        }
        self.leaves.push(leaf);
        Ok(())
    }

    /// Commits the batch: computes the root and freezes the leaf set.
    ///
    /// This is a one-way, one-time transition.
    ///
    /// # Errors
    ///
    /// - [`AnchorError::EmptyBatch`] for zero leaves (a root is undefined).
    /// - [`AnchorError::BatchClosed`] if already committed.
    pub fn commit(&mut self) -> Result<Hash, AnchorError> {
        if self.root.is_some() {
            return Err(AnchorError::BatchClosed);
        }
        let root = merkle::merkle_root(&self.leaves).ok_or(AnchorError::EmptyBatch)?;
        self.root = Some(root);
        debug!(
            window_start = self.window_start,
            window_end = self.window_end,
            leaves = self.leaves.len(),
            root = %hex::encode(&root),
            "committed batch"
        );
        Ok(root)
    }

    /// Builds an inclusion proof for `leaf` against the committed root.
    ///
    /// For a leaf added more than once the proof covers its first
    /// occurrence.
    ///
    /// # Errors
    ///
    /// - [`AnchorError::BatchOpen`] if the batch was never committed.
    /// - [`AnchorError::LeafNotFound`] if the leaf is not in the batch.
    pub fn prove_inclusion(&self, leaf: &Hash) -> Result<InclusionProof, AnchorError> {
        if self.root.is_none() {
            return Err(AnchorError::BatchOpen);
        }
        merkle::prove_inclusion(&self.leaves, leaf)
    }

    /// Records the on-ledger commitment reference for an anchored batch.
    ///
    /// The reference is bookkeeping attached after anchoring; the leaf set
    /// and root stay frozen.
    pub fn set_anchor_reference(&mut self, reference: impl Into<String>) {
        self.anchor_reference = Some(reference.into());
    }

    /// Start of the covered window.
    #[must_use]
    pub const fn window_start(&self) -> i64 {
        self.window_start
    }

    /// End of the covered window.
    #[must_use]
    pub const fn window_end(&self) -> i64 {
        self.window_end
    }

    /// The leaves in insertion order.
    #[must_use]
    pub fn leaves(&self) -> &[Hash] {
        &self.leaves
    }

    /// The committed root, if any.
    #[must_use]
    pub const fn root(&self) -> Option<&Hash> {
        self.root.as_ref()
    }

    /// True once the batch has been committed.
    #[must_use]
    pub const fn is_committed(&self) -> bool {
        self.root.is_some()
    }

    /// The on-ledger commitment reference, if anchored.
    #[must_use]
    pub fn anchor_reference(&self) -> Option<&str> {
        self.anchor_reference.as_deref()
    }
}
