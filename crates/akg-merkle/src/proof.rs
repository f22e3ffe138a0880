//! Merkle inclusion proofs and their export format.
//!
//! A proof carries, per level from leaf to root, where the sibling sits
//! relative to the running hash, and the sibling's hash unless the node was
//! paired with itself. Verification replays exactly the pairing rule used by
//! [`MerkleTree::build`](crate::MerkleTree::build).

use crate::hash::{Hash, HashParseError};
use crate::tree::{hash_internal, hash_leaf, tree_height};
use akg_core::{canonicalize_serializable, EncodingError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where the sibling sits at one level of a proof.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiblingPosition {
    /// Sibling is the left child; running hash is the right child.
    Left,
    /// Sibling is the right child; running hash is the left child.
    Right,
    /// Odd trailing node paired with itself; no sibling hash is carried.
    Duplicate,
}

impl SiblingPosition {
    /// The position the pairing rule dictates for node `index` in a level of
    /// `width` nodes.
    pub fn expected(index: usize, width: usize) -> Self {
        if index % 2 == 1 {
            SiblingPosition::Left
        } else if index + 1 < width {
            SiblingPosition::Right
        } else {
            SiblingPosition::Duplicate
        }
    }
}

/// Proof that one record hash is included under a root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// The record's content hash; the leaf prefix is applied on verification.
    pub leaf_hash: Hash,
    pub leaf_index: usize,
    /// Number of leaves in the tree the proof was cut from.
    pub leaf_count: usize,
    /// Sibling hashes for every non-duplicate level, leaf to root.
    pub sibling_hashes: Vec<Hash>,
    /// One entry per level, leaf to root.
    pub sibling_positions: Vec<SiblingPosition>,
    /// Root of the tree the proof was cut from.
    pub root: Hash,
}

impl MerkleProof {
    /// Replay the proof and compare with `expected_root`.
    ///
    /// Returns `false` instead of failing: a bad proof is an ordinary outcome
    /// for untrusted input. Besides the hash chain, the shape of the proof is
    /// checked against the height and per-level positions implied by
    /// `leaf_index` and `leaf_count`.
    pub fn verify(&self, expected_root: &Hash) -> bool {
        match self.compute_root() {
            Some(root) => root == *expected_root,
            None => false,
        }
    }

    /// Recompute the root, or `None` if the proof is structurally invalid.
    pub fn compute_root(&self) -> Option<Hash> {
        if self.leaf_count == 0 || self.leaf_index >= self.leaf_count {
            return None;
        }
        let levels = self.sibling_positions.len();
        if levels < usize::BITS as usize && self.leaf_count > 1 << levels {
            return None;
        }
        if self.sibling_positions.len() != tree_height(self.leaf_count) {
            return None;
        }
        let carried = self
            .sibling_positions
            .iter()
            .filter(|p| **p != SiblingPosition::Duplicate)
            .count();
        if carried != self.sibling_hashes.len() {
            return None;
        }

        let mut running = hash_leaf(&self.leaf_hash);
        let mut siblings = self.sibling_hashes.iter();
        let mut index = self.leaf_index;
        let mut width = self.leaf_count;

        for position in &self.sibling_positions {
            if *position != SiblingPosition::expected(index, width) {
                return None;
            }
            running = match position {
                SiblingPosition::Left => hash_internal(siblings.next()?, &running),
                SiblingPosition::Right => hash_internal(&running, siblings.next()?),
                SiblingPosition::Duplicate => hash_internal(&running, &running),
            };
            index /= 2;
            width = width.div_ceil(2);
        }

        Some(running)
    }

    /// Convert into the interchange format for external verifiers.
    pub fn to_export(&self) -> MerkleProofExport {
        MerkleProofExport {
            leaf_hash: self.leaf_hash.to_hex(),
            leaf_index: self.leaf_index,
            leaf_count: self.leaf_count,
            proof_hashes: self.sibling_hashes.iter().map(Hash::to_hex).collect(),
            positions: self.sibling_positions.clone(),
            root: self.root.to_hex(),
        }
    }

    /// Parse the interchange format back into a proof.
    pub fn from_export(export: &MerkleProofExport) -> Result<Self, ProofImportError> {
        Ok(MerkleProof {
            leaf_hash: Hash::parse(&export.leaf_hash)?,
            leaf_index: export.leaf_index,
            leaf_count: export.leaf_count,
            sibling_hashes: export
                .proof_hashes
                .iter()
                .map(|h| Hash::parse(h))
                .collect::<Result<Vec<_>, _>>()?,
            sibling_positions: export.positions.clone(),
            root: Hash::parse(&export.root)?,
        })
    }
}

/// Verify `proof` against `expected_root`.
pub fn verify_proof(proof: &MerkleProof, expected_root: &Hash) -> bool {
    proof.verify(expected_root)
}

/// Failure to import an exported proof.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProofImportError {
    #[error("Bad hash in proof: {0}")]
    Hash(#[from] HashParseError),

    #[error("Bad proof JSON: {0}")]
    Json(String),
}

/// JSON interchange form of a [`MerkleProof`]. Hashes are plain hex.
///
/// `leaf_count` extends the five-field proof format. Documents without it
/// still parse, but import with a count of zero and so never verify: the
/// per-level position check needs the tree width.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProofExport {
    pub leaf_hash: String,
    pub leaf_index: usize,
    #[serde(default)]
    pub leaf_count: usize,
    pub proof_hashes: Vec<String>,
    pub positions: Vec<SiblingPosition>,
    pub root: String,
}

impl MerkleProofExport {
    /// Sorted-key, whitespace-free JSON.
    pub fn to_json(&self) -> Result<String, EncodingError> {
        let bytes = canonicalize_serializable(self)?;
        String::from_utf8(bytes).map_err(|e| EncodingError::Unrepresentable(e.to_string()))
    }

    pub fn from_json(s: &str) -> Result<Self, ProofImportError> {
        serde_json::from_str(s).map_err(|e| ProofImportError::Json(e.to_string()))
    }
}
