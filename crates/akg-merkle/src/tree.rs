//! Binary Merkle tree over the records of one batch.
//!
//! Leaves and internal nodes are hashed under different prefixes so that a
//! leaf can never be passed off as an internal node:
//!
//! ```text
//! leaf     = H(0x00 || record_hash)
//! internal = H(0x01 || left || right)
//! ```
//!
//! Levels are paired left to right. When a level has an odd width, its last
//! node is paired with itself rather than promoted unchanged.

use crate::hash::{Hash, Hasher};
use crate::proof::{MerkleProof, SiblingPosition};
use serde::{Deserialize, Serialize};

/// Domain prefix for leaf hashes.
pub const LEAF_PREFIX: u8 = 0x00;

/// Domain prefix for internal node hashes.
pub const NODE_PREFIX: u8 = 0x01;

/// Hash a record hash into a leaf.
pub fn hash_leaf(record_hash: &Hash) -> Hash {
    Hasher::hash_all(&[&[LEAF_PREFIX], record_hash.as_bytes()])
}

/// Hash two children into their parent.
pub fn hash_internal(left: &Hash, right: &Hash) -> Hash {
    Hasher::hash_all(&[&[NODE_PREFIX], left.as_bytes(), right.as_bytes()])
}

/// Number of levels above the leaves for a tree of `leaf_count` leaves.
pub fn tree_height(leaf_count: usize) -> usize {
    let mut width = leaf_count;
    let mut height = 0;
    while width > 1 {
        width = width.div_ceil(2);
        height += 1;
    }
    height
}

/// A fully materialized Merkle tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleTree {
    /// Record hashes in leaf order, before the leaf prefix is applied.
    records: Vec<Hash>,
    /// `levels[0]` holds the prefixed leaves, the last level holds the root.
    /// Empty for an empty tree.
    levels: Vec<Vec<Hash>>,
}

impl MerkleTree {
    /// Build a tree over record hashes, in the given order.
    pub fn build(record_hashes: &[Hash]) -> Self {
        if record_hashes.is_empty() {
            return MerkleTree {
                records: Vec::new(),
                levels: Vec::new(),
            };
        }

        let mut levels = Vec::with_capacity(tree_height(record_hashes.len()) + 1);
        levels.push(record_hashes.iter().map(hash_leaf).collect::<Vec<_>>());

        while levels[levels.len() - 1].len() > 1 {
            let current = &levels[levels.len() - 1];
            let next = current
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => hash_internal(left, right),
                    [last] => hash_internal(last, last),
                    _ => unreachable!("chunks(2) yields one or two items"),
                })
                .collect();
            levels.push(next);
        }

        MerkleTree {
            records: record_hashes.to_vec(),
            levels,
        }
    }

    /// The root; `Hash::zero()` for an empty tree.
    pub fn root(&self) -> Hash {
        self.levels
            .last()
            .and_then(|top| top.first())
            .copied()
            .unwrap_or_else(Hash::zero)
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn leaf_count(&self) -> usize {
        self.levels.first().map(Vec::len).unwrap_or(0)
    }

    /// Levels above the leaves.
    pub fn height(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    /// All levels, leaves first.
    pub fn levels(&self) -> &[Vec<Hash>] {
        &self.levels
    }

    /// Record hashes in leaf order.
    pub fn records(&self) -> &[Hash] {
        &self.records
    }

    /// The prefixed leaf hash at `index`.
    pub fn leaf(&self, index: usize) -> Option<Hash> {
        self.levels.first().and_then(|l| l.get(index)).copied()
    }

    /// Inclusion proof for the leaf at `index`, read straight off the built
    /// levels. `None` when the index is out of range.
    pub fn generate_proof(&self, index: usize) -> Option<MerkleProof> {
        let record_hash = *self.records.get(index)?;

        let mut sibling_hashes = Vec::with_capacity(self.height());
        let mut sibling_positions = Vec::with_capacity(self.height());
        let mut idx = index;

        for level in &self.levels[..self.height()] {
            if idx % 2 == 1 {
                sibling_positions.push(SiblingPosition::Left);
                sibling_hashes.push(level[idx - 1]);
            } else if idx + 1 < level.len() {
                sibling_positions.push(SiblingPosition::Right);
                sibling_hashes.push(level[idx + 1]);
            } else {
                sibling_positions.push(SiblingPosition::Duplicate);
            }
            idx /= 2;
        }

        Some(MerkleProof {
            leaf_hash: record_hash,
            leaf_index: index,
            leaf_count: self.leaf_count(),
            sibling_hashes,
            sibling_positions,
            root: self.root(),
        })
    }

    /// Check that `record_hash` sits at `index` under this tree's root.
    pub fn verify_leaf(&self, index: usize, record_hash: Hash) -> bool {
        match self.generate_proof(index) {
            Some(proof) => proof.leaf_hash == record_hash && proof.verify(&self.root()),
            None => false,
        }
    }
}
