//! # akg-merkle
//!
//! Tamper-evidence primitives for the AKG (Attested Knowledge Graph).
//!
//! This crate provides:
//! - BLAKE3 content hashing, keyed hashing and key derivation
//! - Ed25519 key pairs and domain-separated attestation messages
//! - A binary Merkle tree with prefixed leaf / internal hashing
//! - Inclusion proofs with structural checks and a JSON export format
//!
//! ## Example
//!
//! ```rust
//! use akg_merkle::{Hasher, Keypair, MerkleTree, attestation_message};
//!
//! let records: Vec<_> = [b"a", b"b", b"c"].iter().map(|r| Hasher::hash(*r)).collect();
//! let tree = MerkleTree::build(&records);
//!
//! // Prove and verify inclusion of the third record.
//! let proof = tree.generate_proof(2).unwrap();
//! assert!(proof.verify(&tree.root()));
//!
//! // Sign the root.
//! let keypair = Keypair::generate();
//! let msg = attestation_message(&tree.root(), &[0u8; 16], 1_700_000_000_000);
//! let sig = keypair.sign(&msg);
//! assert!(keypair.public_key().verify(&msg, &sig));
//! ```

mod hash;
mod proof;
mod signer;
mod tree;

pub use hash::{content_hash, Hash, HashParseError, Hasher, HASH_TAG};
pub use proof::{verify_proof, MerkleProof, MerkleProofExport, ProofImportError, SiblingPosition};
pub use signer::{
    attestation_message, Keypair, PublicKey, Signature, SignatureError, ATTESTATION_DOMAIN_TAG,
    SIGNATURE_TAG,
};
pub use tree::{hash_internal, hash_leaf, tree_height, MerkleTree, LEAF_PREFIX, NODE_PREFIX};
