//! Integration tests for the tamper-evidence layer.
//!
//! Tests cover:
//! - Inclusion proofs verify for every leaf of arbitrary trees
//! - Any single-bit flip in a proof is detected
//! - Signatures bind to the exact message
//! - Signed roots survive a full export / import cycle
//! - Imported proofs with a forged leaf count are rejected, not panicked on

use akg_merkle::{
    attestation_message, content_hash, hash_internal, hash_leaf, Hash, Hasher, Keypair,
    MerkleProof, MerkleProofExport, MerkleTree, PublicKey, Signature, SiblingPosition,
};
use proptest::prelude::*;
use serde_json::json;

fn leaves_strategy() -> impl Strategy<Value = Vec<Hash>> {
    prop::collection::vec(any::<[u8; 32]>().prop_map(Hash::from_bytes), 1..40)
}

proptest! {
    #[test]
    fn every_proof_round_trips(leaves in leaves_strategy()) {
        let tree = MerkleTree::build(&leaves);
        for i in 0..leaves.len() {
            let proof = tree.generate_proof(i).unwrap();
            prop_assert_eq!(proof.leaf_hash, leaves[i]);
            prop_assert!(proof.verify(&tree.root()));
        }
        prop_assert!(tree.generate_proof(leaves.len()).is_none());
    }

    #[test]
    fn flipped_leaf_bit_fails(leaves in leaves_strategy(), pick in any::<prop::sample::Index>(), bit in 0usize..256) {
        let tree = MerkleTree::build(&leaves);
        let mut proof = tree.generate_proof(pick.index(leaves.len())).unwrap();
        proof.leaf_hash = proof.leaf_hash.with_bit_flipped(bit);
        prop_assert!(!proof.verify(&tree.root()));
    }

    #[test]
    fn flipped_sibling_bit_fails(
        leaves in prop::collection::vec(any::<[u8; 32]>().prop_map(Hash::from_bytes), 2..40),
        pick in any::<prop::sample::Index>(),
        sibling in any::<prop::sample::Index>(),
        bit in 0usize..256,
    ) {
        let tree = MerkleTree::build(&leaves);
        let mut proof = tree.generate_proof(pick.index(leaves.len())).unwrap();
        prop_assume!(!proof.sibling_hashes.is_empty());
        let s = sibling.index(proof.sibling_hashes.len());
        proof.sibling_hashes[s] = proof.sibling_hashes[s].with_bit_flipped(bit);
        prop_assert!(!proof.verify(&tree.root()));
    }

    #[test]
    fn signature_binds_message(msg in prop::collection::vec(any::<u8>(), 0..128), other in prop::collection::vec(any::<u8>(), 0..128)) {
        let kp = Keypair::generate();
        let sig = kp.sign(&msg);
        prop_assert!(kp.public_key().verify(&msg, &sig));
        if other != msg {
            prop_assert!(!kp.public_key().verify(&other, &sig));
        }
    }
}

#[test]
fn test_three_leaf_proof_for_last_record() {
    let a = content_hash(&json!({"n": "a"})).unwrap();
    let b = content_hash(&json!({"n": "b"})).unwrap();
    let c = content_hash(&json!({"n": "c"})).unwrap();
    let tree = MerkleTree::build(&[a, b, c]);

    let proof = tree.generate_proof(2).unwrap();
    assert_eq!(proof.sibling_positions[0], SiblingPosition::Duplicate);

    // Replaying by hand gives the same root build produced.
    let cc = hash_internal(&hash_leaf(&c), &hash_leaf(&c));
    assert_eq!(tree.levels()[1][1], cc);
    let ab = hash_internal(&hash_leaf(&a), &hash_leaf(&b));
    assert_eq!(hash_internal(&ab, &cc), tree.root());
    assert!(proof.verify(&tree.root()));
}

#[test]
fn test_signed_root_external_verification() {
    let records: Vec<Hash> = (0..5u8).map(|i| Hasher::hash(&[i])).collect();
    let tree = MerkleTree::build(&records);
    let kp = Keypair::generate();
    let id = [3u8; 16];
    let ts = 1_717_171_717_000u64;
    let sig = kp.sign(&attestation_message(&tree.root(), &id, ts));

    // Everything an external verifier receives travels as text.
    let pk_text = kp.public_key().to_tagged();
    let sig_text = sig.to_tagged();
    let proof_text = tree.generate_proof(4).unwrap().to_export().to_json().unwrap();

    let pk = PublicKey::parse(&pk_text).unwrap();
    let sig = Signature::parse(&sig_text).unwrap();
    let proof = MerkleProof::from_export(&MerkleProofExport::from_json(&proof_text).unwrap()).unwrap();

    assert!(pk.verify(&attestation_message(&proof.root, &id, ts), &sig));
    assert!(proof.verify(&proof.root));
    assert_eq!(proof.leaf_hash, records[4]);

    // Same signature, different timestamp: rejected.
    assert!(!pk.verify(&attestation_message(&proof.root, &id, ts + 1), &sig));
}

#[test]
fn test_imported_proof_with_forged_leaf_count() {
    let records: Vec<Hash> = (0..2u8).map(|i| Hasher::hash(&[i])).collect();
    let tree = MerkleTree::build(&records);

    let mut export = tree.generate_proof(1).unwrap().to_export();
    export.leaf_count = usize::MAX;
    let text = export.to_json().unwrap();

    let proof = MerkleProof::from_export(&MerkleProofExport::from_json(&text).unwrap()).unwrap();
    assert_eq!(proof.leaf_count, usize::MAX);
    assert_eq!(proof.compute_root(), None);
    assert!(!proof.verify(&tree.root()));
}
