//! Signed attestations and their export format.

use crate::mutation::ValidatedRecord;
use akg_core::{canonicalize_serializable, AttestationId, EncodingError};
use akg_merkle::{
    attestation_message, Hash, MerkleProof, MerkleTree, PublicKey, Signature,
};
use akg_store::AttestationRecord;
use serde::{Deserialize, Serialize};

/// A committed batch: signed root, full tree and the records behind it.
#[derive(Clone, Debug)]
pub struct Attestation {
    pub id: AttestationId,
    pub merkle_root: Hash,
    pub signature: Signature,
    pub signer_public_key: PublicKey,
    pub schema_version: String,
    pub validator_version: String,
    pub timestamp: u64,
    /// Records in leaf order.
    pub records: Vec<ValidatedRecord>,
    pub merkle_tree: MerkleTree,
    pub external_tx_ref: Option<String>,
}

impl Attestation {
    pub fn signed_message(&self) -> Vec<u8> {
        attestation_message(&self.merkle_root, &self.id.to_bytes(), self.timestamp)
    }

    pub fn verify_signature(&self) -> bool {
        self.signer_public_key
            .verify(&self.signed_message(), &self.signature)
    }

    /// Signature holds, and the records rebuild both the tree and the root.
    pub fn verify(&self) -> bool {
        if !self.verify_signature() {
            return false;
        }
        let hashes = self.record_hashes();
        hashes == self.merkle_tree.records()
            && MerkleTree::build(&hashes).root() == self.merkle_root
            && self.merkle_tree.root() == self.merkle_root
    }

    pub fn record_hashes(&self) -> Vec<Hash> {
        self.records.iter().map(|r| r.hash).collect()
    }

    /// Inclusion proof for the record at `index`.
    pub fn proof_for(&self, index: usize) -> Option<MerkleProof> {
        self.merkle_tree.generate_proof(index)
    }

    pub fn export(&self) -> AttestationExport {
        AttestationExport::from_record(&self.to_record())
    }

    /// The export as canonical JSON.
    pub fn export_json(&self) -> Result<String, EncodingError> {
        self.export().to_json()
    }

    /// The row the store keeps for this attestation.
    pub fn to_record(&self) -> AttestationRecord {
        AttestationRecord {
            id: self.id,
            merkle_root: self.merkle_root,
            signature: self.signature,
            signer_public_key: self.signer_public_key,
            schema_version: self.schema_version.clone(),
            validator_version: self.validator_version.clone(),
            timestamp: self.timestamp,
            record_hashes: self.record_hashes(),
            external_tx_ref: self.external_tx_ref.clone(),
        }
    }
}

/// What an external verifier receives.
///
/// Keys serialize in sorted order through the canonical encoder; hashes and
/// keys are algorithm-tagged hex strings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationExport {
    pub attestation_id: String,
    pub merkle_root: String,
    pub schema_version: String,
    pub validator_version: String,
    pub signer_pk: String,
    pub signature: String,
    pub timestamp: u64,
}

impl AttestationExport {
    pub fn from_record(record: &AttestationRecord) -> Self {
        Self {
            attestation_id: record.id.to_string(),
            merkle_root: record.merkle_root.to_tagged(),
            schema_version: record.schema_version.clone(),
            validator_version: record.validator_version.clone(),
            signer_pk: record.signer_public_key.to_tagged(),
            signature: record.signature.to_tagged(),
            timestamp: record.timestamp,
        }
    }

    pub fn to_json(&self) -> Result<String, EncodingError> {
        let bytes = canonicalize_serializable(self)?;
        String::from_utf8(bytes).map_err(|e| EncodingError::Unrepresentable(e.to_string()))
    }

    pub fn from_json(s: &str) -> Result<Self, EncodingError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn root(&self) -> Option<Hash> {
        Hash::parse(&self.merkle_root).ok()
    }

    /// Check the signature using only the exported fields. Any field that
    /// fails to parse makes the export invalid.
    pub fn verify(&self) -> bool {
        let (Ok(id), Ok(root), Ok(pk), Ok(sig)) = (
            AttestationId::parse(&self.attestation_id),
            Hash::parse(&self.merkle_root),
            PublicKey::parse(&self.signer_pk),
            Signature::parse(&self.signature),
        ) else {
            return false;
        };
        pk.verify(&attestation_message(&root, &id.to_bytes(), self.timestamp), &sig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::{RecordKind, RecordStatus};
    use akg_core::now_millis;
    use akg_merkle::{content_hash, Keypair};
    use serde_json::json;

    fn attestation(n: usize) -> Attestation {
        let records: Vec<ValidatedRecord> = (0..n)
            .map(|i| {
                let data = json!({"i": i});
                ValidatedRecord {
                    index: i,
                    kind: RecordKind::Node,
                    hash: content_hash(&json!({"kind": "node", "data": data})).unwrap(),
                    data,
                    status: RecordStatus::Passed,
                    violations: vec![],
                }
            })
            .collect();
        let hashes: Vec<_> = records.iter().map(|r| r.hash).collect();
        let tree = MerkleTree::build(&hashes);
        let keypair = Keypair::generate();
        let id = AttestationId::new();
        let timestamp = now_millis();
        Attestation {
            id,
            merkle_root: tree.root(),
            signature: keypair.sign(&attestation_message(&tree.root(), &id.to_bytes(), timestamp)),
            signer_public_key: keypair.public_key(),
            schema_version: "s".into(),
            validator_version: "v".into(),
            timestamp,
            records,
            merkle_tree: tree,
            external_tx_ref: None,
        }
    }

    #[test]
    fn test_verify() {
        let att = attestation(3);
        assert!(att.verify());
        assert_eq!(att.records[1].leaf_document(), json!({"kind": "node", "data": {"i": 1}}));

        let mut tampered = att.clone();
        tampered.records[1].hash = tampered.records[1].hash.with_bit_flipped(0);
        assert!(tampered.verify_signature());
        assert!(!tampered.verify());

        let mut late = att;
        late.timestamp += 1;
        assert!(!late.verify_signature());
    }

    #[test]
    fn test_proof_for() {
        let att = attestation(5);
        for i in 0..5 {
            let proof = att.proof_for(i).unwrap();
            assert_eq!(proof.leaf_hash, att.records[i].hash);
            assert!(proof.verify(&att.merkle_root));
        }
        assert!(att.proof_for(5).is_none());
    }

    #[test]
    fn test_export_json_sorted_and_verifiable() {
        let att = attestation(2);
        let json = att.export_json().unwrap();

        let keys = [
            "attestation_id",
            "merkle_root",
            "schema_version",
            "signature",
            "signer_pk",
            "timestamp",
            "validator_version",
        ];
        let positions: Vec<usize> = keys.iter().map(|k| json.find(&format!("\"{k}\"")).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(json.contains("\"b3:"));
        assert!(json.contains("\"ed25519:"));

        let export = AttestationExport::from_json(&json).unwrap();
        assert!(export.verify());
        assert_eq!(export.root(), Some(att.merkle_root));

        let mut forged = export;
        forged.schema_version = "other".into();
        // Versions are metadata; the signature covers root, id and time.
        assert!(forged.verify());
        forged.timestamp += 1;
        assert!(!forged.verify());
    }

    #[test]
    fn test_export_rejects_garbage() {
        let mut export = attestation(1).export();
        export.signer_pk = "rsa:00".into();
        assert!(!export.verify());
    }
}
