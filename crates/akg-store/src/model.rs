//! Rows held by the graph store.

use crate::error::StructuralValidationError;
use akg_core::{canonical_value, AttestationId, EdgeId, NodeId};
use akg_merkle::{attestation_message, content_hash, Hash, MerkleTree, PublicKey, Signature};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Upper bound on label and edge type length, in characters.
pub const MAX_NAME_LEN: usize = 128;

/// Check a label or edge type against the length limits.
pub fn validate_name(what: &'static str, name: &str, max: usize) -> Result<(), StructuralValidationError> {
    let len = name.chars().count();
    if len == 0 {
        return Err(StructuralValidationError::EmptyName { what });
    }
    if len > max {
        return Err(StructuralValidationError::NameTooLong { what, len, max });
    }
    Ok(())
}

/// Validate and de-duplicate labels, keeping first-occurrence order.
pub fn normalize_labels(labels: &[String], max: usize) -> Result<Vec<String>, StructuralValidationError> {
    if labels.is_empty() {
        return Err(StructuralValidationError::NoLabels);
    }
    let mut out: Vec<String> = Vec::with_capacity(labels.len());
    for label in labels {
        validate_name("label", label, max)?;
        if !out.contains(label) {
            out.push(label.clone());
        }
    }
    Ok(out)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Bring a property map into canonical form and hash it.
///
/// Returns the canonical object together with the hash of its canonical
/// encoding.
pub fn canonical_properties(properties: &Value) -> Result<(Value, Hash), StructuralValidationError> {
    if !properties.is_object() {
        return Err(StructuralValidationError::PropertiesNotObject {
            found: kind_of(properties),
        });
    }
    let canonical = canonical_value(properties)?;
    let hash = content_hash(&canonical)?;
    Ok((canonical, hash))
}

/// A graph node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub labels: Vec<String>,
    /// Canonical JSON object.
    pub properties: Value,
    /// Hash of the canonical encoding of `properties`.
    pub content_hash: Hash,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Node {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn property_map(&self) -> Option<&Map<String, Value>> {
        self.properties.as_object()
    }

    pub fn summary(&self) -> NodeSummary {
        NodeSummary {
            id: self.id,
            labels: self.labels.clone(),
            content_hash: self.content_hash,
            updated_at: self.updated_at,
        }
    }
}

/// A directed, typed edge between two nodes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub destination: NodeId,
    pub edge_type: String,
    pub properties: Value,
    pub content_hash: Hash,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Lightweight view returned by label queries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub id: NodeId,
    pub labels: Vec<String>,
    pub content_hash: Hash,
    pub updated_at: u64,
}

/// The persisted part of an attestation: the root, not the tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationRecord {
    pub id: AttestationId,
    pub merkle_root: Hash,
    pub signature: Signature,
    pub signer_public_key: PublicKey,
    pub schema_version: String,
    pub validator_version: String,
    pub timestamp: u64,
    /// Record hashes in leaf order.
    pub record_hashes: Vec<Hash>,
    pub external_tx_ref: Option<String>,
}

impl AttestationRecord {
    /// The message the signature covers.
    pub fn signed_message(&self) -> Vec<u8> {
        attestation_message(&self.merkle_root, &self.id.to_bytes(), self.timestamp)
    }

    pub fn verify_signature(&self) -> bool {
        self.signer_public_key
            .verify(&self.signed_message(), &self.signature)
    }

    /// Signature holds and the stored record hashes rebuild the stored root.
    pub fn verify(&self) -> bool {
        self.verify_signature() && MerkleTree::build(&self.record_hashes).root() == self.merkle_root
    }
}

/// Store-wide counters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStatistics {
    pub node_count: usize,
    pub edge_count: usize,
    pub attestation_count: usize,
    pub schema_version: String,
}

/// A node to be created inside a batch commit.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeDraft {
    pub id: NodeId,
    pub labels: Vec<String>,
    pub properties: Value,
}

/// An edge to be created inside a batch commit.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeDraft {
    pub id: EdgeId,
    pub source: NodeId,
    pub destination: NodeId,
    pub edge_type: String,
    pub properties: Value,
}

/// A property replacement for an existing node.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeUpdateDraft {
    pub id: NodeId,
    pub properties: Value,
}

/// Everything one attested batch writes, applied atomically.
#[derive(Clone, Debug, Default)]
pub struct Batch {
    pub nodes: Vec<NodeDraft>,
    pub edges: Vec<EdgeDraft>,
    pub updates: Vec<NodeUpdateDraft>,
    pub attestation: Option<AttestationRecord>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
            && self.edges.is_empty()
            && self.updates.is_empty()
            && self.attestation.is_none()
    }
}
