//! Graph mutations and the records they become.

use crate::error::RecordViolation;
use akg_core::NodeId;
use akg_merkle::Hash;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One end of an edge being created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeEndpoint {
    /// A node already in the store.
    Existing(NodeId),
    /// The node made by the `CreateNode` at this index of the same batch.
    Pending(usize),
}

impl From<NodeId> for EdgeEndpoint {
    fn from(id: NodeId) -> Self {
        EdgeEndpoint::Existing(id)
    }
}

/// A requested change to the graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    CreateNode {
        labels: Vec<String>,
        properties: Value,
    },
    CreateEdge {
        source: EdgeEndpoint,
        destination: EdgeEndpoint,
        edge_type: String,
        properties: Value,
    },
    UpdateNode {
        id: NodeId,
        properties: Value,
    },
}

impl Mutation {
    pub fn create_node<I, S>(labels: I, properties: Value) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Mutation::CreateNode {
            labels: labels.into_iter().map(Into::into).collect(),
            properties,
        }
    }

    pub fn create_edge(
        source: impl Into<EdgeEndpoint>,
        destination: impl Into<EdgeEndpoint>,
        edge_type: impl Into<String>,
        properties: Value,
    ) -> Self {
        Mutation::CreateEdge {
            source: source.into(),
            destination: destination.into(),
            edge_type: edge_type.into(),
            properties,
        }
    }

    pub fn update_node(id: NodeId, properties: Value) -> Self {
        Mutation::UpdateNode { id, properties }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Mutation::CreateNode { .. } => RecordKind::Node,
            Mutation::CreateEdge { .. } => RecordKind::Edge,
            Mutation::UpdateNode { .. } => RecordKind::NodeUpdate,
        }
    }

    pub fn properties(&self) -> &Value {
        match self {
            Mutation::CreateNode { properties, .. }
            | Mutation::CreateEdge { properties, .. }
            | Mutation::UpdateNode { properties, .. } => properties,
        }
    }
}

/// What a record describes. Its text form is part of the hashed leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    #[serde(rename = "node")]
    Node,
    #[serde(rename = "edge")]
    Edge,
    #[serde(rename = "node-update")]
    NodeUpdate,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Node => "node",
            RecordKind::Edge => "edge",
            RecordKind::NodeUpdate => "node-update",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Passed,
    Failed,
    Warning,
}

impl RecordStatus {
    /// Status implied by a record's violations.
    pub(crate) fn from_violations(violations: &[RecordViolation], is_warning: impl Fn(&RecordViolation) -> bool) -> Self {
        if violations.iter().any(|v| !is_warning(v)) {
            RecordStatus::Failed
        } else if violations.is_empty() {
            RecordStatus::Passed
        } else {
            RecordStatus::Warning
        }
    }
}

/// A mutation that made it into an attestation: one Merkle leaf.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedRecord {
    pub index: usize,
    pub kind: RecordKind,
    /// Canonical record data.
    pub data: Value,
    /// Leaf content hash.
    pub hash: Hash,
    /// `Passed` or `Warning`.
    pub status: RecordStatus,
    /// Warnings only; failing records never reach an attestation.
    pub violations: Vec<RecordViolation>,
}

impl ValidatedRecord {
    /// The document whose canonical encoding is hashed into the leaf.
    pub fn leaf_document(&self) -> Value {
        leaf_document(self.kind, &self.data)
    }
}

pub(crate) fn leaf_document(kind: RecordKind, data: &Value) -> Value {
    let mut doc = serde_json::Map::new();
    doc.insert("kind".to_string(), Value::String(kind.as_str().to_string()));
    doc.insert("data".to_string(), data.clone());
    Value::Object(doc)
}
