//! Error types for the graph store.

use akg_core::{AttestationId, EdgeId, EncodingError, NodeId};
use thiserror::Error;

/// A label, edge type or property map violates the structural limits.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralValidationError {
    #[error("A node needs at least one label")]
    NoLabels,

    #[error("Empty {what}")]
    EmptyName { what: &'static str },

    #[error("{what} is {len} characters long (max {max})")]
    NameTooLong {
        what: &'static str,
        len: usize,
        max: usize,
    },

    #[error("Properties must be a JSON object, found {found}")]
    PropertiesNotObject { found: &'static str },

    #[error("Properties are not canonicalizable: {0}")]
    Unencodable(#[from] EncodingError),
}

/// Errors that can occur in store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Foreign key violation: edge {edge} references missing node {missing}")]
    ForeignKey { edge: EdgeId, missing: NodeId },

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Attestation not found: {0}")]
    AttestationNotFound(AttestationId),

    #[error("Attestation {id} is already anchored to {existing}")]
    AlreadyAnchored { id: AttestationId, existing: String },

    #[error("Identifier already in use: {0}")]
    DuplicateId(String),

    #[error("Structural validation failed: {0}")]
    Structural(#[from] StructuralValidationError),

    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Journal I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt journal at line {line}: {reason}")]
    CorruptJournal { line: usize, reason: String },

    #[error("Journal could not be rolled back after a failed append; reopen the store")]
    JournalPoisoned,
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Encoding(EncodingError::Unrepresentable(err.to_string()))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
