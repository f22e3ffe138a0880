//! # akg-store
//!
//! Append-only graph storage for the AKG (Attested Knowledge Graph).
//!
//! This crate provides:
//! - Nodes with labels and canonical property maps
//! - Typed, directed edges with foreign-key enforcement
//! - Attestation rows committed atomically with the batch they cover
//! - A JSON-lines journal replayed on open
//!
//! ## Example
//!
//! ```rust
//! use akg_store::GraphStore;
//! use serde_json::json;
//!
//! let store = GraphStore::in_memory();
//! let a = store.insert_node(vec!["Protein".into()], json!({"sequence": "MKV"})).unwrap();
//! let b = store.insert_node(vec!["Protein".into()], json!({"sequence": "GAV"})).unwrap();
//! store.insert_edge(a, b, "INTERACTS_WITH", json!({"score": 0.9})).unwrap();
//!
//! assert_eq!(store.query_by_label("Protein", 10).len(), 2);
//! assert_eq!(store.edges_from(&a).len(), 1);
//! ```

pub mod error;
pub mod journal;
pub mod model;
pub mod store;

pub use error::{Result, StoreError, StructuralValidationError};
pub use journal::{Journal, JournalEntry, NodeUpdateRow};
pub use model::{
    canonical_properties, normalize_labels, validate_name, AttestationRecord, Batch, Edge,
    EdgeDraft, Node, NodeDraft, NodeSummary, NodeUpdateDraft, StoreStatistics, MAX_NAME_LEN,
};
pub use store::{GraphStore, StoreConfig, StoreConfigBuilder, DEFAULT_SCHEMA_VERSION};
