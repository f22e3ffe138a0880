//! # akg-core
//!
//! Foundation types for the AKG (Attested Knowledge Graph).
//!
//! This crate provides:
//! - Time-sortable 128-bit identifiers for nodes, edges and attestations
//! - The canonical JSON encoder every content hash is computed over
//!
//! ## Example
//!
//! ```rust
//! use akg_core::{canonicalize, NodeId};
//! use serde_json::json;
//!
//! let a = canonicalize(&json!({"b": 1, "a": [true, null]})).unwrap();
//! let b = canonicalize(&json!({"a": [true, null], "b": 1.0})).unwrap();
//! assert_eq!(a, b);
//! assert_eq!(a, br#"{"a":[true,null],"b":1}"#.to_vec());
//!
//! let first = NodeId::new();
//! let second = NodeId::new();
//! assert!(first < second);
//! ```

pub mod canonical;
pub mod error;
pub mod id;

pub use canonical::{canonical_value, canonicalize, canonicalize_serializable};
pub use error::EncodingError;
pub use id::{AttestationId, EdgeId, Ident, IdentParseError, NodeId};

/// Milliseconds since the Unix epoch according to the wall clock.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
