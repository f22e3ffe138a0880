//! # akg-validator
//!
//! Validator pipeline for the AKG (Attested Knowledge Graph).
//!
//! This crate provides:
//! - Graph mutations and their per-record validation results
//! - A registry of pure domain rules keyed by label or edge type
//! - The pipeline that validates, hashes, Merkle-izes, signs and persists a batch
//! - Attestations with inclusion proofs and a sorted-key JSON export
//! - A sink seam for anchoring attestations on an external ledger
//!
//! ## Example
//!
//! ```rust
//! use akg_validator::{Mutation, PipelineConfig, RuleRegistry, RuleSet, ValidatorPipeline};
//! use akg_merkle::Keypair;
//! use akg_store::GraphStore;
//! use serde_json::json;
//!
//! let registry = RuleRegistry::from_providers([
//!     RuleSet::new("Protein").rule("has_sequence", "sequence is required", |p| {
//!         p.get("sequence").and_then(|s| s.as_str()).is_some()
//!     }),
//! ]);
//! let pipeline = ValidatorPipeline::new(
//!     GraphStore::in_memory(),
//!     registry,
//!     Keypair::generate(),
//!     PipelineConfig::default(),
//! );
//!
//! let attestation = pipeline
//!     .commit(vec![Mutation::create_node(["Protein"], json!({"sequence": "ACDEFG"}))])
//!     .unwrap();
//! assert!(attestation.verify());
//! assert!(attestation.proof_for(0).unwrap().verify(&attestation.merkle_root));
//! ```

pub mod attestation;
pub mod config;
pub mod error;
pub mod mutation;
pub mod pipeline;
pub mod rules;
pub mod sink;

pub use attestation::{Attestation, AttestationExport};
pub use config::{PipelineConfig, PipelineConfigBuilder, DEFAULT_VALIDATOR_VERSION};
pub use error::{PipelineError, RecordReport, RecordViolation, Result, ValidationReport};
pub use mutation::{EdgeEndpoint, Mutation, RecordKind, RecordStatus, ValidatedRecord};
pub use pipeline::{BatchStage, ValidatorPipeline};
pub use rules::{DomainRule, RuleOutcome, RulePredicate, RuleProvider, RuleRegistry, RuleSet, RuleViolation};
pub use sink::{AttestationSink, MemorySink, SinkError, SinkHandoff};
