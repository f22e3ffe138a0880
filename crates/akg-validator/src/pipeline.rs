//! Validator Pipeline - from a batch of mutations to a signed attestation.
//!
//! A batch moves through these stages:
//!
//! ```text
//! Received -> StructurallyValidated -> RuleValidated -> CanonicalizedAndHashed
//!          -> TreeBuilt -> Signed -> Persisted -> Returned
//! ```
//!
//! Validation looks at every record before deciding, so a rejected batch
//! reports all of its problems at once. Nothing reaches the store unless
//! every record passes; the rows and the attestation row then land in one
//! store write.

use crate::attestation::Attestation;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, RecordReport, RecordViolation, Result, ValidationReport};
use crate::mutation::{leaf_document, EdgeEndpoint, Mutation, RecordKind, RecordStatus, ValidatedRecord};
use crate::rules::RuleRegistry;
use akg_core::{canonical_value, now_millis, AttestationId, EdgeId, EncodingError, NodeId};
use akg_merkle::{attestation_message, content_hash, Hash, Keypair, MerkleTree, PublicKey};
use akg_store::{
    canonical_properties, normalize_labels, validate_name, Batch, EdgeDraft, GraphStore,
    NodeDraft, NodeUpdateDraft, StructuralValidationError,
};
use rayon::prelude::*;
use serde_json::{json, Value};
use std::fmt;
use tracing::{debug, info, warn};

/// Where a batch is in the commit sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BatchStage {
    Received,
    StructurallyValidated,
    RuleValidated,
    CanonicalizedAndHashed,
    TreeBuilt,
    Signed,
    Persisted,
    Returned,
}

impl BatchStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStage::Received => "received",
            BatchStage::StructurallyValidated => "structurally_validated",
            BatchStage::RuleValidated => "rule_validated",
            BatchStage::CanonicalizedAndHashed => "canonicalized_and_hashed",
            BatchStage::TreeBuilt => "tree_built",
            BatchStage::Signed => "signed",
            BatchStage::Persisted => "persisted",
            BatchStage::Returned => "returned",
        }
    }
}

impl fmt::Display for BatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store row a checked mutation turns into.
enum Draft {
    Node(NodeDraft),
    Edge(EdgeDraft),
    Update(NodeUpdateDraft),
}

/// A mutation that passed structural checks.
struct Checked {
    draft: Draft,
    /// Record data as it goes into the leaf.
    data: Value,
    /// Canonical properties, always an object.
    properties: Value,
    /// Registry keys to evaluate: labels or the edge type.
    rule_keys: Vec<String>,
}

/// Record the error, if any, and carry on.
fn keep<T>(result: std::result::Result<T, StructuralValidationError>, violations: &mut Vec<RecordViolation>) -> Option<T> {
    result.map_err(|e| violations.push(e.into())).ok()
}

/// Validates, attests and persists mutation batches.
pub struct ValidatorPipeline {
    store: GraphStore,
    registry: RuleRegistry,
    keypair: Keypair,
    config: PipelineConfig,
}

impl ValidatorPipeline {
    pub fn new(store: GraphStore, registry: RuleRegistry, keypair: Keypair, config: PipelineConfig) -> Self {
        Self {
            store,
            registry,
            keypair,
            config,
        }
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    fn advance(&self, stage: BatchStage, records: usize) {
        debug!(stage = %stage, records, "batch stage");
    }

    /// Validate, attest and persist a batch.
    ///
    /// Records become Merkle leaves in submission order. On any failing
    /// record the batch is rejected with a report covering every record and
    /// the store is left untouched.
    pub fn commit(&self, mutations: Vec<Mutation>) -> Result<Attestation> {
        if mutations.is_empty() {
            return Err(PipelineError::EmptyBatch);
        }
        let n = mutations.len();
        self.advance(BatchStage::Received, n);

        // Ids are fixed up front so pending endpoints can point at them.
        let pending: Vec<Option<NodeId>> = mutations
            .iter()
            .map(|m| matches!(m, Mutation::CreateNode { .. }).then(NodeId::new))
            .collect();

        let kinds: Vec<RecordKind> = mutations.iter().map(Mutation::kind).collect();
        let structural: Vec<std::result::Result<Checked, Vec<RecordViolation>>> = mutations
            .into_iter()
            .enumerate()
            .map(|(index, mutation)| self.check_structure(index, mutation, &pending))
            .collect();
        self.advance(BatchStage::StructurallyValidated, n);

        let mut reports = Vec::with_capacity(n);
        let mut accepted = Vec::with_capacity(n);
        for (index, (kind, outcome)) in kinds.into_iter().zip(structural).enumerate() {
            let (checked, violations) = match outcome {
                Ok(checked) => {
                    let violations = self.check_rules(&checked);
                    (Some(checked), violations)
                }
                Err(violations) => (None, violations),
            };
            let status = RecordStatus::from_violations(&violations, |v| {
                v.rule_name().is_some_and(|rule| self.config.is_warning(rule))
            });
            reports.push(RecordReport {
                index,
                kind,
                status,
                violations,
            });
            accepted.extend(checked);
        }
        self.advance(BatchStage::RuleValidated, n);

        let report = ValidationReport { records: reports };
        if report.has_failures() {
            warn!(
                records = n,
                failed = report.failed_count(),
                violations = report.violation_count(),
                "batch rejected"
            );
            return Err(PipelineError::Rejected(report));
        }

        let mut data = Vec::with_capacity(n);
        let mut documents = Vec::with_capacity(n);
        for (checked, record) in accepted.iter().zip(&report.records) {
            let canonical = canonical_value(&checked.data)?;
            documents.push(leaf_document(record.kind, &canonical));
            data.push(canonical);
        }
        let hashes = self.hash_leaves(&documents)?;
        self.advance(BatchStage::CanonicalizedAndHashed, n);

        let tree = MerkleTree::build(&hashes);
        let root = tree.root();
        self.advance(BatchStage::TreeBuilt, n);

        let id = AttestationId::new();
        let timestamp = now_millis();
        let signature = self
            .keypair
            .sign_checked(&attestation_message(&root, &id.to_bytes(), timestamp))?;
        self.advance(BatchStage::Signed, n);

        let records: Vec<ValidatedRecord> = report
            .records
            .into_iter()
            .zip(data)
            .zip(&hashes)
            .map(|((r, data), hash)| ValidatedRecord {
                index: r.index,
                kind: r.kind,
                data,
                hash: *hash,
                status: r.status,
                violations: r.violations,
            })
            .collect();

        let attestation = Attestation {
            id,
            merkle_root: root,
            signature,
            signer_public_key: self.keypair.public_key(),
            schema_version: self.config.schema_version.clone(),
            validator_version: self.config.validator_version.clone(),
            timestamp,
            records,
            merkle_tree: tree,
            external_tx_ref: None,
        };

        let mut batch = Batch::new();
        for checked in accepted {
            match checked.draft {
                Draft::Node(node) => batch.nodes.push(node),
                Draft::Edge(edge) => batch.edges.push(edge),
                Draft::Update(update) => batch.updates.push(update),
            }
        }
        batch.attestation = Some(attestation.to_record());
        self.store.commit_batch(batch)?;
        self.advance(BatchStage::Persisted, n);

        info!(
            attestation = %attestation.id,
            root = %root.short(),
            records = n,
            "batch attested"
        );
        self.advance(BatchStage::Returned, n);
        Ok(attestation)
    }

    fn check_structure(
        &self,
        index: usize,
        mutation: Mutation,
        pending: &[Option<NodeId>],
    ) -> std::result::Result<Checked, Vec<RecordViolation>> {
        let max = self.config.max_label_len;
        let mut violations = Vec::new();

        let checked = match mutation {
            Mutation::CreateNode { labels, properties } => {
                let labels = keep(normalize_labels(&labels, max), &mut violations);
                let props = keep(canonical_properties(&properties), &mut violations);
                let id = pending.get(index).copied().flatten();
                match (labels, props, id) {
                    (Some(labels), Some((properties, _)), Some(id)) => Some(Checked {
                        data: json!({"id": id, "labels": labels, "properties": properties}),
                        draft: Draft::Node(NodeDraft {
                            id,
                            labels: labels.clone(),
                            properties: properties.clone(),
                        }),
                        properties,
                        rule_keys: labels,
                    }),
                    _ => None,
                }
            }
            Mutation::CreateEdge {
                source,
                destination,
                edge_type,
                properties,
            } => {
                let type_ok = keep(validate_name("edge type", &edge_type, max), &mut violations);
                let props = keep(canonical_properties(&properties), &mut violations);
                let source = self.resolve(source, index, pending, &mut violations);
                let destination = self.resolve(destination, index, pending, &mut violations);
                match (type_ok, props, source, destination) {
                    (Some(()), Some((properties, _)), Some(source), Some(destination)) => {
                        let id = EdgeId::new();
                        Some(Checked {
                            data: json!({
                                "id": id,
                                "source": source,
                                "destination": destination,
                                "type": edge_type,
                                "properties": properties,
                            }),
                            draft: Draft::Edge(EdgeDraft {
                                id,
                                source,
                                destination,
                                edge_type: edge_type.clone(),
                                properties: properties.clone(),
                            }),
                            properties,
                            rule_keys: vec![edge_type],
                        })
                    }
                    _ => None,
                }
            }
            Mutation::UpdateNode { id, properties } => {
                let props = keep(canonical_properties(&properties), &mut violations);
                let existing = self.store.get_node(&id);
                if existing.is_none() {
                    violations.push(RecordViolation::UnknownNode(id));
                }
                match (props, existing) {
                    (Some((properties, _)), Some(node)) => Some(Checked {
                        data: json!({"id": id, "properties": properties}),
                        draft: Draft::Update(NodeUpdateDraft {
                            id,
                            properties: properties.clone(),
                        }),
                        properties,
                        rule_keys: node.labels,
                    }),
                    _ => None,
                }
            }
        };

        match checked {
            Some(checked) if violations.is_empty() => Ok(checked),
            _ => Err(violations),
        }
    }

    fn resolve(
        &self,
        endpoint: EdgeEndpoint,
        index: usize,
        pending: &[Option<NodeId>],
        violations: &mut Vec<RecordViolation>,
    ) -> Option<NodeId> {
        match endpoint {
            EdgeEndpoint::Existing(id) => {
                if self.store.contains_node(&id) {
                    Some(id)
                } else {
                    violations.push(RecordViolation::UnknownNode(id));
                    None
                }
            }
            EdgeEndpoint::Pending(target) => match pending.get(target) {
                Some(Some(id)) if target < index => Some(*id),
                _ => {
                    violations.push(RecordViolation::InvalidPendingEndpoint { target });
                    None
                }
            },
        }
    }

    fn check_rules(&self, checked: &Checked) -> Vec<RecordViolation> {
        let Some(properties) = checked.properties.as_object() else {
            return Vec::new();
        };
        checked
            .rule_keys
            .iter()
            .flat_map(|key| self.registry.evaluate(key, properties))
            .map(RecordViolation::Rule)
            .collect()
    }

    /// Hash leaf documents, in parallel for large batches. Output order
    /// always matches input order.
    fn hash_leaves(&self, documents: &[Value]) -> std::result::Result<Vec<Hash>, EncodingError> {
        if documents.len() < self.config.parallel_threshold {
            return documents.iter().map(content_hash).collect();
        }
        debug!(records = documents.len(), "hashing in parallel");
        documents.par_iter().map(content_hash).collect()
    }
}

impl fmt::Debug for ValidatorPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorPipeline")
            .field("signer", &self.keypair.public_key())
            .field("rule_keys", &self.registry.len())
            .field("config", &self.config)
            .finish()
    }
}
