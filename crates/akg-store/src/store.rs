//! Graph Store - durable home of nodes, edges and attestations.
//!
//! Provides:
//! - Node and edge inserts with foreign-key discipline
//! - Atomic batch commits carrying one attestation row
//! - Label, id and adjacency lookups
//! - Late anchoring of attestations to an external ledger reference
//!
//! The store is append-only: rows are never removed, nodes only ever gain a
//! new property set and `updated_at`.
//!
//! Writers are serialized by a single writer lock held for the whole write
//! call; readers only ever observe fully applied commits.

use crate::error::{Result, StoreError};
use crate::journal::{Journal, JournalEntry, NodeUpdateRow};
use crate::model::{
    canonical_properties, normalize_labels, validate_name, AttestationRecord, Batch, Edge,
    EdgeDraft, Node, NodeDraft, NodeSummary, NodeUpdateDraft, StoreStatistics, MAX_NAME_LEN,
};
use akg_core::{now_millis, AttestationId, EdgeId, NodeId};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Schema version reported when none is configured.
pub const DEFAULT_SCHEMA_VERSION: &str = "akg-schema/1";

/// Configuration for a graph store.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Journal file. `None` keeps everything in memory.
    pub path: Option<PathBuf>,
    /// Schema version reported by [`GraphStore::statistics`].
    pub schema_version: String,
    /// `fsync` every journal append.
    pub sync_writes: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
            sync_writes: true,
        }
    }
}

/// Builder for store configuration.
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: StoreConfig::default(),
        }
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = Some(path.into());
        self
    }

    pub fn schema_version(mut self, version: impl Into<String>) -> Self {
        self.config.schema_version = version.into();
        self
    }

    pub fn sync_writes(mut self, enabled: bool) -> Self {
        self.config.sync_writes = enabled;
        self
    }

    pub fn build(self) -> StoreConfig {
        self.config
    }
}

impl Default for StoreConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory tables and indexes.
#[derive(Debug, Default)]
struct StoreState {
    nodes: BTreeMap<NodeId, Node>,
    edges: BTreeMap<EdgeId, Edge>,
    attestations: BTreeMap<AttestationId, AttestationRecord>,
    /// label -> nodes carrying it, in id (creation) order.
    label_index: HashMap<String, BTreeSet<NodeId>>,
    outgoing: HashMap<NodeId, BTreeSet<EdgeId>>,
    incoming: HashMap<NodeId, BTreeSet<EdgeId>>,
    last_timestamp: u64,
    seq: u64,
}

impl StoreState {
    /// Wall-clock milliseconds, never behind the previous write.
    fn next_timestamp(&self) -> u64 {
        now_millis().max(self.last_timestamp)
    }

    fn apply(&mut self, entry: JournalEntry) -> Result<()> {
        match entry {
            JournalEntry::Commit {
                seq,
                committed_at,
                nodes,
                edges,
                updates,
                attestation,
            } => {
                for node in nodes {
                    for label in &node.labels {
                        self.label_index
                            .entry(label.clone())
                            .or_default()
                            .insert(node.id);
                    }
                    self.nodes.insert(node.id, node);
                }
                for edge in edges {
                    self.outgoing.entry(edge.source).or_default().insert(edge.id);
                    self.incoming
                        .entry(edge.destination)
                        .or_default()
                        .insert(edge.id);
                    self.edges.insert(edge.id, edge);
                }
                for update in updates {
                    let node = self
                        .nodes
                        .get_mut(&update.id)
                        .ok_or(StoreError::NodeNotFound(update.id))?;
                    node.properties = update.properties;
                    node.content_hash = update.content_hash;
                    node.updated_at = update.updated_at;
                }
                if let Some(record) = attestation {
                    self.attestations.insert(record.id, record);
                }
                self.seq = seq;
                self.last_timestamp = self.last_timestamp.max(committed_at);
            }
            JournalEntry::Anchor {
                seq,
                attestation_id,
                tx_ref,
            } => {
                let record = self
                    .attestations
                    .get_mut(&attestation_id)
                    .ok_or(StoreError::AttestationNotFound(attestation_id))?;
                record.external_tx_ref = Some(tx_ref);
                self.seq = seq;
            }
        }
        Ok(())
    }

    /// Turn a batch into a journal entry, checking every constraint against
    /// the current state first. Nothing is mutated.
    fn prepare_commit(&self, batch: Batch) -> Result<JournalEntry> {
        let now = self.next_timestamp();
        let mut batch_nodes: HashSet<NodeId> = HashSet::with_capacity(batch.nodes.len());

        let mut nodes = Vec::with_capacity(batch.nodes.len());
        for draft in batch.nodes {
            if self.nodes.contains_key(&draft.id) || !batch_nodes.insert(draft.id) {
                return Err(StoreError::DuplicateId(draft.id.to_string()));
            }
            nodes.push(build_node(draft, now)?);
        }

        let node_exists = |id: &NodeId| self.nodes.contains_key(id) || batch_nodes.contains(id);

        let mut edges = Vec::with_capacity(batch.edges.len());
        let mut batch_edges: HashSet<EdgeId> = HashSet::with_capacity(batch.edges.len());
        for draft in batch.edges {
            if self.edges.contains_key(&draft.id) || !batch_edges.insert(draft.id) {
                return Err(StoreError::DuplicateId(draft.id.to_string()));
            }
            for endpoint in [draft.source, draft.destination] {
                if !node_exists(&endpoint) {
                    return Err(StoreError::ForeignKey {
                        edge: draft.id,
                        missing: endpoint,
                    });
                }
            }
            edges.push(build_edge(draft, now)?);
        }

        let mut updates = Vec::with_capacity(batch.updates.len());
        for draft in batch.updates {
            if !node_exists(&draft.id) {
                return Err(StoreError::NodeNotFound(draft.id));
            }
            updates.push(build_update(draft, now)?);
        }

        if let Some(record) = &batch.attestation {
            if self.attestations.contains_key(&record.id) {
                return Err(StoreError::DuplicateId(record.id.to_string()));
            }
        }

        Ok(JournalEntry::Commit {
            seq: self.seq + 1,
            committed_at: now,
            nodes,
            edges,
            updates,
            attestation: batch.attestation,
        })
    }
}

fn build_node(draft: NodeDraft, now: u64) -> Result<Node> {
    let labels = normalize_labels(&draft.labels, MAX_NAME_LEN)?;
    let (properties, content_hash) = canonical_properties(&draft.properties)?;
    Ok(Node {
        id: draft.id,
        labels,
        properties,
        content_hash,
        created_at: now,
        updated_at: now,
    })
}

fn build_edge(draft: EdgeDraft, now: u64) -> Result<Edge> {
    validate_name("edge type", &draft.edge_type, MAX_NAME_LEN)?;
    let (properties, content_hash) = canonical_properties(&draft.properties)?;
    Ok(Edge {
        id: draft.id,
        source: draft.source,
        destination: draft.destination,
        edge_type: draft.edge_type,
        properties,
        content_hash,
        created_at: now,
        updated_at: now,
    })
}

fn build_update(draft: NodeUpdateDraft, now: u64) -> Result<NodeUpdateRow> {
    let (properties, content_hash) = canonical_properties(&draft.properties)?;
    Ok(NodeUpdateRow {
        id: draft.id,
        properties,
        content_hash,
        updated_at: now,
    })
}

#[derive(Debug)]
struct Inner {
    config: StoreConfig,
    state: RwLock<StoreState>,
    /// Writer lock. Holding it is what makes a write call atomic with
    /// respect to other writers.
    journal: Mutex<Option<Journal>>,
}

/// A handle to a graph store. Clones share the same store.
#[derive(Clone, Debug)]
pub struct GraphStore {
    inner: Arc<Inner>,
}

impl GraphStore {
    /// A store without a journal.
    pub fn in_memory() -> Self {
        Self::with_parts(StoreConfig::default(), StoreState::default(), None)
    }

    /// Open a store, replaying its journal if `config.path` is set.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let mut state = StoreState::default();
        let journal = match &config.path {
            Some(path) => {
                let (journal, entries) = Journal::open(path, config.sync_writes)?;
                let replayed = entries.len();
                for (line, entry) in entries.into_iter().enumerate() {
                    state.apply(entry).map_err(|e| StoreError::CorruptJournal {
                        line: line + 1,
                        reason: e.to_string(),
                    })?;
                }
                info!(
                    path = %path.display(),
                    replayed,
                    nodes = state.nodes.len(),
                    edges = state.edges.len(),
                    attestations = state.attestations.len(),
                    "graph store opened"
                );
                Some(journal)
            }
            None => None,
        };
        Ok(Self::with_parts(config, state, journal))
    }

    fn with_parts(config: StoreConfig, state: StoreState, journal: Option<Journal>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                state: RwLock::new(state),
                journal: Mutex::new(journal),
            }),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Run one write: prepare under the writer lock, journal, then publish.
    fn write<F>(&self, prepare: F) -> Result<()>
    where
        F: FnOnce(&StoreState) -> Result<JournalEntry>,
    {
        let mut journal = self.inner.journal.lock();
        let entry = prepare(&self.inner.state.read())?;
        if let Some(journal) = journal.as_mut() {
            journal.append(&entry)?;
        }
        self.inner.state.write().apply(entry)
    }

    // === Writes ===

    /// Create a node and return its id.
    pub fn insert_node(&self, labels: Vec<String>, properties: Value) -> Result<NodeId> {
        let id = NodeId::new();
        let mut batch = Batch::new();
        batch.nodes.push(NodeDraft {
            id,
            labels,
            properties,
        });
        self.commit_batch(batch)?;
        debug!(node = %id, "node inserted");
        Ok(id)
    }

    /// Create an edge. Fails with [`StoreError::ForeignKey`], leaving the
    /// store untouched, when either endpoint does not exist.
    pub fn insert_edge(
        &self,
        source: NodeId,
        destination: NodeId,
        edge_type: impl Into<String>,
        properties: Value,
    ) -> Result<EdgeId> {
        let id = EdgeId::new();
        let mut batch = Batch::new();
        batch.edges.push(EdgeDraft {
            id,
            source,
            destination,
            edge_type: edge_type.into(),
            properties,
        });
        self.commit_batch(batch)?;
        debug!(edge = %id, "edge inserted");
        Ok(id)
    }

    /// Replace a node's properties.
    pub fn update_node(&self, id: NodeId, properties: Value) -> Result<()> {
        let mut batch = Batch::new();
        batch.updates.push(NodeUpdateDraft { id, properties });
        self.commit_batch(batch)
    }

    /// Apply a whole batch atomically: every row and the attestation, or
    /// nothing at all.
    pub fn commit_batch(&self, batch: Batch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.write(|state| state.prepare_commit(batch))
    }

    /// Attach the external ledger reference of an attestation. Allowed once.
    pub fn attach_external_tx_ref(&self, id: AttestationId, tx_ref: impl Into<String>) -> Result<()> {
        let tx_ref = tx_ref.into();
        self.write(|state| {
            let record = state
                .attestations
                .get(&id)
                .ok_or(StoreError::AttestationNotFound(id))?;
            if let Some(existing) = &record.external_tx_ref {
                return Err(StoreError::AlreadyAnchored {
                    id,
                    existing: existing.clone(),
                });
            }
            Ok(JournalEntry::Anchor {
                seq: state.seq + 1,
                attestation_id: id,
                tx_ref,
            })
        })?;
        info!(attestation = %id, "attestation anchored");
        Ok(())
    }

    // === Reads ===

    pub fn get_node(&self, id: &NodeId) -> Option<Node> {
        self.inner.state.read().nodes.get(id).cloned()
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.inner.state.read().nodes.contains_key(id)
    }

    pub fn get_edge(&self, id: &EdgeId) -> Option<Edge> {
        self.inner.state.read().edges.get(id).cloned()
    }

    /// Nodes carrying `label`, oldest first, at most `limit`.
    pub fn query_by_label(&self, label: &str, limit: usize) -> Vec<NodeSummary> {
        let state = self.inner.state.read();
        state
            .label_index
            .get(label)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.nodes.get(id))
                    .take(limit)
                    .map(Node::summary)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Edges leaving `node`, oldest first.
    pub fn edges_from(&self, node: &NodeId) -> Vec<Edge> {
        let state = self.inner.state.read();
        Self::collect_edges(&state, state.outgoing.get(node))
    }

    /// Edges arriving at `node`, oldest first.
    pub fn edges_to(&self, node: &NodeId) -> Vec<Edge> {
        let state = self.inner.state.read();
        Self::collect_edges(&state, state.incoming.get(node))
    }

    fn collect_edges(state: &StoreState, ids: Option<&BTreeSet<EdgeId>>) -> Vec<Edge> {
        ids.map(|ids| ids.iter().filter_map(|id| state.edges.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    pub fn get_attestation(&self, id: &AttestationId) -> Option<AttestationRecord> {
        self.inner.state.read().attestations.get(id).cloned()
    }

    /// Most recent attestations first, at most `limit`.
    pub fn list_attestations(&self, limit: usize) -> Vec<AttestationRecord> {
        self.inner
            .state
            .read()
            .attestations
            .values()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn statistics(&self) -> StoreStatistics {
        let state = self.inner.state.read();
        StoreStatistics {
            node_count: state.nodes.len(),
            edge_count: state.edges.len(),
            attestation_count: state.attestations.len(),
            schema_version: self.inner.config.schema_version.clone(),
        }
    }
}
