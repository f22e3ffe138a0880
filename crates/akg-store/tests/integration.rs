//! Integration tests for the graph store.
//!
//! Tests cover:
//! - Journal replay restores nodes, edges, updates and anchors
//! - A batch with an attestation lands atomically or not at all
//! - Concurrent writers never expose partial state
//! - Foreign keys hold across arbitrary insert sequences

use akg_core::{now_millis, AttestationId, EdgeId, NodeId};
use akg_merkle::{attestation_message, Hasher, Keypair, MerkleTree};
use akg_store::{
    AttestationRecord, Batch, EdgeDraft, GraphStore, NodeDraft, StoreConfigBuilder, StoreError,
};
use proptest::prelude::*;
use serde_json::json;
use std::thread;

fn signed_record(records: usize) -> AttestationRecord {
    let record_hashes: Vec<_> = (0..records).map(|i| Hasher::hash(&i.to_be_bytes())).collect();
    let tree = MerkleTree::build(&record_hashes);
    let keypair = Keypair::generate();
    let id = AttestationId::new();
    let timestamp = now_millis();
    let signature = keypair.sign(&attestation_message(&tree.root(), &id.to_bytes(), timestamp));
    AttestationRecord {
        id,
        merkle_root: tree.root(),
        signature,
        signer_public_key: keypair.public_key(),
        schema_version: "test-schema".into(),
        validator_version: "test-validator".into(),
        timestamp,
        record_hashes,
        external_tx_ref: None,
    }
}

fn node_draft(label: &str) -> NodeDraft {
    NodeDraft {
        id: NodeId::new(),
        labels: vec![label.to_string()],
        properties: json!({"name": label}),
    }
}

#[test]
fn test_journal_replay_restores_everything() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfigBuilder::new()
        .path(dir.path().join("graph.journal"))
        .schema_version("replay-test")
        .build();

    let (a, b, edge, attestation) = {
        let store = GraphStore::open(config.clone()).unwrap();
        let a = store.insert_node(vec!["Gene".into()], json!({"symbol": "TP53"})).unwrap();
        let b = store.insert_node(vec!["Gene".into()], json!({"symbol": "MDM2"})).unwrap();
        let edge = store.insert_edge(a, b, "REGULATES", json!({})).unwrap();
        store.update_node(a, json!({"symbol": "TP53", "chromosome": 17})).unwrap();

        let record = signed_record(3);
        let mut batch = Batch::new();
        batch.attestation = Some(record.clone());
        store.commit_batch(batch).unwrap();
        store.attach_external_tx_ref(record.id, "0xfeed").unwrap();
        (a, b, edge, record.id)
    };

    let store = GraphStore::open(config).unwrap();
    let stats = store.statistics();
    assert_eq!(stats.node_count, 2);
    assert_eq!(stats.edge_count, 1);
    assert_eq!(stats.attestation_count, 1);
    assert_eq!(stats.schema_version, "replay-test");

    assert_eq!(
        store.get_node(&a).unwrap().properties,
        json!({"chromosome": 17, "symbol": "TP53"})
    );
    assert!(store.get_node(&b).is_some());
    assert_eq!(store.get_edge(&edge).unwrap().destination, b);

    let record = store.get_attestation(&attestation).unwrap();
    assert_eq!(record.external_tx_ref.as_deref(), Some("0xfeed"));
    assert!(record.verify());

    // Writes keep working after replay.
    store.insert_node(vec!["Gene".into()], json!({})).unwrap();
    assert_eq!(store.query_by_label("Gene", 10).len(), 3);
}

#[test]
fn test_attestation_commits_with_its_batch() {
    let store = GraphStore::in_memory();
    let a = node_draft("A");
    let b = node_draft("B");
    let record = signed_record(3);

    let mut batch = Batch::new();
    batch.edges.push(EdgeDraft {
        id: EdgeId::new(),
        source: a.id,
        destination: b.id,
        edge_type: "LINKS".into(),
        properties: json!({}),
    });
    batch.nodes.push(a.clone());
    batch.nodes.push(b);
    batch.attestation = Some(record.clone());
    store.commit_batch(batch).unwrap();

    assert_eq!(store.edges_from(&a.id).len(), 1);
    assert_eq!(store.list_attestations(10), vec![record]);
}

#[test]
fn test_rejected_batch_drops_attestation_too() {
    let store = GraphStore::in_memory();
    let record = signed_record(2);

    let mut batch = Batch::new();
    batch.nodes.push(node_draft("A"));
    batch.edges.push(EdgeDraft {
        id: EdgeId::new(),
        source: NodeId::new(),
        destination: NodeId::new(),
        edge_type: "LINKS".into(),
        properties: json!({}),
    });
    batch.attestation = Some(record.clone());

    assert!(matches!(
        store.commit_batch(batch),
        Err(StoreError::ForeignKey { .. })
    ));
    assert!(store.get_attestation(&record.id).is_none());
    assert_eq!(store.statistics().node_count, 0);
}

#[test]
fn test_anchor_only_once() {
    let store = GraphStore::in_memory();
    let record = signed_record(1);
    let mut batch = Batch::new();
    batch.attestation = Some(record.clone());
    store.commit_batch(batch).unwrap();

    store.attach_external_tx_ref(record.id, "tx-1").unwrap();
    assert!(matches!(
        store.attach_external_tx_ref(record.id, "tx-2"),
        Err(StoreError::AlreadyAnchored { existing, .. }) if existing == "tx-1"
    ));
    assert!(matches!(
        store.attach_external_tx_ref(AttestationId::new(), "tx-3"),
        Err(StoreError::AttestationNotFound(_))
    ));
}

#[test]
fn test_list_attestations_newest_first() {
    let store = GraphStore::in_memory();
    let ids: Vec<AttestationId> = (0..4)
        .map(|_| {
            let record = signed_record(1);
            let id = record.id;
            let mut batch = Batch::new();
            batch.attestation = Some(record);
            store.commit_batch(batch).unwrap();
            id
        })
        .collect();

    let listed: Vec<_> = store.list_attestations(2).into_iter().map(|r| r.id).collect();
    assert_eq!(listed, vec![ids[3], ids[2]]);
}

#[test]
fn test_concurrent_batches_are_all_or_nothing() {
    let store = GraphStore::in_memory();
    let writers: Vec<_> = (0..8)
        .map(|w| {
            let store = store.clone();
            thread::spawn(move || {
                for _ in 0..25 {
                    let a = node_draft("Pair");
                    let b = node_draft("Pair");
                    let mut batch = Batch::new();
                    batch.edges.push(EdgeDraft {
                        id: EdgeId::new(),
                        source: a.id,
                        destination: b.id,
                        edge_type: format!("W{w}"),
                        properties: json!({}),
                    });
                    batch.nodes.push(a);
                    batch.nodes.push(b);
                    store.commit_batch(batch).unwrap();
                }
            })
        })
        .collect();

    let reader = {
        let store = store.clone();
        thread::spawn(move || {
            for _ in 0..200 {
                let stats = store.statistics();
                // Every batch adds two nodes and one edge together.
                assert_eq!(stats.node_count, stats.edge_count * 2);
            }
        })
    };

    for w in writers {
        w.join().unwrap();
    }
    reader.join().unwrap();

    let stats = store.statistics();
    assert_eq!(stats.node_count, 400);
    assert_eq!(stats.edge_count, 200);
}

proptest! {
    #[test]
    fn edges_never_dangle(ops in prop::collection::vec((any::<bool>(), 0usize..16, 0usize..16), 1..60)) {
        let store = GraphStore::in_memory();
        let mut known: Vec<NodeId> = Vec::new();
        let ghosts: Vec<NodeId> = (0..16).map(|_| NodeId::new()).collect();

        for (create, s, d) in ops {
            if create || known.is_empty() {
                known.push(store.insert_node(vec!["N".into()], json!({})).unwrap());
                continue;
            }
            let source = known[s % known.len()];
            let destination = if d % 3 == 0 { ghosts[d] } else { known[d % known.len()] };
            let result = store.insert_edge(source, destination, "E", json!({}));
            prop_assert_eq!(result.is_ok(), store.contains_node(&destination));
        }

        for id in &known {
            for edge in store.edges_from(id) {
                prop_assert!(store.contains_node(&edge.source));
                prop_assert!(store.contains_node(&edge.destination));
            }
        }
    }
}
