//! Hand-off of signed attestations to an external ledger.
//!
//! The pipeline never waits on a ledger. A [`SinkHandoff`] submits the
//! export in a background task and, once the sink returns a transaction
//! reference, records it on the stored attestation.

use crate::attestation::{Attestation, AttestationExport};
use akg_core::AttestationId;
use akg_store::GraphStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Errors reported by a sink.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("Sink unavailable: {0}")]
    Unavailable(String),

    #[error("Submission rejected: {0}")]
    Rejected(String),
}

/// Receives attestation exports and answers with a transaction reference.
#[async_trait]
pub trait AttestationSink: Send + Sync + 'static {
    async fn submit(&self, export: &AttestationExport) -> Result<String, SinkError>;
}

/// Fire-and-forget submission that anchors the stored row on success.
#[derive(Clone)]
pub struct SinkHandoff {
    sink: Arc<dyn AttestationSink>,
    store: GraphStore,
}

impl SinkHandoff {
    pub fn new(sink: Arc<dyn AttestationSink>, store: GraphStore) -> Self {
        Self { sink, store }
    }

    /// Spawn the submission on the current tokio runtime. Dropping the
    /// returned handle does not cancel it.
    pub fn dispatch(&self, attestation: &Attestation) -> JoinHandle<()> {
        let sink = Arc::clone(&self.sink);
        let store = self.store.clone();
        let id = attestation.id;
        let export = attestation.export();
        tokio::spawn(async move {
            submit_and_anchor(sink.as_ref(), &store, id, &export).await;
        })
    }
}

async fn submit_and_anchor(
    sink: &dyn AttestationSink,
    store: &GraphStore,
    id: AttestationId,
    export: &AttestationExport,
) {
    let tx_ref = match sink.submit(export).await {
        Ok(tx_ref) => tx_ref,
        Err(e) => {
            warn!(attestation = %id, error = %e, "attestation submission failed");
            return;
        }
    };
    match store.attach_external_tx_ref(id, tx_ref.clone()) {
        Ok(()) => info!(attestation = %id, tx_ref = %tx_ref, "attestation submitted"),
        Err(e) => warn!(attestation = %id, error = %e, "could not record transaction reference"),
    }
}

/// In-process sink that keeps every submission.
#[derive(Default)]
pub struct MemorySink {
    submissions: RwLock<Vec<AttestationExport>>,
    counter: AtomicU64,
    reject_all: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that refuses every submission.
    pub fn rejecting() -> Self {
        Self {
            reject_all: true,
            ..Self::default()
        }
    }

    pub fn submissions(&self) -> Vec<AttestationExport> {
        self.submissions.read().clone()
    }

    pub fn len(&self) -> usize {
        self.submissions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.submissions.read().is_empty()
    }
}

#[async_trait]
impl AttestationSink for MemorySink {
    async fn submit(&self, export: &AttestationExport) -> Result<String, SinkError> {
        if self.reject_all {
            return Err(SinkError::Rejected("memory sink is rejecting".to_string()));
        }
        if !export.verify() {
            return Err(SinkError::Rejected("signature does not verify".to_string()));
        }
        self.submissions.write().push(export.clone());
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(format!("mem:{n:08}"))
    }
}
