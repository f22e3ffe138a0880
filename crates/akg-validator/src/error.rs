//! Error types for the validator pipeline.

use crate::mutation::{RecordKind, RecordStatus};
use crate::rules::RuleViolation;
use akg_core::{EncodingError, NodeId};
use akg_merkle::SignatureError;
use akg_store::{StoreError, StructuralValidationError};
use std::fmt;
use thiserror::Error;

/// A problem with a single record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordViolation {
    #[error("{0}")]
    Structural(#[from] StructuralValidationError),

    #[error("Rule {0}")]
    Rule(RuleViolation),

    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("Endpoint refers to batch index {target}, which is not an earlier node creation")]
    InvalidPendingEndpoint { target: usize },
}

impl RecordViolation {
    pub fn rule_name(&self) -> Option<&str> {
        match self {
            RecordViolation::Rule(v) => Some(&v.rule),
            _ => None,
        }
    }
}

/// Outcome of validating one mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordReport {
    pub index: usize,
    pub kind: RecordKind,
    pub status: RecordStatus,
    pub violations: Vec<RecordViolation>,
}

/// Every record of a rejected batch with its status and violations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub records: Vec<RecordReport>,
}

impl ValidationReport {
    pub fn failed(&self) -> impl Iterator<Item = &RecordReport> {
        self.records
            .iter()
            .filter(|r| r.status == RecordStatus::Failed)
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }

    pub fn violation_count(&self) -> usize {
        self.records.iter().map(|r| r.violations.len()).sum()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} records failed",
            self.failed_count(),
            self.records.len()
        )?;
        for record in self.failed() {
            for violation in &record.violations {
                write!(f, "; [{}] {}: {}", record.index, record.kind, violation)?;
            }
        }
        Ok(())
    }
}

/// Errors that abort a pipeline commit.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Empty batch")]
    EmptyBatch,

    #[error("Batch rejected: {0}")]
    Rejected(ValidationReport),

    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Signature error: {0}")]
    Signature(#[from] SignatureError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl PipelineError {
    pub fn report(&self) -> Option<&ValidationReport> {
        match self {
            PipelineError::Rejected(report) => Some(report),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
