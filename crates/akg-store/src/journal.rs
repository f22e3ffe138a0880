//! Append-only journal backing a durable store.
//!
//! One JSON line per committed write call. A line is either fully present
//! or, after a crash mid-append, a torn tail without its trailing newline;
//! the torn tail is dropped on open.
//!
//! A failed append is cut back off the file before the error is returned, so
//! a write reported as failed is never replayed. If that truncation fails as
//! well the journal refuses further appends.

use crate::error::{Result, StoreError};
use crate::model::{AttestationRecord, Edge, Node};
use akg_core::{AttestationId, NodeId};
use akg_merkle::Hash;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// A property replacement as recorded in the journal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeUpdateRow {
    pub id: NodeId,
    pub properties: Value,
    pub content_hash: Hash,
    pub updated_at: u64,
}

/// One atomic write.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum JournalEntry {
    /// Nodes, edges, updates and at most one attestation, all or nothing.
    Commit {
        seq: u64,
        committed_at: u64,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        updates: Vec<NodeUpdateRow>,
        attestation: Option<AttestationRecord>,
    },
    /// Late attachment of an external ledger reference.
    Anchor {
        seq: u64,
        attestation_id: AttestationId,
        tx_ref: String,
    },
}

impl JournalEntry {
    pub fn seq(&self) -> u64 {
        match self {
            JournalEntry::Commit { seq, .. } | JournalEntry::Anchor { seq, .. } => *seq,
        }
    }
}

/// File handle for the journal.
#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    file: File,
    sync_writes: bool,
    /// Length of the file up to the last acknowledged entry.
    len: u64,
    poisoned: bool,
}

impl Journal {
    /// Open (or create) the journal and return every intact entry in order.
    pub fn open(path: impl AsRef<Path>, sync_writes: bool) -> Result<(Self, Vec<JournalEntry>)> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)?;

        let mut raw = Vec::new();
        file.read_to_end(&mut raw)?;
        let (entries, intact_len) = parse_entries(&raw)?;

        if intact_len < raw.len() {
            warn!(
                path = %path.display(),
                dropped_bytes = raw.len() - intact_len,
                "discarding torn journal tail"
            );
            file.set_len(intact_len as u64)?;
            file.sync_all()?;
        }

        debug!(path = %path.display(), entries = entries.len(), "journal opened");
        Ok((
            Journal {
                path,
                file,
                sync_writes,
                len: intact_len as u64,
                poisoned: false,
            },
            entries,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry as a single line and flush it to disk.
    ///
    /// On error nothing of the entry remains in the file.
    pub fn append(&mut self, entry: &JournalEntry) -> Result<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        let sync_writes = self.sync_writes;
        self.append_line(&line, |file, line| {
            file.write_all(line)?;
            if sync_writes {
                file.sync_data()?;
            }
            Ok(())
        })
    }

    fn append_line<F>(&mut self, line: &[u8], write: F) -> Result<()>
    where
        F: FnOnce(&mut File, &[u8]) -> io::Result<()>,
    {
        if self.poisoned {
            return Err(StoreError::JournalPoisoned);
        }
        match write(&mut self.file, line) {
            Ok(()) => {
                self.len += line.len() as u64;
                Ok(())
            }
            Err(err) => {
                if let Err(rollback) = self.truncate_to_acknowledged() {
                    error!(
                        path = %self.path.display(),
                        error = %rollback,
                        "journal rollback failed"
                    );
                    self.poisoned = true;
                } else {
                    warn!(path = %self.path.display(), error = %err, "journal append rolled back");
                }
                Err(err.into())
            }
        }
    }

    fn truncate_to_acknowledged(&mut self) -> io::Result<()> {
        self.file.set_len(self.len)?;
        self.file.sync_all()
    }
}

/// Parse complete lines. Returns the entries and the byte length of the
/// intact prefix.
fn parse_entries(raw: &[u8]) -> Result<(Vec<JournalEntry>, usize)> {
    let mut entries = Vec::new();
    let mut offset = 0;
    let mut line_no = 0;

    while offset < raw.len() {
        line_no += 1;
        let Some(newline) = raw[offset..].iter().position(|b| *b == b'\n') else {
            // No terminator: a write was cut short.
            break;
        };
        let line = &raw[offset..offset + newline];
        if !line.iter().all(u8::is_ascii_whitespace) {
            let entry: JournalEntry =
                serde_json::from_slice(line).map_err(|e| StoreError::CorruptJournal {
                    line: line_no,
                    reason: e.to_string(),
                })?;
            entries.push(entry);
        }
        offset += newline + 1;
    }

    Ok((entries, offset))
}
