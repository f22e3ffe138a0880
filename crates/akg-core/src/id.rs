//! Time-sortable identifiers.
//!
//! Every node, edge and attestation is named by a ULID: a 48-bit millisecond
//! timestamp followed by 80 bits of randomness, rendered as 26 Crockford
//! base-32 characters. String order equals byte order equals creation order.
//!
//! Identifiers minted in one process are strictly increasing, even within a
//! single millisecond.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;
use ulid::{Generator, Ulid};

/// Failure to parse an identifier from its string form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid identifier {input:?}: {reason}")]
pub struct IdentParseError {
    pub input: String,
    pub reason: String,
}

fn generator() -> &'static Mutex<Generator> {
    static GENERATOR: OnceLock<Mutex<Generator>> = OnceLock::new();
    GENERATOR.get_or_init(|| Mutex::new(Generator::new()))
}

/// A raw 128-bit sortable identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ident(Ulid);

impl Ident {
    /// Mint a fresh identifier, monotonic within this process.
    pub fn new() -> Self {
        let mut gen = generator().lock();
        // The generator only fails when the random part overflows inside one
        // millisecond.
        Ident(gen.generate().unwrap_or_else(|_| Ulid::new()))
    }

    /// Parse the 26-character base-32 form.
    pub fn parse(s: &str) -> Result<Self, IdentParseError> {
        Ulid::from_string(s)
            .map(Ident)
            .map_err(|e| IdentParseError {
                input: s.to_string(),
                reason: e.to_string(),
            })
    }

    /// Rebuild an identifier from its big-endian byte form.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Ident(Ulid::from_bytes(bytes))
    }

    /// Big-endian byte form, as fed into signatures.
    pub fn to_bytes(&self) -> [u8; 16] {
        self.0.to_bytes()
    }

    /// The millisecond timestamp prefix.
    pub fn timestamp_ms(&self) -> u64 {
        self.0.timestamp_ms()
    }
}

impl Default for Ident {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ident({})", self.0)
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Ident {
    type Err = IdentParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ident::parse(s)
    }
}

macro_rules! typed_ident {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Ident);

        impl $name {
            pub fn new() -> Self {
                Self(Ident::new())
            }

            pub fn parse(s: &str) -> Result<Self, IdentParseError> {
                Ident::parse(s).map(Self)
            }

            pub fn to_bytes(&self) -> [u8; 16] {
                self.0.to_bytes()
            }

            pub fn timestamp_ms(&self) -> u64 {
                self.0.timestamp_ms()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdentParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

typed_ident!(
    /// Identifier of a graph node.
    NodeId
);
typed_ident!(
    /// Identifier of a graph edge.
    EdgeId
);
typed_ident!(
    /// Identifier of a batch attestation.
    AttestationId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic() {
        let ids: Vec<Ident> = (0..1000).map(|_| Ident::new()).collect();
        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].to_string() < pair[1].to_string());
        }
    }

    #[test]
    fn test_ids_unique_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| (0..500).map(|_| Ident::new()).collect::<Vec<_>>()))
            .collect();
        let mut all: Vec<Ident> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 2000);
    }

    #[test]
    fn test_string_roundtrip() {
        let id = NodeId::new();
        let s = id.to_string();
        assert_eq!(s.len(), 26);
        assert_eq!(NodeId::parse(&s).unwrap(), id);
    }

    #[test]
    fn test_bytes_roundtrip() {
        let id = Ident::new();
        assert_eq!(Ident::from_bytes(id.to_bytes()), id);
    }

    #[test]
    fn test_timestamp_prefix() {
        let before = crate::now_millis();
        let id = AttestationId::new();
        let after = crate::now_millis();
        assert!(id.timestamp_ms() >= before.saturating_sub(1));
        assert!(id.timestamp_ms() <= after + 1);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(EdgeId::parse("not-an-id").is_err());
        assert!(EdgeId::parse("").is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let id = EdgeId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
        let back: EdgeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
