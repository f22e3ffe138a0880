//! Content hashing.
//!
//! BLAKE3 is used for every digest in the graph: content hashes, Merkle
//! leaves and Merkle internal nodes. Keyed hashing and key derivation use
//! BLAKE3's own keyed and derive-key modes.

use akg_core::{canonicalize, EncodingError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Algorithm tag prefixed to the exported hex form of a hash.
pub const HASH_TAG: &str = "b3";

/// Failure to parse a hash from hex.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HashParseError {
    #[error("Unknown hash algorithm tag: {0}")]
    UnknownTag(String),

    #[error("Expected 64 hex characters, got {0}")]
    BadLength(usize),

    #[error("Invalid hex: {0}")]
    BadHex(String),
}

/// A 32-byte BLAKE3 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash([u8; 32]);

impl Hash {
    /// Create a hash from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }

    /// Get the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The zero hash, used as the root of an empty tree.
    pub fn zero() -> Self {
        Hash([0u8; 32])
    }

    /// Check if this is the zero hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Lowercase hex, no tag.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Hex with the algorithm tag, e.g. `b3:9f…`.
    pub fn to_tagged(&self) -> String {
        format!("{}:{}", HASH_TAG, self.to_hex())
    }

    /// Parse untagged hex.
    pub fn from_hex(s: &str) -> Result<Self, HashParseError> {
        if s.len() != 64 {
            return Err(HashParseError::BadLength(s.len()));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|e| HashParseError::BadHex(e.to_string()))?;
        Ok(Hash(bytes))
    }

    /// Parse either the tagged or the untagged form.
    pub fn parse(s: &str) -> Result<Self, HashParseError> {
        match s.split_once(':') {
            Some((tag, rest)) if tag == HASH_TAG => Self::from_hex(rest),
            Some((tag, _)) => Err(HashParseError::UnknownTag(tag.to_string())),
            None => Self::from_hex(s),
        }
    }

    /// Truncated display (first 8 chars).
    pub fn short(&self) -> String {
        self.to_hex()[..8].to_string()
    }

    /// Copy with one bit flipped. Handy for tamper tests.
    pub fn with_bit_flipped(&self, bit: usize) -> Self {
        let mut bytes = self.0;
        bytes[(bit / 8) % 32] ^= 1 << (bit % 8);
        Hash(bytes)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({}...)", self.short())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Default for Hash {
    fn default() -> Self {
        Hash::zero()
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_tagged())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash::parse(&s).map_err(serde::de::Error::custom)
    }
}

impl From<blake3::Hash> for Hash {
    fn from(h: blake3::Hash) -> Self {
        Hash(*h.as_bytes())
    }
}

/// Hasher utility for computing content hashes.
pub struct Hasher {
    inner: blake3::Hasher,
}

impl Hasher {
    /// Create a new hasher.
    pub fn new() -> Self {
        Hasher {
            inner: blake3::Hasher::new(),
        }
    }

    /// Update the hasher with data.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> Hash {
        self.inner.finalize().into()
    }

    /// Hash data directly.
    pub fn hash(data: &[u8]) -> Hash {
        blake3::hash(data).into()
    }

    /// Hash multiple pieces of data as one stream.
    pub fn hash_all(parts: &[&[u8]]) -> Hash {
        let mut hasher = Self::new();
        for part in parts {
            hasher.update(part);
        }
        hasher.finalize()
    }

    /// Keyed hash (MAC) of `data` under a 256-bit key.
    pub fn keyed_hash(data: &[u8], key: &[u8; 32]) -> Hash {
        blake3::keyed_hash(key, data).into()
    }

    /// Derive `length` bytes of key material bound to `context`.
    ///
    /// `context` should be a hardcoded, globally unique, application-specific
    /// string.
    pub fn derive_key(context: &str, key_material: &[u8], length: usize) -> Vec<u8> {
        let mut hasher = blake3::Hasher::new_derive_key(context);
        hasher.update(key_material);
        let mut out = vec![0u8; length];
        hasher.finalize_xof().fill(&mut out);
        out
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash of the canonical encoding of `value`.
pub fn content_hash(value: &Value) -> Result<Hash, EncodingError> {
    Ok(Hasher::hash(&canonicalize(value)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hash_deterministic() {
        let data = b"hello world";
        assert_eq!(Hasher::hash(data), Hasher::hash(data));
    }

    #[test]
    fn test_hash_different_data() {
        assert_ne!(Hasher::hash(b"hello"), Hasher::hash(b"world"));
    }

    #[test]
    fn test_known_vector() {
        // BLAKE3 of the empty input.
        assert_eq!(
            Hasher::hash(b"").to_hex(),
            "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262"
        );
    }

    #[test]
    fn test_hex_roundtrip() {
        let h1 = Hasher::hash(b"test data");
        assert_eq!(Hash::from_hex(&h1.to_hex()).unwrap(), h1);
        assert_eq!(Hash::parse(&h1.to_tagged()).unwrap(), h1);
        assert!(h1.to_tagged().starts_with("b3:"));
    }

    #[test]
    fn test_parse_rejects() {
        assert_eq!(Hash::from_hex("abcd"), Err(HashParseError::BadLength(4)));
        assert!(matches!(
            Hash::parse(&format!("sha256:{}", Hash::zero().to_hex())),
            Err(HashParseError::UnknownTag(_))
        ));
        assert!(matches!(Hash::from_hex(&"zz".repeat(32)), Err(HashParseError::BadHex(_))));
    }

    #[test]
    fn test_zero_hash() {
        assert!(Hash::zero().is_zero());
        assert!(!Hasher::hash(b"test").is_zero());
    }

    #[test]
    fn test_hash_all() {
        let h1 = Hasher::hash_all(&[b"hello", b"world"]);

        let mut hasher = Hasher::new();
        hasher.update(b"hello");
        hasher.update(b"world");
        assert_eq!(h1, hasher.finalize());
        assert_eq!(h1, Hasher::hash(b"helloworld"));
    }

    #[test]
    fn test_keyed_hash() {
        let k1 = [7u8; 32];
        let k2 = [8u8; 32];
        assert_eq!(Hasher::keyed_hash(b"msg", &k1), Hasher::keyed_hash(b"msg", &k1));
        assert_ne!(Hasher::keyed_hash(b"msg", &k1), Hasher::keyed_hash(b"msg", &k2));
        assert_ne!(Hasher::keyed_hash(b"msg", &k1), Hasher::hash(b"msg"));
    }

    #[test]
    fn test_derive_key() {
        let a = Hasher::derive_key("akg test 2024 context a", b"material", 48);
        let b = Hasher::derive_key("akg test 2024 context a", b"material", 48);
        let c = Hasher::derive_key("akg test 2024 context b", b"material", 48);
        assert_eq!(a.len(), 48);
        assert_eq!(a, b);
        assert_ne!(a, c);
        // XOF output is a prefix-stable stream.
        assert_eq!(Hasher::derive_key("akg test 2024 context a", b"material", 16), a[..16]);
    }

    #[test]
    fn test_content_hash_ignores_key_order() {
        let a = content_hash(&json!({"x": 1, "y": [1.0, "z"]})).unwrap();
        let b = content_hash(&json!({"y": [1, "z"], "x": 1.0})).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, content_hash(&json!({"x": 2, "y": [1, "z"]})).unwrap());
    }

    #[test]
    fn test_serde_tagged() {
        let h = Hasher::hash(b"serde");
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, format!("\"b3:{}\"", h.to_hex()));
        assert_eq!(serde_json::from_str::<Hash>(&json).unwrap(), h);
    }

    #[test]
    fn test_bit_flip() {
        let h = Hasher::hash(b"flip");
        assert_ne!(h.with_bit_flipped(0), h);
        assert_eq!(h.with_bit_flipped(13).with_bit_flipped(13), h);
    }
}
