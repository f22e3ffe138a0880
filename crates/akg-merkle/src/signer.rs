//! Ed25519 signing for attestations.
//!
//! Signatures over attestations always cover a domain-separated message:
//! `ATTESTATION_DOMAIN_TAG || merkle_root || attestation_id || timestamp`,
//! so a signature can never be replayed as a signature for another protocol.

use crate::hash::Hash;
use ed25519_dalek::{Signer as _, SigningKey, Verifier as _, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Scheme tag prefixed to exported keys and signatures.
pub const SIGNATURE_TAG: &str = "ed25519";

/// Domain separator for attestation signatures.
pub const ATTESTATION_DOMAIN_TAG: &[u8] = b"akg:attestation:v1\0";

/// Signing or key handling failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Invalid public key: {0}")]
    InvalidKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Malformed {what}: {reason}")]
    Malformed { what: &'static str, reason: String },
}

/// Build the exact byte string an attestation signature covers.
pub fn attestation_message(root: &Hash, attestation_id: &[u8; 16], timestamp: u64) -> Vec<u8> {
    let mut msg = Vec::with_capacity(ATTESTATION_DOMAIN_TAG.len() + 32 + 16 + 8);
    msg.extend_from_slice(ATTESTATION_DOMAIN_TAG);
    msg.extend_from_slice(root.as_bytes());
    msg.extend_from_slice(attestation_id);
    msg.extend_from_slice(&timestamp.to_be_bytes());
    msg
}

fn parse_tagged<const N: usize>(s: &str, what: &'static str) -> Result<[u8; N], SignatureError> {
    let hex_part = match s.split_once(':') {
        Some((tag, rest)) if tag == SIGNATURE_TAG => rest,
        Some((tag, _)) => {
            return Err(SignatureError::Malformed {
                what,
                reason: format!("unknown scheme tag {tag:?}"),
            })
        }
        None => s,
    };
    let mut out = [0u8; N];
    hex::decode_to_slice(hex_part, &mut out).map_err(|e| SignatureError::Malformed {
        what,
        reason: e.to_string(),
    })?;
    Ok(out)
}

/// An Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    /// Accept raw bytes, rejecting encodings that are not curve points.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, SignatureError> {
        VerifyingKey::from_bytes(&bytes).map_err(|e| SignatureError::InvalidKey(e.to_string()))?;
        Ok(PublicKey(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// `ed25519:<hex>`
    pub fn to_tagged(&self) -> String {
        format!("{}:{}", SIGNATURE_TAG, hex::encode(self.0))
    }

    /// Parse the tagged or untagged hex form.
    pub fn parse(s: &str) -> Result<Self, SignatureError> {
        Self::from_bytes(parse_tagged::<32>(s, "public key")?)
    }

    /// Check `signature` over `message`. Never fails loudly: a bad key or a
    /// bad signature both yield `false`.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
        key.verify(message, &sig).is_ok()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}...)", &hex::encode(self.0)[..8])
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_tagged())
    }
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; 64]);

impl Signature {
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Signature(bytes)
    }

    pub fn to_bytes(&self) -> [u8; 64] {
        self.0
    }

    /// `ed25519:<hex>`
    pub fn to_tagged(&self) -> String {
        format!("{}:{}", SIGNATURE_TAG, hex::encode(self.0))
    }

    /// Parse the tagged or untagged hex form.
    pub fn parse(s: &str) -> Result<Self, SignatureError> {
        Ok(Signature(parse_tagged::<64>(s, "signature")?))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}...)", &hex::encode(self.0)[..8])
    }
}

macro_rules! tagged_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_tagged())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                <$ty>::parse(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

tagged_serde!(PublicKey);
tagged_serde!(Signature);

/// An Ed25519 signing key pair. The secret half is wiped on drop.
#[derive(Clone)]
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    /// Generate a fresh key pair from the OS random source.
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        let keypair = Self::from_secret_bytes(&seed);
        seed.fill(0);
        keypair
    }

    /// Rebuild a key pair from its 32-byte secret seed.
    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        Keypair {
            signing: SigningKey::from_bytes(secret),
        }
    }

    /// The 32-byte secret seed. Handle with care.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing.to_bytes()
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing.verifying_key().to_bytes())
    }

    /// Sign an arbitrary message. Ed25519 is deterministic, but callers must
    /// not rely on that.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing.sign(message).to_bytes())
    }

    /// Sign and immediately self-check the signature.
    pub fn sign_checked(&self, message: &[u8]) -> Result<Signature, SignatureError> {
        let sig = self
            .signing
            .try_sign(message)
            .map_err(|e| SignatureError::InvalidSignature(e.to_string()))?;
        let sig = Signature(sig.to_bytes());
        if !self.public_key().verify(message, &sig) {
            return Err(SignatureError::InvalidSignature(
                "signature failed self-verification".to_string(),
            ));
        }
        Ok(sig)
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public", &self.public_key())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Hasher;

    #[test]
    fn test_sign_verify() {
        let kp = Keypair::generate();
        let sig = kp.sign(b"message");
        assert!(kp.public_key().verify(b"message", &sig));
        assert!(!kp.public_key().verify(b"messagf", &sig));
    }

    #[test]
    fn test_wrong_key_rejects() {
        let a = Keypair::generate();
        let b = Keypair::generate();
        let sig = a.sign(b"message");
        assert!(!b.public_key().verify(b"message", &sig));
    }

    #[test]
    fn test_tampered_signature_rejects() {
        let kp = Keypair::generate();
        let mut bytes = kp.sign(b"message").to_bytes();
        bytes[10] ^= 0x01;
        assert!(!kp.public_key().verify(b"message", &Signature::from_bytes(bytes)));
    }

    #[test]
    fn test_secret_roundtrip() {
        let kp = Keypair::generate();
        let restored = Keypair::from_secret_bytes(&kp.secret_bytes());
        assert_eq!(kp.public_key(), restored.public_key());
    }

    #[test]
    fn test_tagged_roundtrip() {
        let kp = Keypair::generate();
        let pk = kp.public_key();
        let sig = kp.sign(b"x");
        assert!(pk.to_tagged().starts_with("ed25519:"));
        assert_eq!(PublicKey::parse(&pk.to_tagged()).unwrap(), pk);
        assert_eq!(Signature::parse(&sig.to_tagged()).unwrap(), sig);
        assert!(Signature::parse("rsa:00").is_err());
        assert!(PublicKey::parse("ed25519:zz").is_err());
    }

    #[test]
    fn test_attestation_message_layout() {
        let root = Hasher::hash(b"root");
        let id = [9u8; 16];
        let msg = attestation_message(&root, &id, 0x0102030405060708);
        assert!(msg.starts_with(ATTESTATION_DOMAIN_TAG));
        let body = &msg[ATTESTATION_DOMAIN_TAG.len()..];
        assert_eq!(&body[..32], root.as_bytes());
        assert_eq!(&body[32..48], &id);
        assert_eq!(&body[48..], &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_sign_checked() {
        let kp = Keypair::generate();
        let sig = kp.sign_checked(b"checked").unwrap();
        assert!(kp.public_key().verify(b"checked", &sig));
    }
}
