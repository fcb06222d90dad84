//! Account addresses: the trailing 20 bytes of `keccak256` of an uncompressed
//! secp256k1 public key, following `examples/original_source/state/tx.go`'s
//! `elliptic.Marshal` + `Keccak256` + `[12:]` derivation.

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;

/// 20-byte account identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        let mut out = [0u8; 20];
        let n = bytes.len().min(20);
        out[..n].copy_from_slice(&bytes[..n]);
        Ok(Address(out))
    }

    /// Derives the address from an uncompressed secp256k1 public key point
    /// (65 bytes, leading `0x04` tag included).
    pub fn from_uncompressed_pubkey(pubkey_uncompressed: &[u8]) -> Self {
        debug_assert_eq!(pubkey_uncompressed.len(), 65);
        debug_assert_eq!(pubkey_uncompressed[0], 0x04);
        let digest = Keccak256::digest(&pubkey_uncompressed[1..]);
        let mut out = [0u8; 20];
        out.copy_from_slice(&digest[12..]);
        Address(out)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Address::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

impl std::str::FromStr for Address {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_hex(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let a = Address([7u8; 20]);
        let s = a.to_hex();
        assert!(s.starts_with("0x"));
        assert_eq!(Address::from_hex(&s).unwrap(), a);
    }

    #[test]
    fn serde_round_trip() {
        let a = Address([9u8; 20]);
        let json = serde_json::to_string(&a).unwrap();
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(a, back);
    }
}
