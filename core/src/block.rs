//! Block & header model, and the proof-of-work-gated block hash
//! (`spec.md` §3, §4.C).

use crate::address::Address;
use crate::hash::{json_object, CanonicalJson, Hash};
use crate::tx::SignedTransaction;
use serde::{Deserialize, Serialize};

/// Block header. `pow` is the attempt count that succeeded and doubles as a
/// deterministic tie-break between competing blocks at the same height
/// (`spec.md` §4.E's equal-height competition rule).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub parent: Hash,
    pub time: u64,
    pub number: u64,
    pub nonce: u32,
    pub miner: Address,
    pub pow: u32,
}

/// A header plus its ordered transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub txs: Vec<SignedTransaction>,
}

impl CanonicalJson for BlockHeader {
    fn to_canonical_value(&self) -> serde_json::Value {
        json_object(vec![
            ("parent", serde_json::to_value(self.parent).unwrap()),
            ("time", self.time.into()),
            ("number", self.number.into()),
            ("nonce", self.nonce.into()),
            ("miner", serde_json::to_value(self.miner).unwrap()),
            ("pow", self.pow.into()),
        ])
    }
}

impl CanonicalJson for Block {
    fn to_canonical_value(&self) -> serde_json::Value {
        let txs: Vec<serde_json::Value> = self
            .txs
            .iter()
            .map(|tx| serde_json::to_value(tx).expect("SignedTransaction always serialises"))
            .collect();
        json_object(vec![
            ("header", self.header.to_canonical_value()),
            ("txs", serde_json::Value::Array(txs)),
        ])
    }
}

impl Block {
    /// `sha256(canonical-JSON(block))`. Two equal block values produce equal
    /// hashes (`spec.md` §3's `Block` invariant).
    pub fn hash(&self) -> Hash {
        self.canonical_hash()
    }

    /// Sorts `txs` by timestamp ascending, ties broken by nonce ascending,
    /// then by transaction hash — the deterministic replay order
    /// `apply_block` requires (`spec.md` §4.E step 4).
    pub fn sort_txs_for_apply(&mut self) {
        self.txs.sort_by(|a, b| {
            a.tx.timestamp
                .cmp(&b.tx.timestamp)
                .then_with(|| a.tx.nonce.cmp(&b.tx.nonce))
                .then_with(|| a.hash().cmp(&b.hash()))
        });
    }
}

/// A record as written to the append-only block log, one JSON object per
/// line. The on-disk shape is the exact legacy layout named in `spec.md`
/// §6 — `hash`/`block.Header`/`block.TXs`, with `proof_of_work` spelled out
/// in full inside the header — which is why this has hand-written
/// (de)serialisation instead of a derive: it deliberately does not match
/// [`BlockHeader`]'s own field names or [`CanonicalJson`] encoding, which
/// stay lowercase/abbreviated for the hash contract.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockRecord {
    pub key: Hash,
    pub value: Block,
}

impl BlockRecord {
    pub fn for_block(block: Block) -> Self {
        let key = block.hash();
        BlockRecord { key, value: block }
    }
}

impl Serialize for BlockRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let header = &self.value.header;
        let txs: Vec<serde_json::Value> = self
            .value
            .txs
            .iter()
            .map(|tx| serde_json::to_value(tx).expect("SignedTransaction always serialises"))
            .collect();
        let block_value = json_object(vec![
            (
                "Header",
                json_object(vec![
                    ("parent", serde_json::to_value(header.parent).unwrap()),
                    ("time", header.time.into()),
                    ("number", header.number.into()),
                    ("nonce", header.nonce.into()),
                    ("miner", serde_json::to_value(header.miner).unwrap()),
                    ("proof_of_work", header.pow.into()),
                ]),
            ),
            ("TXs", serde_json::Value::Array(txs)),
        ]);
        let value = json_object(vec![
            ("hash", serde_json::to_value(self.key).unwrap()),
            ("block", block_value),
        ]);
        value.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BlockRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        let key: Hash = serde_json::from_value(
            value
                .get("hash")
                .cloned()
                .ok_or_else(|| serde::de::Error::missing_field("hash"))?,
        )
        .map_err(serde::de::Error::custom)?;
        let block = value
            .get("block")
            .ok_or_else(|| serde::de::Error::missing_field("block"))?;
        let header_value = block
            .get("Header")
            .ok_or_else(|| serde::de::Error::missing_field("Header"))?;
        let parent: Hash = serde_json::from_value(
            header_value
                .get("parent")
                .cloned()
                .ok_or_else(|| serde::de::Error::missing_field("parent"))?,
        )
        .map_err(serde::de::Error::custom)?;
        let miner: Address = serde_json::from_value(
            header_value
                .get("miner")
                .cloned()
                .ok_or_else(|| serde::de::Error::missing_field("miner"))?,
        )
        .map_err(serde::de::Error::custom)?;
        let time = header_value
            .get("time")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| serde::de::Error::missing_field("time"))?;
        let number = header_value
            .get("number")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| serde::de::Error::missing_field("number"))?;
        let nonce = header_value
            .get("nonce")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| serde::de::Error::missing_field("nonce"))? as u32;
        let pow = header_value
            .get("proof_of_work")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| serde::de::Error::missing_field("proof_of_work"))?
            as u32;
        let txs_value = block
            .get("TXs")
            .and_then(|v| v.as_array())
            .ok_or_else(|| serde::de::Error::missing_field("TXs"))?;
        let txs = txs_value
            .iter()
            .map(|v| serde_json::from_value::<SignedTransaction>(v.clone()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(serde::de::Error::custom)?;

        Ok(BlockRecord {
            key,
            value: Block {
                header: BlockHeader {
                    parent,
                    time,
                    number,
                    nonce,
                    miner,
                    pow,
                },
                txs,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PrivateKey;
    use crate::tx::{Transaction, TxPayload};

    fn sample_tx(key: &PrivateKey, nonce: u64, timestamp: u64) -> SignedTransaction {
        Transaction {
            author: key.address(),
            nonce,
            timestamp,
            payload: TxPayload::Transfer {
                recipient: Address([9u8; 20]),
                amount: 1.0,
            },
        }
        .sign(key)
    }

    fn sample_block(key: &PrivateKey, number: u64, txs: Vec<SignedTransaction>) -> Block {
        Block {
            header: BlockHeader {
                parent: Hash::ZERO,
                time: 1,
                number,
                nonce: 0,
                miner: key.address(),
                pow: 1,
            },
            txs,
        }
    }

    #[test]
    fn equal_blocks_hash_equal() {
        let key = PrivateKey::generate();
        let a = sample_block(&key, 1, vec![sample_tx(&key, 1, 10)]);
        let b = a.clone();
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn differing_nonce_changes_hash() {
        let key = PrivateKey::generate();
        let mut a = sample_block(&key, 1, vec![]);
        let b_hash = a.hash();
        a.header.nonce += 1;
        assert_ne!(a.hash(), b_hash);
    }

    #[test]
    fn sort_txs_orders_by_timestamp_then_nonce() {
        let key = PrivateKey::generate();
        let mut block = sample_block(
            &key,
            1,
            vec![
                sample_tx(&key, 2, 20),
                sample_tx(&key, 1, 10),
                sample_tx(&key, 3, 10),
            ],
        );
        block.sort_txs_for_apply();
        let timestamps: Vec<u64> = block.txs.iter().map(|t| t.tx.timestamp).collect();
        assert_eq!(timestamps, vec![10, 10, 20]);
        assert_eq!(block.txs[0].tx.nonce, 1);
        assert_eq!(block.txs[1].tx.nonce, 3);
    }

    #[test]
    fn block_record_round_trips() {
        let key = PrivateKey::generate();
        let block = sample_block(&key, 1, vec![sample_tx(&key, 1, 10)]);
        let record = BlockRecord::for_block(block.clone());
        let json = serde_json::to_string(&record).unwrap();
        let back: BlockRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.key, record.key);
        assert_eq!(back.value.hash(), block.hash());
    }
}
