//! JSON-serializable shapes for the RPC surface (`spec.md` §4.I), distinct
//! from the on-disk/wire shapes in `obscura_core` so the two can evolve
//! independently — mirrors `chronx-rpc::types`'s `Rpc*` naming.

use obscura_core::block::BlockRecord;
use serde::{Deserialize, Serialize};

/// `GetNodeStatus` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcNodeStatus {
    pub address: String,
    pub balance: f32,
    pub owned_channels: Vec<String>,
    pub latest_hash: String,
    pub latest_number: u64,
}

/// One streamed item of `ListBlocks` (`spec.md` §4.I), a lighter view of a
/// [`BlockRecord`] than the full persisted record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcBlockSummary {
    pub hash: String,
    pub parent: String,
    pub number: u64,
    pub time: u64,
    pub miner: String,
    pub tx_count: usize,
}

impl From<&BlockRecord> for RpcBlockSummary {
    fn from(record: &BlockRecord) -> Self {
        RpcBlockSummary {
            hash: record.key.to_hex(),
            parent: record.value.header.parent.to_hex(),
            number: record.value.header.number,
            time: record.value.header.time,
            miner: record.value.header.miner.to_hex(),
            tx_count: record.value.txs.len(),
        }
    }
}

/// One frame delivered to a `Subscribe` stream (`spec.md` §4.I).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcChannelData {
    pub topic: String,
    pub data: serde_json::Value,
}
