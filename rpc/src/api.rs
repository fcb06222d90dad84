//! JSON-RPC 2.0 API definition (`spec.md` §4.I), namespace `obscura`.
//! Mirrors `chronx-rpc::api`'s `#[rpc(server, namespace = ...)]` shape;
//! `ListBlocks` and `Subscribe` are subscriptions rather than unary calls —
//! both stream an open-ended sequence of frames to the caller.

use jsonrpsee::core::{RpcResult, SubscriptionResult};
use jsonrpsee::proc_macros::rpc;
use obscura_core::tx::TxPayload;

use crate::types::RpcNodeStatus;

#[rpc(server, namespace = "obscura")]
pub trait ObscuraApi {
    /// This node's own account status (`spec.md` §4.I).
    #[method(name = "getNodeStatus")]
    async fn get_node_status(&self) -> RpcResult<RpcNodeStatus>;

    /// Streams every block after `from_block_hash` (hex, `"0x00..00"` for
    /// genesis) as a `blockSummary` notification, then completes.
    #[subscription(name = "listBlocks" => "blockSummary", item = crate::types::RpcBlockSummary)]
    async fn list_blocks(&self, from_block_hash: String) -> SubscriptionResult;

    /// Signs `payload` with this node's keystore account (unlocked by
    /// `password`) and admits the resulting transaction to the mempool.
    #[method(name = "addTransaction")]
    async fn add_transaction(&self, payload: TxPayload, password: String) -> RpcResult<()>;

    /// Joins `topic` and streams every inbound message as a `channelData`
    /// notification until the caller unsubscribes.
    #[subscription(name = "subscribe" => "channelData", item = crate::types::RpcChannelData)]
    async fn subscribe_topic(&self, topic: String) -> SubscriptionResult;

    /// Publishes `message` on `topic`. Fails with `NotSubscribed` unless
    /// this node has already joined `topic` via `subscribe` or its own
    /// internal sync wiring.
    #[method(name = "publish")]
    async fn publish(&self, topic: String, message: String) -> RpcResult<()>;
}
