//! `RpcServer`/`RpcServerState`: the shared handles the RPC surface needs
//! (state, mempool, network, keystore) plus the jsonrpsee wiring that binds
//! `ObscuraApiServer` to an HTTP/WS listener. Grounded on
//! `chronx-rpc::server`'s `RpcServer::start` (permissive CORS via
//! `tower_http`, `ServerHandle` returned to the caller).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonrpsee::core::{async_trait, RpcResult, SubscriptionResult};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::{PendingSubscriptionSink, SubscriptionMessage};
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use obscura_core::address::Address;
use obscura_core::mempool::Mempool;
use obscura_core::state::State;
use obscura_core::tx::{Transaction, TxPayload};
use obscura_network::{NetworkHandle, TopicHandle};

use crate::api::ObscuraApiServer;
use crate::error;
use crate::types::{RpcBlockSummary, RpcChannelData, RpcNodeStatus};

/// Handles shared between the RPC server and the rest of the node
/// (`obscura-node` constructs one and owns its `Arc`).
pub struct RpcServerState {
    pub state: Arc<RwLock<State>>,
    pub mempool: Arc<Mutex<Mempool>>,
    pub network: NetworkHandle,
    pub data_dir: PathBuf,
    /// The account this node signs `AddTransaction` submissions with
    /// (`spec.md` §4.I: "signs using the node's keystore account").
    pub node_account: Address,
    /// Topics this node has joined, keyed by name, so `publish` can reject
    /// an unjoined topic with `NotSubscribed` (`spec.md` §4.I).
    pub joined_topics: Mutex<HashMap<String, TopicHandle>>,
    /// Buffer size used for every topic this server itself joins via
    /// `subscribe`, matching the sync-topic budget (`spec.md` §9).
    pub topic_buffer_size: usize,
}

pub struct RpcServer {
    state: Arc<RpcServerState>,
}

impl RpcServer {
    pub fn new(state: Arc<RpcServerState>) -> Self {
        RpcServer { state }
    }

    /// Starts the JSON-RPC server on `addr` with permissive CORS
    /// (`spec.md` §6: default listen port is the P2P port + 1000).
    pub async fn start(self, addr: SocketAddr) -> anyhow::Result<ServerHandle> {
        let cors = CorsLayer::new()
            .allow_methods(Any)
            .allow_origin(Any)
            .allow_headers(Any);

        let server = Server::builder()
            .set_http_middleware(tower::ServiceBuilder::new().layer(cors))
            .build(addr)
            .await?;

        let module = self.into_rpc();
        let handle = server.start(module);
        info!(%addr, "RPC server started");
        Ok(handle)
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[async_trait]
impl ObscuraApiServer for RpcServer {
    async fn get_node_status(&self) -> RpcResult<RpcNodeStatus> {
        let state = self.state.state.read().await;
        let account = state
            .catalogue()
            .get(&self.state.node_account)
            .cloned()
            .unwrap_or_default();

        Ok(RpcNodeStatus {
            address: self.state.node_account.to_hex(),
            balance: account.balance,
            owned_channels: account.owned_channels.into_iter().collect(),
            latest_hash: state.latest_hash().to_hex(),
            latest_number: state.next_block_number().saturating_sub(1),
        })
    }

    async fn list_blocks(
        &self,
        pending: PendingSubscriptionSink,
        from_block_hash: String,
    ) -> SubscriptionResult {
        let start_hash = obscura_core::hash::Hash::from_hex(&from_block_hash)
            .map_err(|e| anyhow::anyhow!("invalid block hash: {e}"))?;

        let records = {
            let state = self.state.state.read().await;
            state
                .blocks_after(&start_hash)
                .map_err(|e| anyhow::anyhow!(e.to_string()))?
        };

        let sink = pending.accept().await?;
        for record in &records {
            let summary = RpcBlockSummary::from(record);
            let msg = SubscriptionMessage::from_json(&summary)?;
            if sink.send(msg).await.is_err() {
                break;
            }
        }
        Ok(())
    }

    async fn add_transaction(&self, payload: TxPayload, password: String) -> RpcResult<()> {
        let committed_nonce = {
            let state = self.state.state.read().await;
            *state
                .nonce_committed()
                .get(&self.state.node_account)
                .unwrap_or(&0)
        };

        let tx = Transaction {
            author: self.state.node_account,
            nonce: committed_nonce + 1,
            timestamp: now_unix(),
            payload,
        };

        let signed = obscura_wallet::keystore::sign_tx_with_keystore_account(
            &self.state.data_dir,
            &self.state.node_account,
            &password,
            tx,
        )
        .map_err(error::wallet_error)?;

        {
            let mut mempool = self.state.mempool.lock().await;
            mempool
                .admit_pending(signed.clone())
                .map_err(error::validation_error)?;
        }

        if let Some(handle) = self
            .state
            .joined_topics
            .lock()
            .await
            .get(obscura_node_topics::PENDING_TX_TOPIC)
        {
            let bytes = serde_json::to_vec(&signed).unwrap_or_default();
            let _ = handle.publish(bytes).await;
        }

        Ok(())
    }

    async fn subscribe_topic(
        &self,
        pending: PendingSubscriptionSink,
        topic: String,
    ) -> SubscriptionResult {
        let (handle, mut inbox) = self
            .state
            .network
            .join(topic.clone(), self.state.topic_buffer_size)
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;

        self.state
            .joined_topics
            .lock()
            .await
            .insert(topic.clone(), handle);

        let sink = pending.accept().await?;
        while let Some(bytes) = inbox.recv().await {
            let data: serde_json::Value =
                serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
            let frame = RpcChannelData {
                topic: topic.clone(),
                data,
            };
            let msg = SubscriptionMessage::from_json(&frame)?;
            if sink.send(msg).await.is_err() {
                break;
            }
        }
        Ok(())
    }

    async fn publish(&self, topic: String, message: String) -> RpcResult<()> {
        let topics = self.state.joined_topics.lock().await;
        let handle = topics
            .get(&topic)
            .ok_or_else(|| error::not_subscribed(&topic))?;
        handle
            .publish(message.into_bytes())
            .await
            .map_err(error::network_error)?;
        Ok(())
    }
}

/// Well-known pub/sub topic names (`spec.md` §6). Duplicated here (rather
/// than imported from `obscura-node`, which depends on this crate) so
/// `add_transaction` can forward onto the pending-tx topic without a cyclic
/// dependency; `obscura-node` defines the same constant as the single
/// source of truth for the sync wiring.
mod obscura_node_topics {
    pub const PENDING_TX_TOPIC: &str = "obscura/pending-tx/1";
}
