//! Gossip topic wiring and the on-connect pull handshake (`spec.md` §4.H).
//! Grounded on `examples/original_source/node/pending_tx_exchange.go` and
//! `new_block_exchange.go`'s Join/readLoop pattern (self-delivery filtering
//! already happens inside `obscura_network::swarm::NetworkDriver`, so the
//! readers here only ever see remote deliveries) and on `sync.go`'s
//! `doSync` pull exchange, reshaped around `obscura_network`'s
//! `IncomingPullRequest`/`PullKind` primitives.

use std::sync::Arc;

use obscura_core::block::{Block, BlockRecord};
use obscura_core::error::NetworkError;
use obscura_core::hash::Hash;
use obscura_core::mempool::Mempool;
use obscura_core::state::{AddBlockOutcome, State};
use obscura_core::tx::SignedTransaction;
use obscura_network::{IncomingPullRequest, NetworkHandle, PeerId, PullKind, PullPayload, TopicHandle};
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, warn};

use crate::scheduler::MiningCoordinator;

/// Payload: canonical-JSON of `SignedTransaction` (`spec.md` §4.H.1).
pub const PENDING_TX_TOPIC: &str = "obscura/pending-tx/1";
/// Payload: canonical-JSON of `Block` (`spec.md` §4.H.2).
pub const NEW_BLOCKS_TOPIC: &str = "obscura/new-blocks/1";

/// Joins both always-on gossip topics, spawning one reader task per topic,
/// and returns their [`TopicHandle`]s so the mine-tick loop and RPC layer
/// can publish locally-originated items onto them (`spec.md` §4.H.1/.2's
/// "locally-admitted/locally-mined transactions are forwarded on the
/// outbox").
pub async fn join_gossip_topics(
    network: &NetworkHandle,
    state: Arc<RwLock<State>>,
    mempool: Arc<Mutex<Mempool>>,
    coordinator: Arc<MiningCoordinator>,
    topic_buffer_size: usize,
) -> Result<(TopicHandle, TopicHandle), NetworkError> {
    let (pending_tx_handle, mut pending_tx_inbox) =
        network.join(PENDING_TX_TOPIC, topic_buffer_size).await?;
    let (new_blocks_handle, mut new_blocks_inbox) =
        network.join(NEW_BLOCKS_TOPIC, topic_buffer_size).await?;

    {
        let mempool = Arc::clone(&mempool);
        tokio::spawn(async move {
            while let Some(bytes) = pending_tx_inbox.recv().await {
                match serde_json::from_slice::<SignedTransaction>(&bytes) {
                    Ok(signed) => {
                        if let Err(e) = mempool.lock().await.admit_pending(signed) {
                            debug!(error = %e, "rejected gossip-received transaction");
                        }
                    }
                    Err(e) => warn!(error = %e, "undecodable pending-tx gossip message"),
                }
            }
        });
    }

    {
        let state = Arc::clone(&state);
        let mempool = Arc::clone(&mempool);
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            while let Some(bytes) = new_blocks_inbox.recv().await {
                match serde_json::from_slice::<Block>(&bytes) {
                    Ok(block) => apply_synced_block(&state, &mempool, &coordinator, block).await,
                    Err(e) => warn!(error = %e, "undecodable new-block gossip message"),
                }
            }
        });
    }

    Ok((pending_tx_handle, new_blocks_handle))
}

/// Feeds one block received from the fabric (gossip or pull) to
/// `add_block`, cancelling any in-flight local mining attempt and
/// resyncing the mempool's shadow view if it lands (`spec.md` §4.G's
/// "Synced-block handler").
async fn apply_synced_block(
    state: &Arc<RwLock<State>>,
    mempool: &Arc<Mutex<Mempool>>,
    coordinator: &Arc<MiningCoordinator>,
    block: Block,
) {
    let tx_hashes: Vec<Hash> = block.txs.iter().map(|tx| tx.hash()).collect();
    let outcome = {
        let mut guard = state.write().await;
        guard.add_block(block)
    };
    match outcome {
        AddBlockOutcome::Accepted { hash } => {
            coordinator.cancel_current();
            let guard = state.read().await;
            let mut pool = mempool.lock().await;
            pool.archive(tx_hashes);
            pool.sync_committed(guard.catalogue(), guard.nonce_committed());
            debug!(%hash, "synced block accepted");
        }
        AddBlockOutcome::Duplicate | AddBlockOutcome::Orphaned => {}
        AddBlockOutcome::Rejected(e) => warn!(error = %e, "synced block rejected"),
        AddBlockOutcome::StorageFailure(e) => {
            warn!(error = %e, "storage failure applying synced block, node is now read-only")
        }
    }
}

/// Answers every inbound pull-stream request (`spec.md` §4.H.3). Runs for
/// the lifetime of the node on its own task.
///
/// The three `PullKind`s play two distinct roles on this side of the wire:
/// an `Announce` request carries a peer's `latest-hash` and is answered
/// with an empty ack, after which this node turns around and *originates*
/// its own `Blocks`/`PendingTxs` requests back at that peer (handled by
/// [`NetworkHandle::send_pull`] below). A `Blocks`/`PendingTxs` request
/// arriving here is the other side of that same exchange initiated by a
/// peer we previously announced to — its payload is applied locally and
/// acknowledged with an empty ack.
pub async fn run_pull_responder(
    mut incoming: mpsc::Receiver<IncomingPullRequest>,
    network: NetworkHandle,
    state: Arc<RwLock<State>>,
    mempool: Arc<Mutex<Mempool>>,
    coordinator: Arc<MiningCoordinator>,
) {
    while let Some(request) = incoming.recv().await {
        let IncomingPullRequest {
            peer,
            protocol,
            payload,
            response_id,
        } = request;

        let _ = network.respond(response_id, PullPayload(Vec::new())).await;

        match protocol {
            PullKind::Announce => handle_announce(&network, &state, &mempool, peer, payload).await,
            PullKind::Blocks => handle_blocks(&state, &mempool, &coordinator, peer, payload).await,
            PullKind::PendingTxs => handle_pending_txs(&mempool, peer, payload).await,
        }
    }
}

async fn handle_announce(
    network: &NetworkHandle,
    state: &Arc<RwLock<State>>,
    mempool: &Arc<Mutex<Mempool>>,
    peer: PeerId,
    payload: PullPayload,
) {
    let hash_hex = String::from_utf8_lossy(&payload.0).trim().to_string();
    let start_hash = match Hash::from_hex(&hash_hex) {
        Ok(h) => h,
        Err(e) => {
            warn!(error = %e, %peer, "unparsable announce hash");
            return;
        }
    };

    let blocks = {
        let guard = state.read().await;
        guard.blocks_after(&start_hash)
    };
    let blocks = match blocks {
        Ok(b) => b,
        Err(e) => {
            warn!(error = %e, %peer, "blocks_after failed");
            return;
        }
    };
    if !blocks.is_empty() {
        if let Ok(bytes) = serde_json::to_vec(&blocks) {
            if let Err(e) = network.send_pull(peer, PullKind::Blocks, PullPayload(bytes)).await {
                debug!(error = %e, %peer, "failed to push blocks to peer");
            }
        }
    }

    let pending_snapshot = mempool.lock().await.snapshot_pending();
    if !pending_snapshot.is_empty() {
        if let Ok(bytes) = serde_json::to_vec(&pending_snapshot) {
            if let Err(e) = network
                .send_pull(peer, PullKind::PendingTxs, PullPayload(bytes))
                .await
            {
                debug!(error = %e, %peer, "failed to push pending txs to peer");
            }
        }
    }
}

/// Applies blocks in received order, matching the sender's file order
/// (`spec.md` §4.H.3's ordering guarantee); a block whose height is already
/// known is simply orphaned/duplicated by `add_block` and skipped.
async fn handle_blocks(
    state: &Arc<RwLock<State>>,
    mempool: &Arc<Mutex<Mempool>>,
    coordinator: &Arc<MiningCoordinator>,
    peer: PeerId,
    payload: PullPayload,
) {
    match serde_json::from_slice::<Vec<BlockRecord>>(&payload.0) {
        Ok(records) => {
            for record in records {
                apply_synced_block(state, mempool, coordinator, record.value).await;
            }
        }
        Err(e) => warn!(error = %e, %peer, "unparsable blocks payload"),
    }
}

async fn handle_pending_txs(mempool: &Arc<Mutex<Mempool>>, peer: PeerId, payload: PullPayload) {
    match serde_json::from_slice::<Vec<SignedTransaction>>(&payload.0) {
        Ok(txs) => {
            let mut pool = mempool.lock().await;
            for tx in txs {
                if let Err(e) = pool.admit_pending(tx) {
                    debug!(error = %e, %peer, "rejected pulled pending tx");
                }
            }
        }
        Err(e) => warn!(error = %e, %peer, "unparsable pending-txs payload"),
    }
}

/// Opens the dialling side of the on-connect handshake for every peer this
/// node successfully dials (`spec.md` §4.H.3: "the dialling side opens an
/// Announce stream and writes its current latest-hash"). Runs for the
/// lifetime of the node on its own task.
pub async fn run_dial_handshake(
    mut dialed_peers: mpsc::Receiver<PeerId>,
    network: NetworkHandle,
    state: Arc<RwLock<State>>,
) {
    while let Some(peer) = dialed_peers.recv().await {
        let latest_hash = state.read().await.latest_hash().to_hex();
        if let Err(e) = network
            .send_pull(peer, PullKind::Announce, PullPayload(latest_hash.into_bytes()))
            .await
        {
            debug!(error = %e, %peer, "announce handshake failed");
        }
    }
}
