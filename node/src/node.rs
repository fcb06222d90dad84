//! Top-level node composition: wires state, mempool, network and RPC into
//! one running process (`spec.md` §4.G-§4.I, §6's data-directory layout).
//! Grounded on `examples/original_source/node/node.go`'s `Node` struct and
//! `examples/Counselco-chronx/crates/chronx-node/src/main.rs`'s startup
//! sequence (state db -> genesis if fresh -> P2P -> RPC -> main loop).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use obscura_core::address::Address;
use obscura_core::config::Config;
use obscura_core::genesis::{self, Genesis};
use obscura_core::mempool::Mempool;
use obscura_core::state::State;
use obscura_network::{Multiaddr, NetworkDriver};
use obscura_rpc::server::{RpcServer, RpcServerState};

use crate::scheduler::{self, MiningCoordinator};
use crate::sync;

/// Everything needed to start one Obscura full node.
pub struct NodeConfig {
    pub data_dir: PathBuf,
    pub chain_id: String,
    pub p2p_listen: Multiaddr,
    pub bootstrap_peers: Vec<Multiaddr>,
    pub rpc_addr: SocketAddr,
    /// The account this node mines to and signs `AddTransaction` submissions
    /// with; must already exist in `<data_dir>/keystore/`.
    pub node_account: Address,
    pub genesis: Genesis,
    pub config: Config,
}

/// Runs startup (genesis, state replay, network, RPC) and then the node's
/// always-on tasks (`spec.md` §5) until the process receives a shutdown
/// signal.
pub async fn run(cfg: NodeConfig) -> anyhow::Result<()> {
    info!(chain_id = %cfg.chain_id, "obscura node starting");

    genesis::initialise(&cfg.data_dir, &cfg.chain_id, &cfg.genesis)
        .context("initialising genesis/data directory")?;
    let genesis_catalogue = genesis::load(&cfg.data_dir, &cfg.chain_id)
        .context("loading genesis")?
        .into_catalogue();

    let block_db = genesis::block_db_path(&cfg.data_dir, &cfg.chain_id);
    let state = Arc::new(RwLock::new(
        State::load(cfg.data_dir.clone(), block_db, genesis_catalogue, &cfg.config)
            .context("replaying block log")?,
    ));

    let mempool = Arc::new(Mutex::new(Mempool::new()));
    {
        let guard = state.read().await;
        mempool
            .lock()
            .await
            .sync_committed(guard.catalogue(), guard.nonce_committed());
    }

    let (driver, network, incoming_pulls, dialed_peers) =
        NetworkDriver::new(&cfg.chain_id, cfg.p2p_listen.clone(), &cfg.bootstrap_peers)
            .map_err(|e| anyhow::anyhow!("building network: {e}"))?;
    tokio::spawn(driver.run());

    let coordinator = Arc::new(MiningCoordinator::new());

    let (pending_tx_topic, new_blocks_topic) = sync::join_gossip_topics(
        &network,
        Arc::clone(&state),
        Arc::clone(&mempool),
        Arc::clone(&coordinator),
        cfg.config.topic_buffer_size,
    )
    .await
    .map_err(|e| anyhow::anyhow!("joining gossip topics: {e}"))?;

    tokio::spawn(sync::run_pull_responder(
        incoming_pulls,
        network.clone(),
        Arc::clone(&state),
        Arc::clone(&mempool),
        Arc::clone(&coordinator),
    ));
    tokio::spawn(sync::run_dial_handshake(
        dialed_peers,
        network.clone(),
        Arc::clone(&state),
    ));

    tokio::spawn(scheduler::run(
        Arc::clone(&state),
        Arc::clone(&mempool),
        Arc::clone(&coordinator),
        new_blocks_topic.clone(),
        cfg.node_account,
        cfg.config.mine_interval,
    ));

    let mut joined_topics = HashMap::new();
    joined_topics.insert(sync::PENDING_TX_TOPIC.to_string(), pending_tx_topic);
    joined_topics.insert(sync::NEW_BLOCKS_TOPIC.to_string(), new_blocks_topic);

    let rpc_state = Arc::new(RpcServerState {
        state,
        mempool,
        network,
        data_dir: cfg.data_dir.clone(),
        node_account: cfg.node_account,
        joined_topics: Mutex::new(joined_topics),
        topic_buffer_size: cfg.config.topic_buffer_size,
    });
    let _rpc_handle = RpcServer::new(rpc_state)
        .start(cfg.rpc_addr)
        .await
        .context("starting RPC server")?;

    info!(addr = %cfg.rpc_addr, "node ready");
    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutting down");
    Ok(())
}
