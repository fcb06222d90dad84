//! Combined libp2p network behaviour: gossipsub for the topic fabric
//! (`spec.md` §4.H.1/§4.H.2 and user channel topics) plus request_response
//! for the pull-stream protocols (`spec.md` §4.H.3-ish / §6). Grounded on
//! `examples/Counselco-chronx/crates/chronx-p2p/src/network.rs`'s
//! `ChronxBehaviour`, the pack's only real `#[derive(NetworkBehaviour)]`
//! composition.

use crate::pull::PullBehaviour;
use libp2p::request_response;
use libp2p::{gossipsub, identify, swarm::NetworkBehaviour};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

#[derive(NetworkBehaviour)]
pub struct ObscuraBehaviour {
    pub gossipsub: gossipsub::Behaviour,
    pub identify: identify::Behaviour,
    pub announce: PullBehaviour,
    pub blocks: PullBehaviour,
    pub pending_txs: PullBehaviour,
}

/// Builds the gossipsub sub-behaviour with the message-authenticity and
/// validation settings `chronx-p2p` uses. Topics are joined dynamically at
/// runtime via [`crate::topic`] rather than subscribed up front — channel
/// topics in particular are created from tx hashes the node doesn't know
/// about until a `Channel` transaction is observed.
pub fn build_gossipsub(keypair: &libp2p::identity::Keypair) -> Result<gossipsub::Behaviour, String> {
    let message_id_fn = |msg: &gossipsub::Message| {
        let mut s = DefaultHasher::new();
        msg.data.hash(&mut s);
        gossipsub::MessageId::from(s.finish().to_string())
    };

    let config = gossipsub::ConfigBuilder::default()
        .heartbeat_interval(Duration::from_secs(1))
        .validation_mode(gossipsub::ValidationMode::Strict)
        .message_id_fn(message_id_fn)
        .build()
        .map_err(|e| e.to_string())?;

    gossipsub::Behaviour::new(gossipsub::MessageAuthenticity::Signed(keypair.clone()), config)
        .map_err(|e| e.to_string())
}

/// Builds the three pull-stream sub-behaviours named in `spec.md` §6.
pub fn build_pull_behaviours(chain_id: &str) -> (PullBehaviour, PullBehaviour, PullBehaviour) {
    let [announce_id, blocks_id, pending_txs_id] = crate::pull::protocol_ids(chain_id);
    let cfg = request_response::Config::default();
    (
        request_response::Behaviour::new(
            [(announce_id, request_response::ProtocolSupport::Full)],
            cfg.clone(),
        ),
        request_response::Behaviour::new(
            [(blocks_id, request_response::ProtocolSupport::Full)],
            cfg.clone(),
        ),
        request_response::Behaviour::new(
            [(pending_txs_id, request_response::ProtocolSupport::Full)],
            cfg,
        ),
    )
}
