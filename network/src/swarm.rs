//! Owns the libp2p [`Swarm`] and drives it on a dedicated task, dispatching
//! gossipsub deliveries to per-topic channels and exposing pull-stream
//! requests/responses on their own channels. Grounded on
//! `examples/Counselco-chronx/crates/chronx-p2p/src/network.rs`'s
//! `P2pNetwork::run` — one `tokio::select!` between outbound traffic and
//! `SwarmEvent`s, no per-message task spun up.

use crate::behaviour::{build_gossipsub, build_pull_behaviours, ObscuraBehaviour, ObscuraBehaviourEvent};
use crate::pull::PullPayload;
use crate::topic::{TopicHandle, TopicInbox};
use libp2p::request_response::{self, OutboundRequestId, ResponseChannel};
use libp2p::swarm::SwarmEvent;
use libp2p::{gossipsub, noise, tcp, yamux, Multiaddr, PeerId, Swarm};
use obscura_core::error::NetworkError;
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// One inbound pull-stream request the application must answer, via
/// [`NetworkDriver::respond`] keyed on `response_id`.
pub struct IncomingPullRequest {
    pub peer: PeerId,
    pub protocol: PullKind,
    pub payload: PullPayload,
    pub response_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullKind {
    Announce,
    Blocks,
    PendingTxs,
}

enum Command {
    PublishGossip(String, Vec<u8>),
    JoinTopic(String, usize, oneshot::Sender<(TopicHandle, TopicInbox)>),
    SendPull(PeerId, PullKind, PullPayload, oneshot::Sender<Result<PullPayload, NetworkError>>),
    Respond(u64, PullPayload),
}

/// Application-facing handle into the network driver.
#[derive(Clone)]
pub struct NetworkHandle {
    commands: mpsc::Sender<Command>,
}

impl NetworkHandle {
    /// Subscribes to `topic`, returning its outbound [`TopicHandle`] and an
    /// inbound channel delivering every remote message (`spec.md` §4.H's
    /// `join`).
    pub async fn join(&self, topic: impl Into<String>, buf_size: usize) -> Result<(TopicHandle, TopicInbox), NetworkError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::JoinTopic(topic.into(), buf_size, tx))
            .await
            .map_err(|_| NetworkError::StreamClosed)?;
        rx.await.map_err(|_| NetworkError::StreamClosed)
    }

    /// Sends a one-shot pull-stream request to `peer` and awaits its single
    /// response (`spec.md` §4.H / §6).
    pub async fn send_pull(
        &self,
        peer: PeerId,
        kind: PullKind,
        payload: PullPayload,
    ) -> Result<PullPayload, NetworkError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::SendPull(peer, kind, payload, tx))
            .await
            .map_err(|_| NetworkError::StreamClosed)?;
        rx.await.map_err(|_| NetworkError::StreamClosed)?
    }

    /// Answers a previously issued [`IncomingPullRequest`] by its
    /// `response_id` (`spec.md` §4.H.3). Routed through the command queue
    /// rather than a direct method on [`NetworkDriver`] since the driver
    /// runs on its own task once [`NetworkDriver::run`] has been spawned.
    pub async fn respond(&self, response_id: u64, payload: PullPayload) -> Result<(), NetworkError> {
        self.commands
            .send(Command::Respond(response_id, payload))
            .await
            .map_err(|_| NetworkError::StreamClosed)
    }
}

/// Owns the Swarm; run this on its own tokio task via [`NetworkDriver::run`].
pub struct NetworkDriver {
    swarm: Swarm<ObscuraBehaviour>,
    commands_tx: mpsc::Sender<Command>,
    commands_rx: mpsc::Receiver<Command>,
    topic_subs: HashMap<String, mpsc::Sender<Vec<u8>>>,
    pending_pulls: HashMap<OutboundRequestId, oneshot::Sender<Result<PullPayload, NetworkError>>>,
    incoming_pulls: mpsc::Sender<IncomingPullRequest>,
    pending_responses: HashMap<u64, (PullKind, ResponseChannel<PullPayload>)>,
    next_response_id: u64,
    dialed_peers: mpsc::Sender<PeerId>,
}

impl NetworkDriver {
    /// Builds a driver listening on `listen_addr`, scoped to `chain_id`'s
    /// pull-stream protocol IDs (`spec.md` §6), returning the driver, the
    /// [`NetworkHandle`], the channel new inbound pull requests arrive on,
    /// and a channel of peers this node has just dialled successfully — the
    /// trigger for the on-connect pull handshake (`spec.md` §4.H.3: "the
    /// dialling side opens an Announce stream").
    pub fn new(
        chain_id: &str,
        listen_addr: Multiaddr,
        bootstrap_peers: &[Multiaddr],
    ) -> Result<
        (
            Self,
            NetworkHandle,
            mpsc::Receiver<IncomingPullRequest>,
            mpsc::Receiver<PeerId>,
        ),
        NetworkError,
    > {
        let mut swarm = libp2p::SwarmBuilder::with_new_identity()
            .with_tokio()
            .with_tcp(tcp::Config::default(), noise::Config::new, yamux::Config::default)
            .map_err(|_| NetworkError::PeerUnreachable)?
            .with_behaviour(|key| {
                let gossipsub = build_gossipsub(key)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
                let identify = libp2p::identify::Behaviour::new(libp2p::identify::Config::new(
                    format!("/{chain_id}/id/1"),
                    key.public(),
                ));
                let (announce, blocks, pending_txs) = build_pull_behaviours(chain_id);
                Ok(ObscuraBehaviour {
                    gossipsub,
                    identify,
                    announce,
                    blocks,
                    pending_txs,
                })
            })
            .map_err(|_| NetworkError::PeerUnreachable)?
            .build();

        swarm
            .listen_on(listen_addr)
            .map_err(|_| NetworkError::PeerUnreachable)?;

        for addr in bootstrap_peers {
            if let Err(e) = swarm.dial(addr.clone()) {
                warn!(error = %e, %addr, "failed to dial bootstrap peer");
            }
        }

        let (commands_tx, commands_rx) = mpsc::channel(256);
        let (incoming_pulls_tx, incoming_pulls_rx) = mpsc::channel(256);
        let (dialed_peers_tx, dialed_peers_rx) = mpsc::channel(256);

        let driver = NetworkDriver {
            swarm,
            commands_tx: commands_tx.clone(),
            commands_rx,
            topic_subs: HashMap::new(),
            pending_pulls: HashMap::new(),
            incoming_pulls: incoming_pulls_tx,
            pending_responses: HashMap::new(),
            next_response_id: 0,
            dialed_peers: dialed_peers_tx,
        };
        let handle = NetworkHandle {
            commands: commands_tx,
        };
        Ok((driver, handle, incoming_pulls_rx, dialed_peers_rx))
    }

    /// Answers a previously issued [`IncomingPullRequest`] by its
    /// `response_id`. A request that's already timed out on the peer's side
    /// is silently dropped.
    pub fn respond(&mut self, response_id: u64, payload: PullPayload) {
        if let Some((kind, channel)) = self.pending_responses.remove(&response_id) {
            let behaviour = self.swarm.behaviour_mut();
            let result = match kind {
                PullKind::Announce => behaviour.announce.send_response(channel, payload),
                PullKind::Blocks => behaviour.blocks.send_response(channel, payload),
                PullKind::PendingTxs => behaviour.pending_txs.send_response(channel, payload),
            };
            if result.is_err() {
                debug!("pull response channel already closed");
            }
        }
    }

    /// Drives the swarm until its command channel closes. Run on a
    /// dedicated task (`tokio::spawn(driver.run())`).
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.commands_rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd),
                        None => return,
                    }
                }
                event = futures::StreamExt::select_next_some(&mut self.swarm) => {
                    self.handle_swarm_event(event);
                }
            }
        }
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::PublishGossip(topic, bytes) => {
                let ident = gossipsub::IdentTopic::new(topic);
                if let Err(e) = self.swarm.behaviour_mut().gossipsub.publish(ident, bytes) {
                    debug!(error = %e, "gossipsub publish failed");
                }
            }
            Command::JoinTopic(topic, buf_size, reply) => {
                let ident = gossipsub::IdentTopic::new(&topic);
                if let Err(e) = self.swarm.behaviour_mut().gossipsub.subscribe(&ident) {
                    warn!(error = %e, %topic, "gossipsub subscribe failed");
                }
                let (inbox_tx, inbox_rx) = mpsc::channel(buf_size);
                self.topic_subs.insert(topic.clone(), inbox_tx);

                // Every TopicHandle publishes by re-entering this same
                // command queue, so cloning `commands_tx` is enough — no
                // extra relay task needed.
                let outbox = self.commands_tx.clone();
                let (raw_tx, mut raw_rx) = mpsc::channel::<(String, Vec<u8>)>(buf_size);
                tokio::spawn(async move {
                    while let Some((topic, bytes)) = raw_rx.recv().await {
                        let _ = outbox.send(Command::PublishGossip(topic, bytes)).await;
                    }
                });
                let _ = reply.send((TopicHandle::new(topic, raw_tx), inbox_rx));
            }
            Command::SendPull(peer, kind, payload, reply) => {
                let request_id = match kind {
                    PullKind::Announce => self.swarm.behaviour_mut().announce.send_request(&peer, payload),
                    PullKind::Blocks => self.swarm.behaviour_mut().blocks.send_request(&peer, payload),
                    PullKind::PendingTxs => self.swarm.behaviour_mut().pending_txs.send_request(&peer, payload),
                };
                self.pending_pulls.insert(request_id, reply);
            }
            Command::Respond(response_id, payload) => {
                self.respond(response_id, payload);
            }
        }
    }

    fn handle_swarm_event(&mut self, event: SwarmEvent<ObscuraBehaviourEvent>) {
        match event {
            SwarmEvent::NewListenAddr { address, .. } => {
                info!(%address, "listening");
            }
            SwarmEvent::Behaviour(ObscuraBehaviourEvent::Gossipsub(gossipsub::Event::Message {
                message,
                propagation_source,
                ..
            })) => {
                let topic = message.topic.to_string();
                if let Some(tx) = self.topic_subs.get(&topic) {
                    let _ = tx.try_send(message.data);
                }
                debug!(peer = %propagation_source, %topic, "gossip message delivered");
            }
            SwarmEvent::Behaviour(ObscuraBehaviourEvent::Identify(
                libp2p::identify::Event::Received { peer_id, info, .. },
            )) => {
                for addr in info.listen_addrs {
                    self.swarm.add_peer_address(peer_id, addr);
                }
            }
            SwarmEvent::Behaviour(ObscuraBehaviourEvent::Announce(event)) => {
                self.handle_pull_event(PullKind::Announce, event);
            }
            SwarmEvent::Behaviour(ObscuraBehaviourEvent::Blocks(event)) => {
                self.handle_pull_event(PullKind::Blocks, event);
            }
            SwarmEvent::Behaviour(ObscuraBehaviourEvent::PendingTxs(event)) => {
                self.handle_pull_event(PullKind::PendingTxs, event);
            }
            SwarmEvent::ConnectionEstablished { peer_id, endpoint, .. } => {
                debug!(peer = %peer_id, "connection established");
                if endpoint.is_dialer() {
                    let _ = self.dialed_peers.try_send(peer_id);
                }
            }
            SwarmEvent::ConnectionClosed { peer_id, .. } => {
                debug!(peer = %peer_id, "connection closed");
            }
            _ => {}
        }
    }

    fn handle_pull_event(
        &mut self,
        kind: PullKind,
        event: request_response::Event<PullPayload, PullPayload>,
    ) {
        match event {
            request_response::Event::Message { peer, message, .. } => match message {
                request_response::Message::Request { request, channel, .. } => {
                    let id = self.next_response_id;
                    self.next_response_id += 1;
                    self.pending_responses.insert(id, (kind, channel));
                    let request = IncomingPullRequest {
                        peer,
                        protocol: kind,
                        payload: request,
                        response_id: id,
                    };
                    let _ = self.incoming_pulls.try_send(request);
                }
                request_response::Message::Response { request_id, response } => {
                    if let Some(reply) = self.pending_pulls.remove(&request_id) {
                        let _ = reply.send(Ok(response));
                    }
                }
            },
            request_response::Event::OutboundFailure { request_id, .. } => {
                if let Some(reply) = self.pending_pulls.remove(&request_id) {
                    let _ = reply.send(Err(NetworkError::DeadlineExceeded));
                }
            }
            request_response::Event::InboundFailure { .. } => {}
            request_response::Event::ResponseSent { .. } => {}
        }
    }
}
