pub mod behaviour;
pub mod pull;
pub mod swarm;
pub mod topic;

pub use libp2p::multiaddr::Protocol;
pub use libp2p::{Multiaddr, PeerId};
pub use pull::PullPayload;
pub use swarm::{IncomingPullRequest, NetworkDriver, NetworkHandle, PullKind};
pub use topic::{TopicHandle, TopicInbox};
