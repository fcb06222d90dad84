//! The topic-based pub/sub abstraction `spec.md` §4.H names: `join` returns
//! a handle whose `publish` is fire-and-forget, and every delivery from a
//! remote peer is handed to the caller through a bounded channel (self-
//! delivered messages are filtered by [`crate::swarm::NetworkDriver`]
//! before they ever reach here).

use obscura_core::error::NetworkError;
use tokio::sync::mpsc;

/// A joined topic's outbound half. Cloning shares the same underlying
/// channel to the driver task, so multiple callers may publish onto one
/// topic concurrently.
#[derive(Clone)]
pub struct TopicHandle {
    topic: String,
    outbox: mpsc::Sender<(String, Vec<u8>)>,
}

impl TopicHandle {
    pub(crate) fn new(topic: String, outbox: mpsc::Sender<(String, Vec<u8>)>) -> Self {
        TopicHandle { topic, outbox }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Best-effort publish. A full outbox yields [`NetworkError::PublishDropped`]
    /// — the caller's `spec.md` §4.G contract is that the value simply stays
    /// in its owning map and gets retried on the next occasion to publish,
    /// not that this call blocks or retries itself.
    pub async fn publish(&self, bytes: Vec<u8>) -> Result<(), NetworkError> {
        self.outbox
            .try_send((self.topic.clone(), bytes))
            .map_err(|_| NetworkError::PublishDropped)
    }
}

/// The inbound half of a joined topic: one message per remote delivery,
/// self-delivered messages already filtered out.
pub type TopicInbox = mpsc::Receiver<Vec<u8>>;
