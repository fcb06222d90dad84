//! Consensus and runtime configuration for **Obscura** core.
//!
//! The [`Config`] struct centralises tunable parameters such as the PoW
//! difficulty and the mining/reward schedule (`spec.md` §4.C, §4.F, §4.G,
//! §9). It is constructed via the [`ConfigBuilder`] using the fluent builder
//! pattern, enabling callers to customise only the fields they care about
//! while keeping sensible defaults.
//!
//! All fields are `pub` so read-only access is ergonomic, however mutation
//! should occur through the builder to preserve validation invariants.
//!
//! ```
//! use obscura_core::config::Config;
//!
//! let cfg = Config::default();
//! assert_eq!(cfg.leading_zero_nibbles, 4);
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Runtime configuration shared across the crate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Chain identifier; namespaces the data directory and pub/sub topics
    /// (`spec.md` §6).
    pub chain_id: String,

    /// Number of leading hex nibbles a block hash must zero out to satisfy
    /// [`crate::pow::is_pow_valid`]. `spec.md` §9 resolves the source's
    /// contradictory predicates to four zero nibbles with a non-zero fifth.
    pub leading_zero_nibbles: usize,

    /// Fixed subsidy credited to a block's miner (`spec.md` §9: the
    /// reference value is `10.0`, not the `100` seen in some source
    /// revisions).
    pub block_reward: f32,

    /// How often the mining tick fires when the mempool is non-empty
    /// (`spec.md` §4.G names a 15-45s range and asks implementations to
    /// pick and document a constant).
    pub mine_interval: Duration,

    /// Capacity of each pub/sub topic's bounded channel (`spec.md` §9).
    pub topic_buffer_size: usize,

    /// Capacity of the local `new-pending-out` channel (`spec.md` §9).
    pub pending_out_buffer_size: usize,

    /// RPC listen port offset from the main p2p port (`spec.md` §6).
    pub rpc_port_offset: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chain_id: "obscura-main".into(),
            leading_zero_nibbles: 4,
            block_reward: 10.0,
            mine_interval: Duration::from_secs(20),
            topic_buffer_size: 128,
            pending_out_buffer_size: 10_000,
            rpc_port_offset: 1000,
        }
    }
}

/// Fluent builder for [`Config`].
pub struct ConfigBuilder {
    inner: Config,
}

impl ConfigBuilder {
    /// Starts a new builder pre-populated with [`Config::default`].
    pub fn new() -> Self {
        Self {
            inner: Config::default(),
        }
    }

    pub fn chain_id<S: Into<String>>(mut self, id: S) -> Self {
        self.inner.chain_id = id.into();
        self
    }

    pub fn block_reward(mut self, reward: f32) -> Self {
        self.inner.block_reward = reward;
        self
    }

    pub fn mine_interval(mut self, interval: Duration) -> Self {
        self.inner.mine_interval = interval;
        self
    }

    pub fn rpc_port_offset(mut self, offset: u16) -> Self {
        self.inner.rpc_port_offset = offset;
        self
    }

    /// Consumes the builder returning an immutable configuration value.
    pub fn finish(self) -> Config {
        self.inner
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_fields() {
        let cfg = ConfigBuilder::new()
            .chain_id("obscura-test")
            .block_reward(25.0)
            .mine_interval(Duration::from_secs(5))
            .finish();
        assert_eq!(cfg.chain_id, "obscura-test");
        assert_eq!(cfg.block_reward, 25.0);
        assert_eq!(cfg.mine_interval, Duration::from_secs(5));
    }

    #[test]
    fn default_matches_reference_policy() {
        let cfg = Config::default();
        assert_eq!(cfg.leading_zero_nibbles, 4);
        assert_eq!(cfg.block_reward, 10.0);
        assert_eq!(cfg.rpc_port_offset, 1000);
    }
}
