//! Mine-tick loop (`spec.md` §4.G): a periodic timer that, when the mempool
//! is non-empty and no mining attempt is already in flight, snapshots
//! pending transactions and spawns a cancellable nonce search. Grounded on
//! `examples/original_source/node/miner.go`'s `Mine(ctx, pb)` loop, carried
//! over to `tokio::task::spawn_blocking` plus
//! `obscura_core::miner::CancelHandle` rather than a goroutine/context pair.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use obscura_core::address::Address;
use obscura_core::hash::CanonicalJson;
use obscura_core::mempool::Mempool;
use obscura_core::miner::{self, CancelHandle, MineOutcome, PendingBlock};
use obscura_core::state::{AddBlockOutcome, State};
use obscura_network::TopicHandle;
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

/// Shared cancellation coordinator between the mine-tick loop and the
/// synced-block handler in [`crate::sync`]: a peer's accepted block cancels
/// whatever local mining attempt is in flight (`spec.md` §4.G's
/// "Synced-block handler").
#[derive(Default)]
pub struct MiningCoordinator {
    is_mining: AtomicBool,
    cancel: Mutex<Option<CancelHandle>>,
}

impl MiningCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_mining(&self) -> bool {
        self.is_mining.load(Ordering::Acquire)
    }

    fn begin(&self) -> CancelHandle {
        self.is_mining.store(true, Ordering::Release);
        let handle = CancelHandle::new();
        *self.cancel.lock().unwrap() = Some(handle.clone());
        handle
    }

    fn finish(&self) {
        self.is_mining.store(false, Ordering::Release);
        *self.cancel.lock().unwrap() = None;
    }

    /// Cancels the in-flight mining attempt, a no-op if none is running.
    pub fn cancel_current(&self) {
        if let Some(handle) = self.cancel.lock().unwrap().as_ref() {
            handle.cancel();
        }
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Drives the mine-tick loop until the task is aborted (`spec.md` §4.G,
/// §5's always-on "Mine-tick" task). Runs on its own task.
pub async fn run(
    state: Arc<RwLock<State>>,
    mempool: Arc<AsyncMutex<Mempool>>,
    coordinator: Arc<MiningCoordinator>,
    new_blocks_topic: TopicHandle,
    miner_address: Address,
    mine_interval: Duration,
) {
    let mut ticker = interval(mine_interval);
    loop {
        ticker.tick().await;
        if coordinator.is_mining() {
            continue;
        }

        let pending_txs = {
            let pool = mempool.lock().await;
            if pool.is_empty() {
                continue;
            }
            pool.snapshot_pending()
        };

        let (parent, number) = {
            let guard = state.read().await;
            (guard.latest_hash(), guard.next_block_number())
        };

        let cancel = coordinator.begin();
        let pending = PendingBlock {
            parent,
            number,
            time: now_unix(),
            miner: miner_address,
            txs: pending_txs,
        };

        let outcome = tokio::task::spawn_blocking(move || miner::mine(pending, &cancel))
            .await
            .unwrap_or(MineOutcome::Cancelled);

        match outcome {
            MineOutcome::Mined(block) => {
                let mined_hashes: Vec<_> = block.txs.iter().map(|tx| tx.hash()).collect();
                let payload = block.to_canonical_bytes();
                let accepted = {
                    let mut guard = state.write().await;
                    guard.add_block(block)
                };
                match accepted {
                    AddBlockOutcome::Accepted { hash } => {
                        {
                            let guard = state.read().await;
                            let mut pool = mempool.lock().await;
                            pool.archive(mined_hashes);
                            pool.sync_committed(guard.catalogue(), guard.nonce_committed());
                        }
                        if let Err(e) = new_blocks_topic.publish(payload).await {
                            warn!(error = %e, "failed to publish mined block");
                        }
                        info!(%hash, "mined block accepted");
                    }
                    other => debug!(?other, "locally mined block not accepted"),
                }
            }
            MineOutcome::Cancelled => debug!("mining attempt cancelled"),
            MineOutcome::Empty => {}
        }

        coordinator.finish();
    }
}
