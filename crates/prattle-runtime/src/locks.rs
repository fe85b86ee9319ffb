use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex as TokioMutex, OwnedMutexGuard};

use prattle_core::ChannelId;

type LockMap = DashMap<ChannelId, Arc<TokioMutex<()>>>;

/// Per-channel run locks.
///
/// Holding a channel's guard for a whole message keeps the markov and
/// knowledge read-modify-write cycles of that channel from interleaving.
/// Different channels never contend. A channel's entry is dropped once the
/// last guard is released and nobody is waiting on it.
#[derive(Clone, Default)]
pub struct ChannelLocks {
    locks: Arc<LockMap>,
}

/// Exclusive access to one channel, released on drop.
pub struct ChannelGuard {
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockMap>,
    channel: ChannelId,
}

impl ChannelLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `channel`.
    pub async fn lock(&self, channel: &str) -> ChannelGuard {
        // Cloned under the shard lock, so a concurrent release sees the extra
        // reference and keeps the entry.
        let lock = Arc::clone(
            self.locks
                .entry(channel.to_string())
                .or_insert_with(|| Arc::new(TokioMutex::new(())))
                .value(),
        );
        ChannelGuard {
            guard: Some(lock.lock_owned().await),
            locks: Arc::clone(&self.locks),
            channel: channel.to_string(),
        }
    }

    /// Number of channels currently locked or waited on.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl ChannelGuard {
    pub fn channel(&self) -> &str {
        &self.channel
    }
}

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        // Release first so the map holds the only reference when idle
        drop(self.guard.take());
        self.locks
            .remove_if(&self.channel, |_, lock| Arc::strong_count(lock) == 1);
    }
}
