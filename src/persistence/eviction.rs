//! Background eviction for the durable call cache.
//!
//! Entries are kept forever unless a policy bound is configured. On each
//! tick the task drops entries idle longer than `max_age`, then trims the
//! least recently used beyond `max_entries`.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::cache_repo::CacheStore;

/// Which cache entries are eligible for removal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionPolicy {
    /// Maximum idle time, measured from last hit (or creation if never hit).
    pub max_age: Option<chrono::Duration>,
    /// Maximum number of retained entries.
    pub max_entries: Option<u32>,
}

impl EvictionPolicy {
    /// Whether the policy never removes anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.max_age.is_none() && self.max_entries.is_none()
    }
}

/// Outcome of one prune pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneStats {
    /// Rows deleted in this pass.
    pub deleted: u64,
    /// Rows left afterwards.
    pub remaining: u64,
}

/// Spawn the eviction background task.
///
/// Returns `None` when `policy` is empty; nothing would ever be pruned.
#[must_use]
pub fn spawn_eviction_task(
    store: CacheStore,
    policy: EvictionPolicy,
    every: Duration,
    cancel: CancellationToken,
) -> Option<JoinHandle<()>> {
    if policy.is_empty() {
        info!("cache eviction disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("eviction task shutting down");
                    break;
                }
                _ = interval.tick() => {
                    match store.prune(&policy).await {
                        Ok(stats) => info!(
                            deleted = stats.deleted,
                            remaining = stats.remaining,
                            "cache prune completed"
                        ),
                        Err(err) => error!(?err, "cache prune failed"),
                    }
                }
            }
        }
    }))
}
