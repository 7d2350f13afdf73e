//! Expired Record Sweep
//!
//! Garbage collection only: expiry is always re-checked on read, so a
//! missed or failed sweep never affects enforcement.

use std::sync::Arc;
use std::time::Duration;

use platform::clock::Clock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::cache::RateLimitCache;
use crate::domain::repository::RateLimitStore;
use crate::error::StoreResult;

/// Run one sweep over the store and the cache
///
/// Returns the number of store records deleted.
pub async fn sweep_once<S>(store: &S, cache: &RateLimitCache, clock: &dyn Clock) -> StoreResult<u64>
where
    S: RateLimitStore + Send + Sync,
{
    let evicted = cache.evict_stale();
    let deleted = store.sweep_expired(clock.now_ms()).await?;

    tracing::info!(
        records_deleted = deleted,
        cache_evicted = evicted,
        "Rate limit sweep completed"
    );

    Ok(deleted)
}

/// Spawn the recurring sweep
///
/// Ticks every `interval` (first run after one interval) and stops when
/// `shutdown` is cancelled. Await the returned handle during shutdown.
pub fn spawn_sweep_task<S>(
    store: Arc<S>,
    cache: Arc<RateLimitCache>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    S: RateLimitStore + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(interval);
        tick.tick().await; // Skip immediate first tick
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    if let Err(e) = sweep_once(store.as_ref(), cache.as_ref(), clock.as_ref()).await {
                        tracing::error!(error = %e, "Rate limit sweep failed");
                    }
                }
                _ = shutdown.cancelled() => {
                    tracing::debug!("Rate limit sweep task shutting down");
                    break;
                }
            }
        }
    })
}
