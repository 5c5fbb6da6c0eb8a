//! Expired Entry Sweep
//!
//! Stores never evict on their own; this task removes entries whose stale
//! window has closed so they do not accumulate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use datagate_core::Clock;
use datagate_storage::CacheStore;

#[derive(Debug, Default)]
pub struct CachePurgeMetrics {
    pub cycles: AtomicU64,
    pub purged: AtomicU64,
    pub errors: AtomicU64,
}

/// Run one sweep at the clock's current time.
pub async fn purge_once(store: &dyn CacheStore, clock: &dyn Clock, metrics: &CachePurgeMetrics) {
    metrics.cycles.fetch_add(1, Ordering::Relaxed);
    match store.purge_expired(clock.now()).await {
        Ok(0) => {}
        Ok(removed) => {
            metrics.purged.fetch_add(removed, Ordering::Relaxed);
            tracing::debug!(removed, "Purged expired cache entries");
        }
        Err(e) => {
            metrics.errors.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(error = %e, "Cache purge failed");
        }
    }
}

/// Sweep on an interval until the shutdown signal is received.
pub async fn cache_purge_task(
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    check_interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<CachePurgeMetrics> {
    let metrics = Arc::new(CachePurgeMetrics::default());
    let mut ticker = interval(check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        check_interval_secs = check_interval.as_secs(),
        "Cache purge task started"
    );

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::info!("Cache purge task shutting down");
                    break;
                }
            }

            _ = ticker.tick() => {
                purge_once(store.as_ref(), clock.as_ref(), &metrics).await;
            }
        }
    }

    tracing::info!(
        cycles = metrics.cycles.load(Ordering::Relaxed),
        purged = metrics.purged.load(Ordering::Relaxed),
        "Cache purge task completed"
    );
    metrics
}
