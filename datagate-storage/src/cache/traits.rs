//! Cache store trait and statistics.

use async_trait::async_trait;
use datagate_core::{CacheEntry, CacheKey, CacheResult, SourceId, Timestamp};
use std::sync::Arc;

/// Key-addressed store of cache entries.
///
/// # Contract
///
/// - `put` replaces atomically: a concurrent reader sees the old entry or the
///   new one, never a mixture.
/// - `get` returns whatever is stored, expired or not.
/// - Failures surface as [`datagate_core::CacheError`]; callers decide
///   whether to fail open.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read the entry stored under `key`.
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<CacheEntry>>;

    /// Store `entry` under `key`, replacing any previous entry.
    async fn put(&self, key: &CacheKey, entry: CacheEntry) -> CacheResult<()>;

    /// Remove one entry. Returns whether something was removed.
    async fn invalidate(&self, key: &CacheKey) -> CacheResult<bool>;

    /// Remove every entry of a source. Returns the number removed.
    async fn invalidate_source(&self, source_id: &SourceId) -> CacheResult<u64>;

    /// Remove entries that are past their stale window at `now`.
    async fn purge_expired(&self, now: Timestamp) -> CacheResult<u64>;

    /// Snapshot of store statistics.
    async fn stats(&self) -> CacheResult<CacheStats>;
}

#[async_trait]
impl<S: CacheStore + ?Sized> CacheStore for Arc<S> {
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<CacheEntry>> {
        (**self).get(key).await
    }

    async fn put(&self, key: &CacheKey, entry: CacheEntry) -> CacheResult<()> {
        (**self).put(key, entry).await
    }

    async fn invalidate(&self, key: &CacheKey) -> CacheResult<bool> {
        (**self).invalidate(key).await
    }

    async fn invalidate_source(&self, source_id: &SourceId) -> CacheResult<u64> {
        (**self).invalidate_source(source_id).await
    }

    async fn purge_expired(&self, now: Timestamp) -> CacheResult<u64> {
        (**self).purge_expired(now).await
    }

    async fn stats(&self) -> CacheResult<CacheStats> {
        (**self).stats().await
    }
}

/// Statistics about cache performance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads that found an entry.
    pub hits: u64,
    /// Reads that found nothing.
    pub misses: u64,
    /// Writes accepted.
    pub writes: u64,
    /// Number of entries currently stored.
    pub entry_count: u64,
    /// Entries removed by invalidation or purge.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
