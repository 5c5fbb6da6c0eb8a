//! In-memory cache store backed by a concurrent map.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use datagate_core::{CacheEntry, CacheKey, CacheResult, SourceId, Timestamp};

use super::traits::{CacheStats, CacheStore};

/// Process-local cache store.
///
/// Entries are whole values inside a [`DashMap`], so a `put` swaps the entry
/// under the shard lock and readers clone out a complete entry.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    entries: DashMap<CacheKey, CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    evictions: AtomicU64,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let removed = self.entries.len() as u64;
        self.entries.clear();
        self.evictions.fetch_add(removed, Ordering::Relaxed);
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<CacheEntry>> {
        match self.entries.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(entry.value().clone()))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn put(&self, key: &CacheKey, entry: CacheEntry) -> CacheResult<()> {
        self.entries.insert(key.clone(), entry);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn invalidate(&self, key: &CacheKey) -> CacheResult<bool> {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        Ok(removed)
    }

    async fn invalidate_source(&self, source_id: &SourceId) -> CacheResult<u64> {
        let prefix = CacheKey::source_prefix(source_id);
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.as_str().starts_with(&prefix));
        let removed = before.saturating_sub(self.entries.len()) as u64;
        self.evictions.fetch_add(removed, Ordering::Relaxed);
        Ok(removed)
    }

    async fn purge_expired(&self, now: Timestamp) -> CacheResult<u64> {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before.saturating_sub(self.entries.len()) as u64;
        self.evictions.fetch_add(removed, Ordering::Relaxed);
        Ok(removed)
    }

    async fn stats(&self) -> CacheResult<CacheStats> {
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            entry_count: self.entries.len() as u64,
            evictions: self.evictions.load(Ordering::Relaxed),
        })
    }
}
