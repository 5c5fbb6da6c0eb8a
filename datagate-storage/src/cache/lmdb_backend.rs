//! LMDB-backed cache store.
//!
//! Uses the heed crate (Rust bindings for LMDB) for a memory-mapped,
//! persistent key-value store. Entries survive restarts.
//!
//! # Value layout
//!
//! ```text
//! [written_at ms: 8 bytes LE][fresh_until ms: 8 bytes LE][stale_until ms: 8 bytes LE][json]
//! ```
//!
//! Timestamps are stored at millisecond precision. The JSON tail is the
//! serialized [`SpecificDataResponse`].
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. Each `put` is one write transaction, so
//! a reader sees either the previous value or the new one.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::DateTime;
use datagate_core::{
    CacheEntry, CacheError, CacheKey, CacheResult, SourceId, SpecificDataResponse, Timestamp,
};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use super::traits::{CacheStats, CacheStore};

const HEADER_LEN: usize = 24;

/// Error type for LMDB cache operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbCacheError> for CacheError {
    fn from(e: LmdbCacheError) -> Self {
        match e {
            LmdbCacheError::Serialization(reason) | LmdbCacheError::Deserialization(reason) => {
                CacheError::Serialization { reason }
            }
            other => CacheError::Unavailable {
                reason: other.to_string(),
            },
        }
    }
}

/// Persistent cache store on LMDB.
pub struct LmdbCacheStore {
    env: Env,
    db: Database<Bytes, Bytes>,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    evictions: AtomicU64,
}

impl LmdbCacheStore {
    /// Open (or create) a store at `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbCacheError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbCacheError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        Ok(Self {
            env,
            db,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        })
    }

    /// Collect keys for which `pred(key, value)` holds.
    fn collect_keys<F>(&self, mut pred: F) -> Result<Vec<Vec<u8>>, LmdbCacheError>
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let iter = self
            .db
            .iter(&rtxn)
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let mut keys = Vec::new();
        for (key, value) in iter.flatten() {
            if pred(key, value) {
                keys.push(key.to_vec());
            }
        }
        Ok(keys)
    }

    /// Delete `keys` in one write transaction.
    fn delete_keys(&self, keys: &[Vec<u8>]) -> Result<u64, LmdbCacheError> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let mut deleted = 0u64;
        for key in keys {
            let removed = self
                .db
                .delete(&mut wtxn, key)
                .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
            if removed {
                deleted += 1;
            }
        }

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        self.evictions.fetch_add(deleted, Ordering::Relaxed);
        Ok(deleted)
    }
}

fn encode_entry(entry: &CacheEntry) -> Result<Vec<u8>, LmdbCacheError> {
    let json = serde_json::to_vec(entry.value())
        .map_err(|e| LmdbCacheError::Serialization(e.to_string()))?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + json.len());
    bytes.extend_from_slice(&entry.written_at().timestamp_millis().to_le_bytes());
    bytes.extend_from_slice(&entry.fresh_until().timestamp_millis().to_le_bytes());
    bytes.extend_from_slice(&entry.stale_until().timestamp_millis().to_le_bytes());
    bytes.extend_from_slice(&json);
    Ok(bytes)
}

fn read_millis(bytes: &[u8], offset: usize) -> Result<Timestamp, LmdbCacheError> {
    let raw: [u8; 8] = bytes
        .get(offset..offset + 8)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| LmdbCacheError::Deserialization("Truncated entry header".into()))?;
    DateTime::from_timestamp_millis(i64::from_le_bytes(raw))
        .ok_or_else(|| LmdbCacheError::Deserialization("Timestamp out of range".into()))
}

fn decode_entry(bytes: &[u8]) -> Result<CacheEntry, LmdbCacheError> {
    let written_at = read_millis(bytes, 0)?;
    let fresh_until = read_millis(bytes, 8)?;
    let stale_until = read_millis(bytes, 16)?;

    let value: SpecificDataResponse = serde_json::from_slice(&bytes[HEADER_LEN..])
        .map_err(|e| LmdbCacheError::Deserialization(e.to_string()))?;

    CacheEntry::from_parts(value, written_at, fresh_until, stale_until)
        .ok_or_else(|| LmdbCacheError::Deserialization("Entry timestamps out of order".into()))
}

#[async_trait]
impl CacheStore for LmdbCacheStore {
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<CacheEntry>> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        match self.db.get(&rtxn, key.as_bytes()) {
            Ok(Some(bytes)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(decode_entry(bytes)?))
            }
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Err(e) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Err(LmdbCacheError::Transaction(e.to_string()).into())
            }
        }
    }

    async fn put(&self, key: &CacheKey, entry: CacheEntry) -> CacheResult<()> {
        let bytes = encode_entry(&entry)?;

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        self.db
            .put(&mut wtxn, key.as_bytes(), &bytes)
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn invalidate(&self, key: &CacheKey) -> CacheResult<bool> {
        let deleted = self.delete_keys(&[key.as_bytes().to_vec()])?;
        Ok(deleted > 0)
    }

    async fn invalidate_source(&self, source_id: &SourceId) -> CacheResult<u64> {
        let prefix = CacheKey::source_prefix(source_id);
        let keys = self.collect_keys(|key, _| key.starts_with(prefix.as_bytes()))?;
        Ok(self.delete_keys(&keys)?)
    }

    async fn purge_expired(&self, now: Timestamp) -> CacheResult<u64> {
        // Undecodable headers are purged too.
        let keys = self.collect_keys(|_, value| match read_millis(value, 16) {
            Ok(stale_until) => now >= stale_until,
            Err(_) => true,
        })?;
        Ok(self.delete_keys(&keys)?)
    }

    async fn stats(&self) -> CacheResult<CacheStats> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        let entry_count = self
            .db
            .len(&rtxn)
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            entry_count,
            evictions: self.evictions.load(Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datagate_core::{FreshnessRule, SpecificDataRequest};
    use proptest::prelude::*;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn create_test_store() -> (LmdbCacheStore, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let store = LmdbCacheStore::open(temp_dir.path(), 10).expect("store creation should succeed");
        (store, temp_dir)
    }

    fn t(secs: i64) -> Timestamp {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn key(source: &str, id: i64) -> CacheKey {
        CacheKey::derive(
            &SourceId::new(source),
            &SpecificDataRequest::new("quote").with_param("id", json!(id)),
        )
    }

    fn entry(v: i64, written_at: Timestamp) -> CacheEntry {
        CacheEntry::from_rule(
            SpecificDataResponse::new(json!({ "v": v, "tags": ["a", "b"] })),
            written_at,
            &FreshnessRule::from_secs(60, 30),
        )
    }

    #[tokio::test]
    async fn test_lmdb_put_get() {
        let (store, _dir) = create_test_store();
        let k = key("billing", 1);

        assert!(store.get(&k).await.unwrap().is_none());
        store.put(&k, entry(1, t(0))).await.unwrap();

        let got = store.get(&k).await.unwrap().unwrap();
        assert_eq!(got, entry(1, t(0)));
        assert_eq!(got.fresh_until(), t(60));
        assert_eq!(got.stale_until(), t(90));

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
    }

    #[tokio::test]
    async fn test_lmdb_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let k = key("billing", 1);
        {
            let store = LmdbCacheStore::open(dir.path(), 10).unwrap();
            store.put(&k, entry(7, t(0))).await.unwrap();
        }
        let store = LmdbCacheStore::open(dir.path(), 10).unwrap();
        assert_eq!(store.get(&k).await.unwrap(), Some(entry(7, t(0))));
    }

    #[tokio::test]
    async fn test_lmdb_invalidate_source() {
        let (store, _dir) = create_test_store();
        store.put(&key("billing", 1), entry(1, t(0))).await.unwrap();
        store.put(&key("billing", 2), entry(2, t(0))).await.unwrap();
        store.put(&key("reports", 1), entry(3, t(0))).await.unwrap();

        let removed = store.invalidate_source(&SourceId::new("billing")).await.unwrap();
        assert_eq!(removed, 2);
        assert!(store.get(&key("reports", 1)).await.unwrap().is_some());
        assert_eq!(store.stats().await.unwrap().entry_count, 1);
    }

    #[tokio::test]
    async fn test_lmdb_purge_expired() {
        let (store, _dir) = create_test_store();
        store.put(&key("billing", 1), entry(1, t(0))).await.unwrap();
        store.put(&key("billing", 2), entry(2, t(50))).await.unwrap();

        assert_eq!(store.purge_expired(t(90)).await.unwrap(), 1);
        assert!(store.get(&key("billing", 1)).await.unwrap().is_none());
        assert!(store.get(&key("billing", 2)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_lmdb_invalidate_reports_presence() {
        let (store, _dir) = create_test_store();
        let k = key("billing", 1);
        store.put(&k, entry(1, t(0))).await.unwrap();

        assert!(store.invalidate(&k).await.unwrap());
        assert!(!store.invalidate(&k).await.unwrap());
        assert!(!store.invalidate(&key("billing", 2)).await.unwrap());

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.entry_count, 0);
    }

    #[test]
    fn test_decode_rejects_truncated() {
        assert!(matches!(
            decode_entry(&[0u8; 10]),
            Err(LmdbCacheError::Deserialization(_))
        ));
    }

    #[test]
    fn test_corrupt_entry_maps_to_serialization_error() {
        let err: CacheError = LmdbCacheError::Deserialization("bad".into()).into();
        assert!(matches!(err, CacheError::Serialization { .. }));
        let err: CacheError = LmdbCacheError::Transaction("down".into()).into();
        assert!(matches!(err, CacheError::Unavailable { .. }));
    }

    proptest! {
        #[test]
        fn prop_stored_bounds_survive_millisecond_truncation(
            secs in 0i64..1_000_000,
            nanos in 0u32..1_000_000_000,
            ttl_ns in 0u64..10_000_000_000,
            grace_ns in 0u64..10_000_000_000,
        ) {
            let written_at = DateTime::from_timestamp(1_700_000_000 + secs, nanos).unwrap();
            let rule = FreshnessRule::new(Duration::from_nanos(ttl_ns), Duration::from_nanos(grace_ns));
            let original = CacheEntry::from_rule(
                SpecificDataResponse::new(json!({ "n": secs })),
                written_at,
                &rule,
            );

            let decoded = decode_entry(&encode_entry(&original).unwrap()).unwrap();
            prop_assert!(decoded.written_at() <= decoded.fresh_until());
            prop_assert!(decoded.fresh_until() <= decoded.stale_until());
            prop_assert_eq!(decoded.written_at().timestamp_millis(), original.written_at().timestamp_millis());
            prop_assert_eq!(decoded.fresh_until().timestamp_millis(), original.fresh_until().timestamp_millis());
            prop_assert_eq!(decoded.stale_until().timestamp_millis(), original.stale_until().timestamp_millis());
            prop_assert_eq!(decoded.value(), original.value());
        }
    }
}
