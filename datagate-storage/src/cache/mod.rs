//! Cache layer with explicit freshness windows.
//!
//! Stores keep whole [`CacheEntry`](datagate_core::CacheEntry) values; they
//! never decide freshness. Classification into fresh/stale/expired happens in
//! the strategies against the entry's own timestamps, so a store can hand
//! back an expired entry and nothing breaks.
//!
//! # Key scoping
//!
//! Every key is a [`CacheKey`](datagate_core::CacheKey) derived from a source
//! id and a request. Entries of one source can be dropped with
//! [`CacheStore::invalidate_source`] without touching other sources.

pub mod lmdb_backend;
pub mod memory;
pub mod refresh;
pub mod traits;

pub use lmdb_backend::{LmdbCacheError, LmdbCacheStore};
pub use memory::InMemoryCacheStore;
pub use refresh::{RefreshGate, RefreshTicket};
pub use traits::{CacheStats, CacheStore};
