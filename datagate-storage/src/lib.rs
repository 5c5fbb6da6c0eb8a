//! DataGate Storage - Cache Stores
//!
//! Defines the cache store abstraction used by the strategy engine, with an
//! in-memory backend and an LMDB backend, plus the per-key refresh gate that
//! keeps background refreshes single-flight.

pub mod cache;

pub use cache::{
    CacheStats, CacheStore, InMemoryCacheStore, LmdbCacheError, LmdbCacheStore, RefreshGate,
    RefreshTicket,
};
