//! Per-key single-flight refresh coordination.
//!
//! At most one background refresh runs per cache key. A refresh holds a
//! [`RefreshTicket`]; the ticket is released when it is dropped, so a
//! refresh that fails, panics or is aborted still frees its key.

use std::sync::Arc;
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use datagate_core::CacheKey;

/// Table of in-flight refreshes keyed by cache key.
#[derive(Debug, Clone, Default)]
pub struct RefreshGate {
    in_flight: Arc<DashMap<CacheKey, Instant>>,
}

impl RefreshGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to claim the refresh for `key`.
    ///
    /// Returns `None` if another refresh for the same key is in flight.
    /// The check and the claim are one atomic step on the key's shard.
    pub fn try_acquire(&self, key: &CacheKey) -> Option<RefreshTicket> {
        match self.in_flight.entry(key.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(Instant::now());
                Some(RefreshTicket {
                    key: key.clone(),
                    in_flight: Arc::clone(&self.in_flight),
                })
            }
        }
    }

    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.in_flight.contains_key(key)
    }

    /// Number of refreshes currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

/// Exclusive right to refresh one key. Released on drop.
#[derive(Debug)]
pub struct RefreshTicket {
    key: CacheKey,
    in_flight: Arc<DashMap<CacheKey, Instant>>,
}

impl RefreshTicket {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Release explicitly. Equivalent to dropping the ticket.
    pub fn release(self) {}
}

impl Drop for RefreshTicket {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
    }
}
