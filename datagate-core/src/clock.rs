//! Time source abstraction.
//!
//! Freshness decisions read the current time through [`Clock`] so that the
//! freshness timeline can be driven deterministically in tests.

use chrono::Utc;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::Timestamp;

/// Source of "now" for freshness decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// Manually advanced clock. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<RwLock<Timestamp>>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(RwLock::new(start)),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, ts: Timestamp) {
        if let Ok(mut guard) = self.now.write() {
            *guard = ts;
        }
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.write() {
            if let Some(next) = chrono::Duration::from_std(by)
                .ok()
                .and_then(|delta| guard.checked_add_signed(delta))
            {
                *guard = next;
            }
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.read().map(|guard| *guard).unwrap_or_else(|_| Utc::now())
    }
}
