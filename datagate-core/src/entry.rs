//! Cache entries and the freshness model.
//!
//! An entry moves through three states as time passes:
//!
//! ```text
//! written_at          fresh_until              stale_until
//!     |----- Fresh -----|------ Stale ------------|------ Expired ...
//!         (ttl)               (stale_grace)
//! ```
//!
//! Expired entries are treated as absent by every strategy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::request::SpecificDataResponse;
use crate::Timestamp;

/// Freshness configuration for one cache key family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessRule {
    /// How long an entry is directly servable.
    pub ttl: Duration,
    /// Additional window during which a stale entry may still be served
    /// by the stale-while-revalidate policy.
    pub stale_grace: Duration,
}

impl FreshnessRule {
    pub fn new(ttl: Duration, stale_grace: Duration) -> Self {
        Self { ttl, stale_grace }
    }

    /// Convenience constructor taking whole seconds.
    pub fn from_secs(ttl_secs: u64, stale_grace_secs: u64) -> Self {
        Self::new(
            Duration::from_secs(ttl_secs),
            Duration::from_secs(stale_grace_secs),
        )
    }

    /// Maximum age at which an entry may still be served.
    pub fn max_servable_age(&self) -> Duration {
        self.ttl.saturating_add(self.stale_grace)
    }
}

/// Position of an entry on its freshness timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    /// `now < fresh_until`
    Fresh,
    /// `fresh_until <= now < stale_until`
    Stale,
    /// `now >= stale_until`; treated as absent.
    Expired,
}

impl EntryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Stale => "stale",
            Self::Expired => "expired",
        }
    }
}

/// A cached response with its freshness metadata.
///
/// Invariant: `written_at <= fresh_until <= stale_until`. Entries are only
/// created from a successful remote fetch and are always replaced whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    value: SpecificDataResponse,
    written_at: Timestamp,
    fresh_until: Timestamp,
    stale_until: Timestamp,
}

impl CacheEntry {
    /// Build an entry written at `written_at` under `rule`.
    pub fn from_rule(
        value: SpecificDataResponse,
        written_at: Timestamp,
        rule: &FreshnessRule,
    ) -> Self {
        let fresh_until = add_std(written_at, rule.ttl);
        let stale_until = add_std(fresh_until, rule.stale_grace);
        Self {
            value,
            written_at,
            fresh_until,
            stale_until,
        }
    }

    /// Rebuild an entry from stored timestamps.
    ///
    /// Returns `None` if the timestamps violate the ordering invariant.
    pub fn from_parts(
        value: SpecificDataResponse,
        written_at: Timestamp,
        fresh_until: Timestamp,
        stale_until: Timestamp,
    ) -> Option<Self> {
        if written_at <= fresh_until && fresh_until <= stale_until {
            Some(Self {
                value,
                written_at,
                fresh_until,
                stale_until,
            })
        } else {
            None
        }
    }

    pub fn value(&self) -> &SpecificDataResponse {
        &self.value
    }

    pub fn into_value(self) -> SpecificDataResponse {
        self.value
    }

    pub fn written_at(&self) -> Timestamp {
        self.written_at
    }

    pub fn fresh_until(&self) -> Timestamp {
        self.fresh_until
    }

    pub fn stale_until(&self) -> Timestamp {
        self.stale_until
    }

    /// Classify this entry at `now`.
    pub fn state_at(&self, now: Timestamp) -> EntryState {
        if now < self.fresh_until {
            EntryState::Fresh
        } else if now < self.stale_until {
            EntryState::Stale
        } else {
            EntryState::Expired
        }
    }

    pub fn is_fresh_at(&self, now: Timestamp) -> bool {
        self.state_at(now) == EntryState::Fresh
    }

    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.state_at(now) == EntryState::Expired
    }

    /// Age of the entry at `now`; zero if `now` precedes the write.
    pub fn age_at(&self, now: Timestamp) -> Duration {
        now.signed_duration_since(self.written_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// Add a std duration to a timestamp, saturating at the maximum timestamp.
fn add_std(ts: Timestamp, d: Duration) -> Timestamp {
    chrono::Duration::from_std(d)
        .ok()
        .and_then(|delta| ts.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
