//! Per-request outcome accounting.
//!
//! Every strategy invocation records exactly one [`Outcome`]. Outcomes are
//! never persisted; they are handed to an [`OutcomeSink`] (metrics, logs).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::config::StrategyPolicy;
use crate::key::CacheKey;
use crate::request::SourceId;

/// Which kind of cached entry satisfied a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitKind {
    Fresh,
    Stale,
}

/// Failure taxonomy used for outcome accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Malformed strategy context; nothing was attempted.
    Context,
    /// 4xx-equivalent response.
    Client,
    /// 5xx-equivalent response.
    Server,
    /// Deadline exceeded.
    Timeout,
    /// Transport faults and everything else.
    Unknown,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Context => "context",
            Self::Client => "client",
            Self::Server => "server",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
        }
    }
}

/// Result of one strategy invocation or one background refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    CacheHit(HitKind),
    CacheMiss,
    RemoteSuccess,
    RemoteFailure(FailureKind),
}

impl Outcome {
    /// Stable label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::CacheHit(HitKind::Fresh) => "hit_fresh",
            Self::CacheHit(HitKind::Stale) => "hit_stale",
            Self::CacheMiss => "miss",
            Self::RemoteSuccess => "remote_success",
            Self::RemoteFailure(_) => "remote_failure",
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, Self::CacheHit(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::RemoteFailure(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoteFailure(kind) => write!(f, "remote_failure({})", kind.as_str()),
            other => f.write_str(other.label()),
        }
    }
}

/// Outcome plus the request-scoped facts a metrics sink needs.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeEvent {
    pub strategy: StrategyPolicy,
    pub outcome: Outcome,
    pub source_id: SourceId,
    pub cache_key: CacheKey,
    pub api_path: String,
    /// Time since the request's `start_time`.
    pub elapsed: Duration,
    /// True for events emitted by a background refresh rather than by the
    /// request path.
    pub background: bool,
}

/// Collaborator that receives outcome events.
pub trait OutcomeSink: Send + Sync {
    fn record(&self, event: &OutcomeEvent);
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl OutcomeSink for NoopSink {
    fn record(&self, _event: &OutcomeEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(Outcome::CacheHit(HitKind::Fresh).label(), "hit_fresh");
        assert_eq!(Outcome::CacheHit(HitKind::Stale).label(), "hit_stale");
        assert_eq!(Outcome::CacheMiss.label(), "miss");
        assert_eq!(
            Outcome::RemoteFailure(FailureKind::Server).to_string(),
            "remote_failure(server)"
        );
    }

    #[test]
    fn test_outcome_predicates() {
        assert!(Outcome::CacheHit(HitKind::Stale).is_hit());
        assert!(!Outcome::CacheMiss.is_hit());
        assert!(Outcome::RemoteFailure(FailureKind::Timeout).is_failure());
    }
}
