//! DataGate Core - Types and Contracts
//!
//! Request, cache entry, outcome and configuration types shared by every
//! other crate. This crate holds no I/O beyond reading a config file; stores,
//! strategies and transports live downstream.

use chrono::{DateTime, Utc};

pub mod clock;
pub mod config;
pub mod context;
pub mod entry;
pub mod error;
pub mod key;
pub mod outcome;
pub mod remote;
pub mod request;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    CacheBackendConfig, CacheBackendKind, CircuitBreakerConfig, FreshnessRuleConfig,
    GatewayConfig, RemoteConfig, ResilienceConfig, RetryConfig, StrategyPolicy,
};
pub use context::{StrategyContext, DEFAULT_API_PATH};
pub use entry::{CacheEntry, EntryState, FreshnessRule};
pub use error::{
    CacheError, CacheResult, ConfigError, ContextError, DataGateError, DataGateResult,
    RemoteError, RemoteResult,
};
pub use key::CacheKey;
pub use outcome::{FailureKind, HitKind, NoopSink, Outcome, OutcomeEvent, OutcomeSink};
pub use remote::{CircuitState, RemoteInvoker, FETCH_OPERATION};
pub use request::{SourceId, SpecificDataRequest, SpecificDataResponse};
