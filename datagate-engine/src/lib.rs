//! DataGate Engine - Cache Strategy Engine
//!
//! Decides per request whether a cached value is usable, whether to block on
//! a synchronous fetch or serve stale data while refreshing in the
//! background, and how remote failures are classified.
//!
//! - [`strategy`]: the shared skeleton plus the passive (cache-aside) and
//!   active (stale-while-revalidate) strategies
//! - [`remote`]: the resilient Remote Invoker and its HTTP transport
//! - [`snapshot`]: versioned configuration snapshots for hot reload
//! - [`metrics`]: Prometheus collectors and the outcome sink
//! - [`engine`]: the facade used by the HTTP layer

pub mod engine;
pub mod metrics;
pub mod remote;
pub mod snapshot;
pub mod strategy;

pub use engine::{Served, StrategyEngine, StrategyEngineBuilder};
pub use metrics::{EngineMetrics, RefreshResult};
pub use remote::{Backoff, CallPermit, CircuitBreaker, HttpTransport, RemoteTransport, ResilientInvoker};
pub use snapshot::{ConfigHandle, ConfigSnapshot};
pub use strategy::{
    ActiveStrategy, PassiveStrategy, Strategy, StrategyCore, StrategyDeps, StrategySet,
};
