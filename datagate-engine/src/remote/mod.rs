//! Remote Invoker: resilience-guarded calls to the remote data service.
//!
//! [`ResilientInvoker`] wraps a [`RemoteTransport`] with circuit-breaker
//! admission, per-attempt timeout and bounded retry, and classifies every
//! failure into a [`datagate_core::RemoteError`].

use async_trait::async_trait;
use datagate_core::{RemoteResult, SourceId, SpecificDataRequest, SpecificDataResponse};

pub mod circuit;
pub mod http;
pub mod resilient;
pub mod retry;

pub use circuit::{CallPermit, CircuitBreaker};
pub use http::HttpTransport;
pub use resilient::ResilientInvoker;
pub use retry::Backoff;

/// A single unguarded attempt against the remote data service.
///
/// Implementations classify their own failures but apply no timeout, retry
/// or breaker logic.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    async fn send(
        &self,
        request: &SpecificDataRequest,
        source_id: &SourceId,
        operation: &str,
    ) -> RemoteResult<SpecificDataResponse>;
}
