//! Remote data service contract.
//!
//! The pure trait lives here; the resilience-wrapped implementation and the
//! HTTP transport live in datagate-engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RemoteResult;
use crate::request::{SourceId, SpecificDataRequest, SpecificDataResponse};

/// Operation name used for specific-data fetches.
pub const FETCH_OPERATION: &str = "specific-data";

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitState {
    /// Circuit is closed, requests flow normally
    Closed = 0,
    /// Circuit is open, requests are rejected
    Open = 1,
    /// Circuit is half-open, testing if service recovered
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(v: u8) -> Self {
        match v {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            _ => CircuitState::HalfOpen,
        }
    }
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// One resilience-guarded outbound call to the remote data service.
///
/// Implementations must classify every failure into a [`crate::RemoteError`]
/// and must never touch cache state.
#[async_trait]
pub trait RemoteInvoker: Send + Sync {
    async fn invoke(
        &self,
        request: &SpecificDataRequest,
        source_id: &SourceId,
        operation: &str,
    ) -> RemoteResult<SpecificDataResponse>;

    /// Current circuit state, if the implementation has a breaker.
    fn circuit_state(&self) -> Option<CircuitState> {
        None
    }
}
