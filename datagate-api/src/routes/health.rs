//! Health Check Endpoints
//!
//! - /health/live - Process alive check
//! - /health/ready - Cache store and circuit state check
//!
//! No authentication required for health endpoints.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use datagate_core::CircuitState;
use datagate_storage::CacheStore;

use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    /// Serving, but the remote circuit is not closed.
    Degraded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthDetails {
    pub config_version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_state: Option<CircuitState>,
    pub cache: CacheHealth,
    pub in_flight_refreshes: usize,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health/live
pub async fn liveness() -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        message: Some("Process is alive".to_string()),
        details: None,
    };
    (StatusCode::OK, Json(response))
}

/// GET /health/ready
///
/// An unreachable cache store makes the service unready. An open circuit
/// only degrades it, since cached entries are still served.
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let engine = &state.engine;

    let cache = match engine.store().stats().await {
        Ok(stats) => CacheHealth {
            status: HealthStatus::Healthy,
            entry_count: Some(stats.entry_count),
            hit_rate: Some(stats.hit_rate()),
            error: None,
        },
        Err(e) => CacheHealth {
            status: HealthStatus::Unhealthy,
            entry_count: None,
            hit_rate: None,
            error: Some(e.to_string()),
        },
    };

    let circuit_state = engine.circuit_state();
    let status = match (cache.status, circuit_state) {
        (HealthStatus::Unhealthy, _) => HealthStatus::Unhealthy,
        (_, Some(CircuitState::Open | CircuitState::HalfOpen)) => HealthStatus::Degraded,
        _ => HealthStatus::Healthy,
    };
    let code = if status == HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    let response = HealthResponse {
        status,
        message: None,
        details: Some(HealthDetails {
            config_version: engine.config().version(),
            circuit_state,
            cache,
            in_flight_refreshes: engine.gate().in_flight_count(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: state.start_time.elapsed().as_secs(),
        }),
    };
    (code, Json(response))
}
