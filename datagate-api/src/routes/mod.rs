//! HTTP routes.

pub mod health;
pub mod metrics;
pub mod specific_data;

use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::constants::{
    DEFAULT_CONCURRENCY_LIMIT, DEFAULT_REQUEST_TIMEOUT_SECS, SPECIFIC_DATA_PATH,
};
use crate::state::AppState;

/// Build the full API router.
pub fn create_api_router(state: AppState) -> Router {
    Router::new()
        .route(SPECIFIC_DATA_PATH, post(specific_data::get_specific_data))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/metrics", get(metrics::render_metrics))
        .layer(TimeoutLayer::new(Duration::from_secs(
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )))
        .layer(ConcurrencyLimitLayer::new(DEFAULT_CONCURRENCY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
