//! Prometheus exposition endpoint.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const TEXT_FORMAT: &str = "text/plain; version=0.0.4";

/// GET /metrics
pub async fn render_metrics(State(state): State<AppState>) -> ApiResult<Response> {
    let Some(metrics) = state.engine.metrics() else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };
    let body = metrics
        .render()
        .map_err(|e| ApiError::internal_error(format!("Failed to encode metrics: {}", e)))?;
    Ok(([(header::CONTENT_TYPE, TEXT_FORMAT)], body).into_response())
}
