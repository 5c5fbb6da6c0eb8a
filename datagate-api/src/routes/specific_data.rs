//! Read-through data endpoint.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::debug;

use datagate_core::{HitKind, Outcome, SpecificDataRequest};

use crate::admission::{admit, AdmissionError};
use crate::constants::{
    CACHE_STATUS_HEADER, REQUEST_ID_HEADER, SOURCE_ID_HEADER, SPECIFIC_DATA_PATH,
};
use crate::error::ApiResult;
use crate::state::AppState;

/// Value of the `X-Cache` response header for a served outcome.
pub fn cache_status(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::CacheHit(HitKind::Fresh) => "hit-fresh",
        Outcome::CacheHit(HitKind::Stale) => "hit-stale",
        Outcome::CacheMiss | Outcome::RemoteSuccess | Outcome::RemoteFailure(_) => "miss",
    }
}

fn source_id_header(headers: &HeaderMap) -> Result<Option<&str>, AdmissionError> {
    match headers.get(SOURCE_ID_HEADER) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(Some)
            .map_err(|_| AdmissionError::MalformedSourceId {
                source_id: String::from_utf8_lossy(value.as_bytes()).into_owned(),
            }),
    }
}

/// POST /v1/specific-data
pub async fn get_specific_data(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SpecificDataRequest>,
) -> ApiResult<Response> {
    let raw = source_id_header(&headers)?;
    // Admission and the strategy run see the same configuration version.
    let snapshot = state.engine.config().snapshot();
    let source_id = admit(raw, snapshot.config())?;

    let served = state
        .engine
        .handle_with_snapshot(snapshot, request, source_id, SPECIFIC_DATA_PATH)
        .await?;

    debug!(
        request_id = %served.request_id,
        policy = %served.policy,
        outcome = %served.outcome,
        config_version = served.config_version,
        diagnostics = ?served.diagnostics,
        "Served specific data"
    );

    Ok((
        StatusCode::OK,
        [
            (CACHE_STATUS_HEADER, cache_status(served.outcome).to_string()),
            (REQUEST_ID_HEADER, served.request_id.to_string()),
        ],
        Json(served.response),
    )
        .into_response())
}
