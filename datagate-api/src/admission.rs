//! Request admission gate.
//!
//! A source id is admitted when it is well-formed and, if the current
//! snapshot carries a non-empty whitelist, listed there. The gate runs
//! before the engine sees the request.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use datagate_core::{GatewayConfig, SourceId};

use crate::constants::SOURCE_ID_PATTERN;

static SOURCE_ID_RE: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(SOURCE_ID_PATTERN));

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("Source id header is missing")]
    MissingSourceId,

    #[error("Malformed source id: {source_id:?}")]
    MalformedSourceId { source_id: String },

    #[error("Source id not whitelisted: {source_id}")]
    NotWhitelisted { source_id: String },
}

/// Whether a raw source id has the accepted shape.
pub fn is_well_formed(raw: &str) -> bool {
    match SOURCE_ID_RE.as_ref() {
        Ok(re) => re.is_match(raw),
        Err(_) => false,
    }
}

/// Admit a raw source id against the given configuration.
pub fn admit(raw: Option<&str>, config: &GatewayConfig) -> Result<SourceId, AdmissionError> {
    let raw = raw.ok_or(AdmissionError::MissingSourceId)?;
    if !is_well_formed(raw) {
        return Err(AdmissionError::MalformedSourceId {
            source_id: raw.to_string(),
        });
    }
    if !config.is_whitelisted(raw) {
        return Err(AdmissionError::NotWhitelisted {
            source_id: raw.to_string(),
        });
    }
    Ok(SourceId::new(raw))
}
