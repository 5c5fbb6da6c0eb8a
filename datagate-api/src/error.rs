//! Error Types for the datagate API
//!
//! This module defines error handling for the HTTP layer:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - Conversions from the engine's error taxonomy
//!
//! All errors are serialized as JSON with an HTTP status derived from the code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use datagate_core::{ConfigError, DataGateError, RemoteError};

use crate::admission::AdmissionError;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Caller Errors (400, 403)
    // ========================================================================
    /// Request context failed validation before any cache or remote access
    InvalidContext,

    /// Source id header is missing or not well-formed
    InvalidSourceId,

    /// Source id is well-formed but not admitted
    Forbidden,

    // ========================================================================
    // Upstream Errors (4xx passthrough, 502, 504)
    // ========================================================================
    /// Remote data service rejected the request
    UpstreamClientError,

    /// Remote data service failed
    UpstreamServerError,

    /// Remote data service did not answer in time
    UpstreamTimeout,

    /// Remote data service unreachable or circuit open
    UpstreamUnavailable,

    // ========================================================================
    // Server Errors (500)
    // ========================================================================
    /// Configuration could not be resolved
    ConfigError,

    /// Unexpected internal error
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidContext | Self::InvalidSourceId => StatusCode::BAD_REQUEST,
            Self::Forbidden => StatusCode::FORBIDDEN,
            // Overridden by the upstream status when one is known.
            Self::UpstreamClientError => StatusCode::BAD_REQUEST,
            Self::UpstreamServerError | Self::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
            Self::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::ConfigError | Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::InvalidContext => "Request context is invalid",
            Self::InvalidSourceId => "Source id is missing or malformed",
            Self::Forbidden => "Source id is not admitted",
            Self::UpstreamClientError => "Remote data service rejected the request",
            Self::UpstreamServerError => "Remote data service failed",
            Self::UpstreamTimeout => "Remote data service timed out",
            Self::UpstreamUnavailable => "Remote data service unavailable",
            Self::ConfigError => "Configuration error",
            Self::InternalError => "Internal server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InvalidContext => "INVALID_CONTEXT",
            Self::InvalidSourceId => "INVALID_SOURCE_ID",
            Self::Forbidden => "FORBIDDEN",
            Self::UpstreamClientError => "UPSTREAM_CLIENT_ERROR",
            Self::UpstreamServerError => "UPSTREAM_SERVER_ERROR",
            Self::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            Self::UpstreamUnavailable => "UPSTREAM_UNAVAILABLE",
            Self::ConfigError => "CONFIG_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        };
        f.write_str(s)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response returned by every endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// Status reported by the remote service for client errors.
    #[serde(skip)]
    upstream_status: Option<u16>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            upstream_status: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    ///
    /// Upstream 4xx statuses pass through unchanged.
    pub fn status_code(&self) -> StatusCode {
        match (self.code, self.upstream_status) {
            (ErrorCode::UpstreamClientError, Some(status)) => StatusCode::from_u16(status)
                .ok()
                .filter(|s| s.is_client_error())
                .unwrap_or(StatusCode::BAD_REQUEST),
            (code, _) => code.status_code(),
        }
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    pub fn invalid_context(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidContext, message)
    }

    pub fn invalid_source_id(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidSourceId, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Create an upstream client error carrying the remote status.
    pub fn upstream_client(status: u16) -> Self {
        let mut err = Self::new(
            ErrorCode::UpstreamClientError,
            format!("Remote data service rejected the request with status {}", status),
        );
        err.upstream_status = Some(status);
        err
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM DOMAIN ERRORS
// ============================================================================

impl From<RemoteError> for ApiError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Client { status } => Self::upstream_client(status),
            RemoteError::Server { .. } => {
                Self::new(ErrorCode::UpstreamServerError, err.to_string())
            }
            RemoteError::Timeout { .. } => Self::new(ErrorCode::UpstreamTimeout, err.to_string()),
            RemoteError::Unknown { .. } => {
                Self::new(ErrorCode::UpstreamUnavailable, err.to_string())
            }
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        tracing::error!(error = %err, "Configuration error while serving request");
        Self::new(ErrorCode::ConfigError, err.to_string())
    }
}

impl From<DataGateError> for ApiError {
    fn from(err: DataGateError) -> Self {
        match err {
            DataGateError::Context(e) => Self::invalid_context(e.to_string()),
            DataGateError::Remote(e) => e.into(),
            DataGateError::Config(e) => e.into(),
            DataGateError::Cache(e) => {
                tracing::error!(error = %e, "Cache error reached the HTTP layer");
                Self::internal_error("Cache store failure")
            }
        }
    }
}

impl From<AdmissionError> for ApiError {
    fn from(err: AdmissionError) -> Self {
        match err {
            AdmissionError::MissingSourceId | AdmissionError::MalformedSourceId { .. } => {
                Self::invalid_source_id(err.to_string())
            }
            AdmissionError::NotWhitelisted { .. } => Self::forbidden(err.to_string()),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
