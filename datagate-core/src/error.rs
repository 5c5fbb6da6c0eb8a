//! Error types for datagate operations

use std::time::Duration;
use thiserror::Error;

use crate::outcome::FailureKind;

/// Malformed request-scoped parameters.
///
/// A context error never reaches the cache or the network.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("Required context field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for context field {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Classified failure of a call to the remote data service.
///
/// Every failure of the Remote Invoker is normalized into exactly one of
/// these variants before a strategy sees it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Remote rejected request with status {status}")]
    Client { status: u16 },

    #[error("Remote failed with status {status}")]
    Server { status: u16 },

    #[error("Remote call timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("Remote call failed: {reason}")]
    Unknown { reason: String },
}

impl RemoteError {
    /// Classify an HTTP-like status code. Returns `None` for 1xx-3xx.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            400..=499 => Some(Self::Client { status }),
            500..=599 => Some(Self::Server { status }),
            _ => None,
        }
    }

    /// The taxonomy bucket of this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Client { .. } => FailureKind::Client,
            Self::Server { .. } => FailureKind::Server,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Unknown { .. } => FailureKind::Unknown,
        }
    }

    /// Status code carried by client/server errors.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Client { status } | Self::Server { status } => Some(*status),
            _ => None,
        }
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Client errors are deterministic and are never retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Client { .. })
    }
}

/// Cache store collaborator errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Cache serialization error: {reason}")]
    Serialization { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown strategy policy: {name}")]
    UnknownPolicy { name: String },

    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to load configuration from {path}: {reason}")]
    Load { path: String, reason: String },
}

/// Master error type for all datagate errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DataGateError {
    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl DataGateError {
    /// Map onto the failure taxonomy used for outcome accounting.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Context(_) => FailureKind::Context,
            Self::Remote(e) => e.kind(),
            Self::Cache(_) | Self::Config(_) => FailureKind::Unknown,
        }
    }
}

/// Result type alias for datagate operations.
pub type DataGateResult<T> = Result<T, DataGateError>;

/// Result type alias for remote invocations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Result type alias for cache store operations.
pub type CacheResult<T> = Result<T, CacheError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_from_status() {
        assert_eq!(
            RemoteError::from_status(404),
            Some(RemoteError::Client { status: 404 })
        );
        assert_eq!(
            RemoteError::from_status(503),
            Some(RemoteError::Server { status: 503 })
        );
        assert_eq!(RemoteError::from_status(200), None);
        assert_eq!(RemoteError::from_status(302), None);
    }

    #[test]
    fn test_remote_error_kind_and_status() {
        let err = RemoteError::Server { status: 503 };
        assert_eq!(err.kind(), FailureKind::Server);
        assert_eq!(err.status_code(), Some(503));

        let err = RemoteError::Timeout {
            after: Duration::from_millis(250),
        };
        assert_eq!(err.kind(), FailureKind::Timeout);
        assert_eq!(err.status_code(), None);
    }

    #[test]
    fn test_client_errors_are_not_retryable() {
        assert!(!RemoteError::Client { status: 400 }.is_retryable());
        assert!(RemoteError::Server { status: 500 }.is_retryable());
        assert!(RemoteError::Unknown {
            reason: "reset".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_remote_error_display() {
        let msg = format!("{}", RemoteError::Server { status: 503 });
        assert!(msg.contains("503"));

        let msg = format!(
            "{}",
            ConfigError::UnknownPolicy {
                name: "lru".to_string()
            }
        );
        assert!(msg.contains("Unknown strategy policy"));
        assert!(msg.contains("lru"));
    }

    #[test]
    fn test_datagate_error_from_variants() {
        let context = DataGateError::from(ContextError::RequiredFieldMissing {
            field: "source_id".to_string(),
        });
        assert!(matches!(context, DataGateError::Context(_)));
        assert_eq!(context.kind(), FailureKind::Context);

        let remote = DataGateError::from(RemoteError::Client { status: 422 });
        assert_eq!(remote.kind(), FailureKind::Client);

        let cache = DataGateError::from(CacheError::Unavailable {
            reason: "io".to_string(),
        });
        assert_eq!(cache.kind(), FailureKind::Unknown);
    }
}
