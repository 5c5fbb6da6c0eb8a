//! Tracing subscriber initialization.
//!
//! Logs are structured. JSON output is the default; `DATAGATE_LOG_FORMAT=pretty`
//! switches to the human-readable formatter for local runs.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ApiError, ApiResult};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "datagate_api=debug,datagate_engine=debug,tower_http=debug,info";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup log line
    pub service_name: String,
    /// Service version
    pub service_version: String,
    /// Environment (production, staging, development)
    pub environment: String,
    pub log_format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "datagate-api".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
            log_format: LogFormat::Json,
        }
    }
}

impl TelemetryConfig {
    /// Read the telemetry configuration.
    ///
    /// # Environment Variables
    /// - `DATAGATE_SERVICE_NAME` (default: datagate-api)
    /// - `DATAGATE_SERVICE_VERSION` (default: crate version)
    /// - `DATAGATE_ENVIRONMENT` (default: development)
    /// - `DATAGATE_LOG_FORMAT`: `json` or `pretty` (default: json)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            service_name: std::env::var("DATAGATE_SERVICE_NAME").unwrap_or(defaults.service_name),
            service_version: std::env::var("DATAGATE_SERVICE_VERSION")
                .unwrap_or(defaults.service_version),
            environment: std::env::var("DATAGATE_ENVIRONMENT").unwrap_or(defaults.environment),
            log_format: match std::env::var("DATAGATE_LOG_FORMAT") {
                Ok(v) if v.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
                _ => defaults.log_format,
            },
        }
    }
}

/// Install the global tracing subscriber.
///
/// Must be called once at startup, before any spans are entered.
pub fn init_tracing(config: &TelemetryConfig) -> ApiResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match config.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
    };
    result.map_err(|e| ApiError::internal_error(format!("Failed to init tracing: {}", e)))?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = %config.environment,
        "Telemetry initialized"
    );
    Ok(())
}
