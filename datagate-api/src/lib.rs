//! datagate API - HTTP Layer
//!
//! Exposes the strategy engine over axum: the read-through data route,
//! health checks and Prometheus metrics. Also owns the process concerns
//! around the engine: source admission, telemetry bootstrap, config file
//! hot reload and the expired-entry sweep.

pub mod admission;
pub mod bootstrap;
pub mod config;
pub mod constants;
pub mod error;
pub mod jobs;
pub mod routes;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use admission::{admit, AdmissionError};
pub use bootstrap::{build_engine, build_invoker, build_store};
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::create_api_router;
pub use state::AppState;
pub use telemetry::{init_tracing, TelemetryConfig};
