//! Constants for the datagate API
//!
//! Header names, routes and job defaults used across the HTTP layer.

// ============================================================================
// HEADERS
// ============================================================================

/// Header carrying the caller's source id.
pub const SOURCE_ID_HEADER: &str = "x-source-id";

/// Response header reporting how the cache served the request.
pub const CACHE_STATUS_HEADER: &str = "x-cache";

/// Response header echoing the request id assigned by the engine.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

// ============================================================================
// ROUTES
// ============================================================================

/// Read-through data route.
pub const SPECIFIC_DATA_PATH: &str = "/v1/specific-data";

// ============================================================================
// SERVER
// ============================================================================

/// Default bind host.
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Default bind port.
pub const DEFAULT_PORT: u16 = 3000;

/// Per-request timeout applied by the HTTP layer, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum concurrent in-flight HTTP requests.
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 1024;

// ============================================================================
// BACKGROUND JOBS
// ============================================================================

/// How often the config file's modification time is checked (seconds).
pub const DEFAULT_CONFIG_RELOAD_INTERVAL_SECS: u64 = 5;

/// How often expired cache entries are swept (seconds).
pub const DEFAULT_CACHE_PURGE_INTERVAL_SECS: u64 = 60;

// ============================================================================
// ADMISSION
// ============================================================================

/// Accepted source id shape.
pub const SOURCE_ID_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9_.-]{0,63}$";
