//! Assembly of the engine from a gateway configuration.
//!
//! Store backend, transport and resilience settings are fixed at startup.
//! Hot reload changes policies, freshness rules and the whitelist only.

use std::sync::Arc;

use tracing::info;

use datagate_core::{CacheBackendConfig, CacheBackendKind, GatewayConfig, RemoteInvoker};
use datagate_engine::{ConfigHandle, EngineMetrics, HttpTransport, ResilientInvoker, StrategyEngine};
use datagate_storage::{CacheStore, InMemoryCacheStore, LmdbCacheStore};

use crate::error::{ApiError, ApiResult};

/// Open the configured cache store.
pub fn build_store(config: &CacheBackendConfig) -> ApiResult<Arc<dyn CacheStore>> {
    match config.backend {
        CacheBackendKind::Memory => {
            info!("Using in-memory cache store");
            Ok(Arc::new(InMemoryCacheStore::new()))
        }
        CacheBackendKind::Lmdb => {
            std::fs::create_dir_all(&config.lmdb_path).map_err(|e| {
                ApiError::internal_error(format!(
                    "Failed to create cache directory {}: {}",
                    config.lmdb_path, e
                ))
            })?;
            let store = LmdbCacheStore::open(&config.lmdb_path, config.lmdb_max_size_mb)
                .map_err(|e| ApiError::internal_error(format!("Failed to open LMDB cache: {}", e)))?;
            info!(path = %config.lmdb_path, max_size_mb = config.lmdb_max_size_mb, "Using LMDB cache store");
            Ok(Arc::new(store))
        }
    }
}

/// Build the HTTP transport wrapped in breaker, timeout and retry.
pub fn build_invoker(
    config: &GatewayConfig,
    metrics: &EngineMetrics,
) -> ApiResult<Arc<dyn RemoteInvoker>> {
    let transport = HttpTransport::new(&config.remote.base_url, config.resilience.timeout())
        .map_err(|e| ApiError::internal_error(e.to_string()))?;
    let invoker =
        ResilientInvoker::new(transport, config.resilience.clone()).with_metrics(metrics.clone());
    info!(base_url = %config.remote.base_url, "Remote invoker ready");
    Ok(Arc::new(invoker))
}

/// Build a fully wired engine from a validated configuration.
pub fn build_engine(config: GatewayConfig, metrics: EngineMetrics) -> ApiResult<StrategyEngine> {
    let store = build_store(&config.cache)?;
    let invoker = build_invoker(&config, &metrics)?;
    let handle = ConfigHandle::new(config)?;
    Ok(StrategyEngine::builder(store, invoker, handle)
        .metrics(metrics)
        .build())
}
