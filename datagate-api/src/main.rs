//! datagate API Server Entry Point

use std::sync::Arc;

use tokio::sync::watch;

use datagate_api::{
    build_engine, create_api_router, init_tracing,
    jobs::{cache_purge_task, config_reload_task, ConfigReloader},
    ApiConfig, ApiError, ApiResult, AppState, TelemetryConfig,
};
use datagate_core::GatewayConfig;
use datagate_engine::EngineMetrics;

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing(&TelemetryConfig::from_env())?;

    let api_config = ApiConfig::from_env();

    let (gateway_config, initial_text) = match &api_config.config_path {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| {
                ApiError::internal_error(format!("Failed to read {}: {}", path.display(), e))
            })?;
            let config = GatewayConfig::from_toml_str(&text)?.with_env_overrides();
            tracing::info!(path = %path.display(), "Loaded gateway configuration");
            (config, Some(text))
        }
        None => {
            tracing::warn!("DATAGATE_CONFIG_PATH not set, using default gateway configuration");
            (GatewayConfig::default().with_env_overrides(), None)
        }
    };

    let metrics = EngineMetrics::new()
        .map_err(|e| ApiError::internal_error(format!("Failed to register metrics: {}", e)))?;
    let engine = Arc::new(build_engine(gateway_config, metrics)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut jobs = Vec::new();

    if let Some(path) = &api_config.config_path {
        let reloader = ConfigReloader::new(path, engine.config().clone(), initial_text);
        let interval = api_config.reload_interval;
        let rx = shutdown_rx.clone();
        jobs.push(tokio::spawn(async move {
            config_reload_task(reloader, interval, rx).await;
        }));
    }
    {
        let store = Arc::clone(engine.store());
        let clock = Arc::clone(engine.clock());
        let interval = api_config.purge_interval;
        let rx = shutdown_rx.clone();
        jobs.push(tokio::spawn(async move {
            cache_purge_task(store, clock, interval, rx).await;
        }));
    }

    let app = create_api_router(AppState::new(Arc::clone(&engine)));
    let listener = tokio::net::TcpListener::bind(api_config.bind_addr)
        .await
        .map_err(|e| {
            ApiError::internal_error(format!("Failed to bind {}: {}", api_config.bind_addr, e))
        })?;
    tracing::info!(addr = %api_config.bind_addr, "datagate API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    let _ = shutdown_tx.send(true);
    for job in jobs {
        let _ = job.await;
    }
    tracing::info!("datagate API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
