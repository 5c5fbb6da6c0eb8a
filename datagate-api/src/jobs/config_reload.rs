//! Configuration Hot Reload
//!
//! Polls the gateway TOML file and publishes a new snapshot when its content
//! changes. An invalid file is logged and skipped; the live snapshot stays
//! in place until a valid file appears.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use datagate_core::{ConfigError, GatewayConfig};
use datagate_engine::ConfigHandle;

/// Result of one reload check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// File content matches the last applied content.
    Unchanged,
    /// New snapshot published with this version.
    Applied(u64),
    /// File could not be read, parsed or validated.
    Rejected(ConfigError),
}

/// Tracks the config file and the handle it feeds.
pub struct ConfigReloader {
    path: PathBuf,
    handle: ConfigHandle,
    last_applied: Option<String>,
}

impl ConfigReloader {
    /// `initial` is the file content the handle was built from, if any.
    pub fn new(path: impl Into<PathBuf>, handle: ConfigHandle, initial: Option<String>) -> Self {
        Self {
            path: path.into(),
            handle,
            last_applied: initial,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check the file once and reload if it changed.
    pub async fn check_once(&mut self) -> ReloadOutcome {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) => {
                return ReloadOutcome::Rejected(ConfigError::Load {
                    path: self.path.display().to_string(),
                    reason: e.to_string(),
                })
            }
        };
        if self.last_applied.as_deref() == Some(text.as_str()) {
            return ReloadOutcome::Unchanged;
        }

        let parsed = GatewayConfig::from_toml_str(&text)
            .map(GatewayConfig::with_env_overrides)
            .and_then(|config| self.handle.update(config));
        match parsed {
            Ok(version) => {
                self.last_applied = Some(text);
                ReloadOutcome::Applied(version)
            }
            Err(e) => ReloadOutcome::Rejected(e),
        }
    }
}

// ============================================================================
// METRICS
// ============================================================================

#[derive(Debug, Default)]
pub struct ConfigReloadMetrics {
    pub checks: AtomicU64,
    pub reloads: AtomicU64,
    pub rejections: AtomicU64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Poll the config file until the shutdown signal is received.
///
/// A rejected file is logged once per distinct error so a broken file does
/// not flood the log every tick.
pub async fn config_reload_task(
    mut reloader: ConfigReloader,
    check_interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<ConfigReloadMetrics> {
    let metrics = Arc::new(ConfigReloadMetrics::default());
    let mut ticker = interval(check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_error: Option<ConfigError> = None;

    tracing::info!(
        path = %reloader.path().display(),
        check_interval = ?check_interval,
        "Config reload task started"
    );

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::info!("Config reload task shutting down");
                    break;
                }
            }

            _ = ticker.tick() => {
                metrics.checks.fetch_add(1, Ordering::Relaxed);
                match reloader.check_once().await {
                    ReloadOutcome::Unchanged => {}
                    ReloadOutcome::Applied(version) => {
                        metrics.reloads.fetch_add(1, Ordering::Relaxed);
                        last_error = None;
                        tracing::info!(version, "Configuration reloaded");
                    }
                    ReloadOutcome::Rejected(e) => {
                        metrics.rejections.fetch_add(1, Ordering::Relaxed);
                        if last_error.as_ref() != Some(&e) {
                            tracing::warn!(error = %e, "Configuration reload rejected, keeping current snapshot");
                            last_error = Some(e);
                        }
                    }
                }
            }
        }
    }

    metrics
}
