//! Versioned configuration snapshots.
//!
//! Readers take one immutable snapshot per request and keep it until the
//! request completes. Updates validate first, then swap the whole snapshot
//! in one step; a rejected update leaves the current snapshot live.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use datagate_core::{ConfigError, GatewayConfig};

/// An immutable configuration with its version.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSnapshot {
    version: u64,
    config: GatewayConfig,
}

impl ConfigSnapshot {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Process-wide handle to the current configuration.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    tx: Arc<watch::Sender<Arc<ConfigSnapshot>>>,
}

impl ConfigHandle {
    /// Start at version 1 with a validated configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let (tx, _rx) = watch::channel(Arc::new(ConfigSnapshot { version: 1, config }));
        Ok(Self { tx: Arc::new(tx) })
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<ConfigSnapshot> {
        Arc::clone(&self.tx.borrow())
    }

    pub fn version(&self) -> u64 {
        self.tx.borrow().version
    }

    /// Validate and publish `config`. Returns the new version.
    pub fn update(&self, config: GatewayConfig) -> Result<u64, ConfigError> {
        config.validate()?;

        let mut version = 0;
        self.tx.send_modify(|current| {
            version = current.version + 1;
            *current = Arc::new(ConfigSnapshot { version, config });
        });
        info!(version, "Configuration snapshot updated");
        Ok(version)
    }

    /// Receiver notified on every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<ConfigSnapshot>> {
        self.tx.subscribe()
    }
}
