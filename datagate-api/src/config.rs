//! Process-level settings for the API binary.
//!
//! Gateway behavior (policies, freshness, resilience) lives in
//! [`datagate_core::GatewayConfig`]; this covers only where the process
//! listens and where it finds that configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    DEFAULT_BIND_HOST, DEFAULT_CACHE_PURGE_INTERVAL_SECS, DEFAULT_CONFIG_RELOAD_INTERVAL_SECS,
    DEFAULT_PORT,
};

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    /// TOML gateway configuration. `None` runs on defaults without reload.
    pub config_path: Option<PathBuf>,
    pub reload_interval: Duration,
    pub purge_interval: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            config_path: None,
            reload_interval: Duration::from_secs(DEFAULT_CONFIG_RELOAD_INTERVAL_SECS),
            purge_interval: Duration::from_secs(DEFAULT_CACHE_PURGE_INTERVAL_SECS),
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `DATAGATE_API_BIND`: full bind address, e.g. `127.0.0.1:8080`
    /// - `DATAGATE_API_HOST` / `PORT`: used when `DATAGATE_API_BIND` is unset
    /// - `DATAGATE_CONFIG_PATH`: gateway TOML file
    /// - `DATAGATE_CONFIG_RELOAD_SECS`: reload poll interval (default: 5)
    /// - `DATAGATE_CACHE_PURGE_SECS`: expired-entry sweep interval (default: 60)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_addr = std::env::var("DATAGATE_API_BIND")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| {
                let host = std::env::var("DATAGATE_API_HOST")
                    .ok()
                    .and_then(|s| s.parse::<IpAddr>().ok())
                    .or_else(|| DEFAULT_BIND_HOST.parse().ok())
                    .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
                let port = std::env::var("PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_PORT);
                SocketAddr::new(host, port)
            });

        let config_path = std::env::var("DATAGATE_CONFIG_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let reload_interval = std::env::var("DATAGATE_CONFIG_RELOAD_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|secs: &u64| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.reload_interval);

        let purge_interval = std::env::var("DATAGATE_CACHE_PURGE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|secs: &u64| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.purge_interval);

        Self {
            bind_addr,
            config_path,
            reload_interval,
            purge_interval,
        }
    }
}
