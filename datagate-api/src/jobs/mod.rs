//! Background Jobs for the datagate API
//!
//! - `config_reload`: Re-reads the gateway config file and swaps the snapshot
//! - `cache_purge`: Removes entries past their stale window
//!
//! Both stop when the shared shutdown signal flips to `true`:
//!
//! ```ignore
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! tokio::spawn(config_reload_task(reloader, interval, shutdown_rx.clone()));
//! tokio::spawn(cache_purge_task(store, clock, interval, shutdown_rx));
//! let _ = shutdown_tx.send(true);
//! ```

pub mod cache_purge;
pub mod config_reload;

pub use cache_purge::{cache_purge_task, purge_once, CachePurgeMetrics};
pub use config_reload::{config_reload_task, ConfigReloadMetrics, ConfigReloader, ReloadOutcome};
