//! Configuration types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::entry::FreshnessRule;
use crate::error::ConfigError;
use crate::request::SourceId;

// ============================================================================
// DEFAULTS
// ============================================================================

pub const DEFAULT_TTL_SECS: u64 = 60;
pub const DEFAULT_STALE_GRACE_SECS: u64 = 30;
pub const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 3000;
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 100;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 2000;
pub const DEFAULT_BACKOFF_MULTIPLIER: f32 = 2.0;
pub const DEFAULT_CIRCUIT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_CIRCUIT_SUCCESS_THRESHOLD: u32 = 3;
pub const DEFAULT_CIRCUIT_OPEN_SECS: u64 = 30;
pub const DEFAULT_LMDB_MAX_SIZE_MB: usize = 512;

// ============================================================================
// STRATEGY POLICY
// ============================================================================

/// The closed set of cache strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyPolicy {
    /// Cache-aside: only fresh entries are served.
    Passive,
    /// Stale-while-revalidate: fresh and stale entries are served, stale
    /// hits trigger a single-flight background refresh.
    Active,
}

impl StrategyPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passive => "passive",
            Self::Active => "active",
        }
    }
}

impl fmt::Display for StrategyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyPolicy {
    type Err = ConfigError;

    /// Unknown names are an error; there is no silent default.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "passive" | "cache-aside" | "cache_aside" => Ok(Self::Passive),
            "active" | "stale-while-revalidate" | "stale_while_revalidate" | "swr" => {
                Ok(Self::Active)
            }
            _ => Err(ConfigError::UnknownPolicy {
                name: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// SECTIONS
// ============================================================================

/// Freshness rule as written in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessRuleConfig {
    pub ttl_secs: u64,
    #[serde(default)]
    pub stale_grace_secs: u64,
}

impl Default for FreshnessRuleConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL_SECS,
            stale_grace_secs: DEFAULT_STALE_GRACE_SECS,
        }
    }
}

impl From<FreshnessRuleConfig> for FreshnessRule {
    fn from(c: FreshnessRuleConfig) -> Self {
        FreshnessRule::from_secs(c.ttl_secs, c.stale_grace_secs)
    }
}

/// Retry configuration for remote calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryConfig {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based), capped at `max_backoff`.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31) as i32;
        let factor = f64::from(self.backoff_multiplier).powi(exponent);
        let millis = (self.initial_backoff_ms as f64 * factor).min(self.max_backoff_ms as f64);
        Duration::from_millis(millis.max(0.0) as u64)
    }
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub open_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_CIRCUIT_FAILURE_THRESHOLD,
            success_threshold: DEFAULT_CIRCUIT_SUCCESS_THRESHOLD,
            open_secs: DEFAULT_CIRCUIT_OPEN_SECS,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn open_timeout(&self) -> Duration {
        Duration::from_secs(self.open_secs)
    }
}

/// Parameters of the resilience capability around remote calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Per-attempt deadline.
    pub timeout_ms: u64,
    pub retry: RetryConfig,
    pub circuit: CircuitBreakerConfig,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_REMOTE_TIMEOUT_MS,
            retry: RetryConfig::default(),
            circuit: CircuitBreakerConfig::default(),
        }
    }
}

impl ResilienceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Remote data service location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub base_url: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8081".to_string(),
        }
    }
}

/// Cache store backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    Memory,
    Lmdb,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheBackendConfig {
    pub backend: CacheBackendKind,
    pub lmdb_path: String,
    pub lmdb_max_size_mb: usize,
}

impl Default for CacheBackendConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Memory,
            lmdb_path: "./data/datagate-cache".to_string(),
            lmdb_max_size_mb: DEFAULT_LMDB_MAX_SIZE_MB,
        }
    }
}

// ============================================================================
// GATEWAY CONFIG
// ============================================================================

/// Full gateway configuration.
///
/// Policy names are kept as written so that a bad name surfaces as a
/// configuration error at validation or selection time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub default_policy: String,
    pub source_policies: HashMap<String, String>,
    pub default_freshness: FreshnessRuleConfig,
    /// Freshness rule per data type (the cache key family).
    pub freshness_rules: HashMap<String, FreshnessRuleConfig>,
    /// Admitted source ids. Empty admits every well-formed id.
    pub whitelist: Vec<String>,
    pub resilience: ResilienceConfig,
    pub remote: RemoteConfig,
    pub cache: CacheBackendConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            default_policy: StrategyPolicy::Passive.as_str().to_string(),
            source_policies: HashMap::new(),
            default_freshness: FreshnessRuleConfig::default(),
            freshness_rules: HashMap::new(),
            whitelist: Vec::new(),
            resilience: ResilienceConfig::default(),
            remote: RemoteConfig::default(),
            cache: CacheBackendConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Parse from TOML text and validate.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Load {
            path: "<inline>".to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Load {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config: Self = toml::from_str(&text).map_err(|e| ConfigError::Load {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides.
    ///
    /// Environment variables:
    /// - `DATAGATE_DEFAULT_POLICY`: default strategy policy
    /// - `DATAGATE_REMOTE_BASE_URL`: remote data service base URL
    /// - `DATAGATE_REMOTE_TIMEOUT_MS`: per-attempt timeout
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(policy) = std::env::var("DATAGATE_DEFAULT_POLICY") {
            self.default_policy = policy;
        }
        if let Ok(url) = std::env::var("DATAGATE_REMOTE_BASE_URL") {
            self.remote.base_url = url;
        }
        if let Some(timeout_ms) = std::env::var("DATAGATE_REMOTE_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.resilience.timeout_ms = timeout_ms;
        }
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        StrategyPolicy::from_str(&self.default_policy)?;
        for policy in self.source_policies.values() {
            StrategyPolicy::from_str(policy)?;
        }

        if self.default_freshness.ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "default_freshness.ttl_secs".to_string(),
                value: "0".to_string(),
                reason: "ttl must be positive".to_string(),
            });
        }
        for (family, rule) in &self.freshness_rules {
            if rule.ttl_secs == 0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("freshness_rules.{}.ttl_secs", family),
                    value: "0".to_string(),
                    reason: "ttl must be positive".to_string(),
                });
            }
        }

        if self.resilience.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "resilience.timeout_ms".to_string(),
                value: "0".to_string(),
                reason: "timeout must be positive".to_string(),
            });
        }
        if self.resilience.retry.backoff_multiplier <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "resilience.retry.backoff_multiplier".to_string(),
                value: self.resilience.retry.backoff_multiplier.to_string(),
                reason: "backoff_multiplier must be positive".to_string(),
            });
        }
        if self.resilience.circuit.failure_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "resilience.circuit.failure_threshold".to_string(),
                value: "0".to_string(),
                reason: "failure_threshold must be positive".to_string(),
            });
        }
        if self.remote.base_url.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "remote.base_url".to_string(),
            });
        }

        Ok(())
    }

    /// Resolve the strategy policy for a source, falling back to the default.
    pub fn resolve_policy(&self, source_id: &SourceId) -> Result<StrategyPolicy, ConfigError> {
        let name = self
            .source_policies
            .get(source_id.as_str())
            .unwrap_or(&self.default_policy);
        StrategyPolicy::from_str(name)
    }

    /// Freshness rule for a data type (cache key family).
    pub fn freshness_for(&self, data_type: &str) -> FreshnessRule {
        self.freshness_rules
            .get(data_type)
            .copied()
            .unwrap_or(self.default_freshness)
            .into()
    }

    /// Whether a source id is admitted by the whitelist.
    pub fn is_whitelisted(&self, source_id: &str) -> bool {
        self.whitelist.is_empty() || self.whitelist.iter().any(|s| s == source_id)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parsing() {
        assert_eq!("passive".parse::<StrategyPolicy>().unwrap(), StrategyPolicy::Passive);
        assert_eq!("Cache-Aside".parse::<StrategyPolicy>().unwrap(), StrategyPolicy::Passive);
        assert_eq!("ACTIVE".parse::<StrategyPolicy>().unwrap(), StrategyPolicy::Active);
        assert_eq!(
            "stale-while-revalidate".parse::<StrategyPolicy>().unwrap(),
            StrategyPolicy::Active
        );
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let err = "lru".parse::<StrategyPolicy>().unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownPolicy {
                name: "lru".to_string()
            }
        );
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(GatewayConfig::default().validate().is_ok());
    }

    #[test]
    fn test_from_toml() {
        let config = GatewayConfig::from_toml_str(
            r#"
            default_policy = "active"
            whitelist = ["billing", "reports"]

            [source_policies]
            reports = "passive"

            [default_freshness]
            ttl_secs = 60
            stale_grace_secs = 30

            [freshness_rules.quote]
            ttl_secs = 5
            stale_grace_secs = 10

            [resilience]
            timeout_ms = 500

            [resilience.retry]
            max_retries = 1

            [remote]
            base_url = "http://remote:9000"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.resolve_policy(&SourceId::new("billing")).unwrap(),
            StrategyPolicy::Active
        );
        assert_eq!(
            config.resolve_policy(&SourceId::new("reports")).unwrap(),
            StrategyPolicy::Passive
        );
        assert_eq!(config.freshness_for("quote"), FreshnessRule::from_secs(5, 10));
        assert_eq!(config.freshness_for("other"), FreshnessRule::from_secs(60, 30));
        assert_eq!(config.resilience.timeout(), Duration::from_millis(500));
        assert_eq!(config.resilience.retry.max_retries, 1);
        assert_eq!(
            config.resilience.retry.initial_backoff_ms,
            DEFAULT_INITIAL_BACKOFF_MS
        );
        assert!(config.is_whitelisted("billing"));
        assert!(!config.is_whitelisted("intruder"));
    }

    #[test]
    fn test_from_toml_rejects_unknown_policy() {
        let err = GatewayConfig::from_toml_str(
            r#"
            [source_policies]
            billing = "write-behind"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPolicy { name } if name == "write-behind"));
    }

    #[test]
    fn test_resolve_policy_surfaces_unknown_name() {
        let mut config = GatewayConfig::default();
        config.default_policy = "bogus".to_string();
        assert!(matches!(
            config.resolve_policy(&SourceId::new("any")),
            Err(ConfigError::UnknownPolicy { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_ttl_and_timeout() {
        let mut config = GatewayConfig::default();
        config.freshness_rules.insert(
            "quote".to_string(),
            FreshnessRuleConfig {
                ttl_secs: 0,
                stale_grace_secs: 5,
            },
        );
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));

        let mut config = GatewayConfig::default();
        config.resilience.timeout_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_empty_whitelist_admits_all() {
        let config = GatewayConfig::default();
        assert!(config.is_whitelisted("anyone"));
    }

    #[test]
    fn test_backoff_schedule() {
        let retry = RetryConfig {
            max_retries: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 500,
            backoff_multiplier: 2.0,
        };
        assert_eq!(retry.backoff_for(1), Duration::from_millis(100));
        assert_eq!(retry.backoff_for(2), Duration::from_millis(200));
        assert_eq!(retry.backoff_for(3), Duration::from_millis(400));
        assert_eq!(retry.backoff_for(4), Duration::from_millis(500));
    }

    #[test]
    fn test_fixed_backoff_with_unit_multiplier() {
        let retry = RetryConfig {
            backoff_multiplier: 1.0,
            ..RetryConfig::default()
        };
        assert_eq!(retry.backoff_for(1), retry.backoff_for(4));
    }
}
