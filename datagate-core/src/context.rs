//! Request-scoped strategy context.
//!
//! Built once per request and passed through the execution pipeline. All
//! fields are fixed at construction; only `extra_params` can be written,
//! and it is reserved for strategy diagnostics.

use std::collections::BTreeMap;
use uuid::Uuid;

use crate::config::StrategyPolicy;
use crate::entry::FreshnessRule;
use crate::error::ContextError;
use crate::key::CacheKey;
use crate::request::{SourceId, SpecificDataRequest};
use crate::Timestamp;

/// Default API path recorded when the caller does not supply one.
pub const DEFAULT_API_PATH: &str = "/v1/specific-data";

#[derive(Debug, Clone)]
pub struct StrategyContext {
    request_id: Uuid,
    request: SpecificDataRequest,
    source_id: SourceId,
    cache_key: CacheKey,
    freshness_rule: FreshnessRule,
    start_time: Timestamp,
    api_path: String,
    strategy: StrategyPolicy,
    extra_params: BTreeMap<String, String>,
}

impl StrategyContext {
    /// Create a context, deriving the cache key from source and request.
    pub fn new(
        request: SpecificDataRequest,
        source_id: SourceId,
        freshness_rule: FreshnessRule,
        strategy: StrategyPolicy,
        start_time: Timestamp,
    ) -> Self {
        let cache_key = CacheKey::derive(&source_id, &request);
        Self {
            request_id: Uuid::now_v7(),
            request,
            source_id,
            cache_key,
            freshness_rule,
            start_time,
            api_path: DEFAULT_API_PATH.to_string(),
            strategy,
            extra_params: BTreeMap::new(),
        }
    }

    /// Set the API path the request arrived on.
    pub fn with_api_path(mut self, api_path: impl Into<String>) -> Self {
        self.api_path = api_path.into();
        self
    }

    /// Override the derived cache key.
    pub fn with_cache_key(mut self, cache_key: CacheKey) -> Self {
        self.cache_key = cache_key;
        self
    }

    /// Check that every identity and timing field is usable.
    ///
    /// `now` bounds `start_time`: a request cannot start in the future.
    pub fn validate(&self, now: Timestamp) -> Result<(), ContextError> {
        if self.source_id.is_empty() {
            return Err(ContextError::RequiredFieldMissing {
                field: "source_id".to_string(),
            });
        }
        if self.request.data_type.trim().is_empty() {
            return Err(ContextError::RequiredFieldMissing {
                field: "request.data_type".to_string(),
            });
        }
        if self.cache_key.is_empty() {
            return Err(ContextError::RequiredFieldMissing {
                field: "cache_key".to_string(),
            });
        }
        if self.api_path.trim().is_empty() {
            return Err(ContextError::RequiredFieldMissing {
                field: "api_path".to_string(),
            });
        }
        if self.freshness_rule.ttl.is_zero() {
            return Err(ContextError::InvalidValue {
                field: "freshness_rule.ttl".to_string(),
                reason: "ttl must be positive".to_string(),
            });
        }
        if self.start_time > now {
            return Err(ContextError::InvalidValue {
                field: "start_time".to_string(),
                reason: format!("start_time {} is after now {}", self.start_time, now),
            });
        }
        Ok(())
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn request(&self) -> &SpecificDataRequest {
        &self.request
    }

    pub fn source_id(&self) -> &SourceId {
        &self.source_id
    }

    pub fn cache_key(&self) -> &CacheKey {
        &self.cache_key
    }

    pub fn freshness_rule(&self) -> &FreshnessRule {
        &self.freshness_rule
    }

    pub fn start_time(&self) -> Timestamp {
        self.start_time
    }

    pub fn api_path(&self) -> &str {
        &self.api_path
    }

    pub fn strategy(&self) -> StrategyPolicy {
        self.strategy
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.as_str()
    }

    /// Record a diagnostic value.
    pub fn set_extra(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.extra_params.insert(key.into(), value.into());
    }

    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extra_params.get(key).map(String::as_str)
    }

    pub fn extra_params(&self) -> &BTreeMap<String, String> {
        &self.extra_params
    }
}
