//! DataGate Test Utilities
//!
//! Shared test infrastructure for the datagate workspace:
//! - Test doubles for the remote invoker, cache store and outcome sink
//! - Proptest generators for requests, source ids and freshness rules
//! - Fixtures for the freshness timeline scenarios
//! - Assertions on classified errors

// Re-export core types for convenience
pub use datagate_core::{
    CacheEntry, CacheError, CacheKey, CacheResult, Clock, DataGateError, DataGateResult,
    FailureKind, FreshnessRule, GatewayConfig, HitKind, ManualClock, Outcome, OutcomeEvent,
    OutcomeSink, RemoteError, RemoteInvoker, RemoteResult, SourceId, SpecificDataRequest,
    SpecificDataResponse, StrategyPolicy, Timestamp,
};
pub use datagate_storage::{CacheStats, CacheStore, InMemoryCacheStore};

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::watch;

// ============================================================================
// TEST DOUBLES
// ============================================================================

/// One recorded call to a [`ScriptedInvoker`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub request: SpecificDataRequest,
    pub source_id: SourceId,
    pub operation: String,
}

/// Remote invoker that replays scripted results and counts calls.
///
/// Once the script is exhausted every call succeeds with `{"call": n}`,
/// where `n` is the 1-based call number. A held invoker parks every call
/// until [`ScriptedInvoker::release`] is called.
#[derive(Debug)]
pub struct ScriptedInvoker {
    script: Mutex<VecDeque<RemoteResult<SpecificDataResponse>>>,
    calls: AtomicUsize,
    completed: AtomicUsize,
    gate: watch::Sender<bool>,
    recorded: Mutex<Vec<RecordedCall>>,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self::with_script(Vec::new())
    }

    pub fn with_script(steps: Vec<RemoteResult<SpecificDataResponse>>) -> Self {
        let (gate, _rx) = watch::channel(true);
        Self {
            script: Mutex::new(steps.into()),
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            gate,
            recorded: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails with `err`.
    pub fn failing(err: RemoteError) -> Self {
        Self::with_script((0..64).map(|_| Err(err.clone())).collect())
    }

    /// Calls park until released.
    pub fn held() -> Self {
        let invoker = Self::new();
        invoker.gate.send_replace(false);
        invoker
    }

    pub fn push(&self, step: RemoteResult<SpecificDataResponse>) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(step);
    }

    /// Let parked and future calls proceed.
    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    /// Calls started.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls that returned.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn recorded(&self) -> Vec<RecordedCall> {
        self.recorded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Wait until `n` calls have returned. Returns false on timeout.
    pub async fn wait_for_completed(&self, n: usize, timeout: Duration) -> bool {
        wait_until(timeout, || self.completed() >= n).await
    }
}

impl Default for ScriptedInvoker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteInvoker for ScriptedInvoker {
    async fn invoke(
        &self,
        request: &SpecificDataRequest,
        source_id: &SourceId,
        operation: &str,
    ) -> RemoteResult<SpecificDataResponse> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.recorded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedCall {
                request: request.clone(),
                source_id: source_id.clone(),
                operation: operation.to_string(),
            });

        let mut rx = self.gate.subscribe();
        let opened = rx.wait_for(|open| *open).await.is_ok();
        debug_assert!(opened, "invoker gate dropped while a call was parked");

        let step = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        let result = step.unwrap_or_else(|| Ok(SpecificDataResponse::new(json!({ "call": n }))));
        self.completed.fetch_add(1, Ordering::SeqCst);
        result
    }
}

/// Cache store whose reads and writes can be made to fail.
#[derive(Debug, Default)]
pub struct FailingCacheStore {
    inner: InMemoryCacheStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FailingCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads and writes both fail.
    pub fn unavailable() -> Self {
        let store = Self::new();
        store.set_fail_reads(true);
        store.set_fail_writes(true);
        store
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// The backing store, bypassing failure injection.
    pub fn inner(&self) -> &InMemoryCacheStore {
        &self.inner
    }

    fn unavailable_error() -> CacheError {
        CacheError::Unavailable {
            reason: "injected failure".to_string(),
        }
    }
}

#[async_trait]
impl CacheStore for FailingCacheStore {
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<CacheEntry>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::unavailable_error());
        }
        self.inner.get(key).await
    }

    async fn put(&self, key: &CacheKey, entry: CacheEntry) -> CacheResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::unavailable_error());
        }
        self.inner.put(key, entry).await
    }

    async fn invalidate(&self, key: &CacheKey) -> CacheResult<bool> {
        self.inner.invalidate(key).await
    }

    async fn invalidate_source(&self, source_id: &SourceId) -> CacheResult<u64> {
        self.inner.invalidate_source(source_id).await
    }

    async fn purge_expired(&self, now: Timestamp) -> CacheResult<u64> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::unavailable_error());
        }
        self.inner.purge_expired(now).await
    }

    async fn stats(&self) -> CacheResult<CacheStats> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::unavailable_error());
        }
        self.inner.stats().await
    }
}

/// Outcome sink that keeps every event.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<OutcomeEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<OutcomeEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Outcomes recorded on the request path, in order.
    pub fn request_outcomes(&self) -> Vec<Outcome> {
        self.events()
            .into_iter()
            .filter(|e| !e.background)
            .map(|e| e.outcome)
            .collect()
    }

    /// Outcomes recorded by background refreshes, in order.
    pub fn background_outcomes(&self) -> Vec<Outcome> {
        self.events()
            .into_iter()
            .filter(|e| e.background)
            .map(|e| e.outcome)
            .collect()
    }

    /// Wait until `n` background events are recorded. Returns false on timeout.
    pub async fn wait_for_background(&self, n: usize, timeout: Duration) -> bool {
        wait_until(timeout, || self.background_outcomes().len() >= n).await
    }
}

impl OutcomeSink for RecordingSink {
    fn record(&self, event: &OutcomeEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
    }
}

/// Poll `cond` every millisecond until it holds or `timeout` passes.
pub async fn wait_until<F: Fn() -> bool>(timeout: Duration, cond: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for datagate request types.

    use super::*;
    use proptest::prelude::*;
    use serde_json::Value;

    /// Source ids accepted by the admission gate.
    pub fn arb_source_id() -> impl Strategy<Value = SourceId> {
        "[A-Za-z0-9][A-Za-z0-9_.-]{0,15}".prop_map(SourceId::new)
    }

    pub fn arb_data_type() -> impl Strategy<Value = String> {
        "[a-z][a-z_]{0,11}"
    }

    /// Scalar JSON parameter values.
    pub fn arb_param_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<i64>().prop_map(Value::from),
            any::<bool>().prop_map(Value::from),
            "[a-zA-Z0-9 ]{0,12}".prop_map(Value::from),
            Just(Value::Null),
        ]
    }

    pub fn arb_request() -> impl Strategy<Value = SpecificDataRequest> {
        (
            arb_data_type(),
            proptest::collection::btree_map("[a-z]{1,8}", arb_param_value(), 0..6),
        )
            .prop_map(|(data_type, params)| SpecificDataRequest { data_type, params })
    }

    /// Rules with a positive ttl.
    pub fn arb_freshness_rule() -> impl Strategy<Value = FreshnessRule> {
        (1u64..3600, 0u64..3600).prop_map(|(ttl, grace)| FreshnessRule::from_secs(ttl, grace))
    }

    pub fn arb_policy() -> impl Strategy<Value = StrategyPolicy> {
        prop_oneof![Just(StrategyPolicy::Passive), Just(StrategyPolicy::Active)]
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for the freshness timeline scenarios.

    use super::*;
    use chrono::DateTime;

    /// Epoch second used as `t=0` in scenarios.
    pub const T0_EPOCH_SECS: i64 = 1_700_000_000;

    /// Timestamp `secs` seconds after `t=0`.
    pub fn at(secs: i64) -> Timestamp {
        DateTime::from_timestamp(T0_EPOCH_SECS + secs, 0).unwrap_or_default()
    }

    /// Manual clock positioned at `t=0`.
    pub fn clock_at_t0() -> ManualClock {
        ManualClock::new(at(0))
    }

    /// `ttl=60s`, `staleGrace=30s`.
    pub fn scenario_rule() -> FreshnessRule {
        FreshnessRule::from_secs(60, 30)
    }

    pub fn source() -> SourceId {
        SourceId::new("billing")
    }

    pub fn request(id: i64) -> SpecificDataRequest {
        SpecificDataRequest::new("quote").with_param("id", json!(id))
    }

    pub fn response(v: serde_json::Value) -> SpecificDataResponse {
        SpecificDataResponse::new(v)
    }

    /// Entry for `value` written at `t=written_secs` under the scenario rule.
    pub fn entry_at(value: serde_json::Value, written_secs: i64) -> CacheEntry {
        CacheEntry::from_rule(response(value), at(written_secs), &scenario_rule())
    }

    /// Gateway config using `policy` with the scenario rule as default.
    pub fn config_with_policy(policy: StrategyPolicy) -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.default_policy = policy.as_str().to_string();
        config.default_freshness.ttl_secs = 60;
        config.default_freshness.stale_grace_secs = 30;
        config
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on classified errors.

    use super::*;

    /// Assert that a result is a remote error of `kind`.
    #[track_caller]
    pub fn assert_remote_kind<T: std::fmt::Debug>(result: &DataGateResult<T>, kind: FailureKind) {
        match result {
            Err(DataGateError::Remote(e)) => {
                assert_eq!(e.kind(), kind, "Wrong remote failure kind: {:?}", e)
            }
            other => panic!("Expected remote {:?} error, got: {:?}", kind, other),
        }
    }

    /// Assert that a result is a context error.
    #[track_caller]
    pub fn assert_context_error<T: std::fmt::Debug>(result: &DataGateResult<T>) {
        match result {
            Err(DataGateError::Context(_)) => {}
            other => panic!("Expected Context error, got: {:?}", other),
        }
    }

    /// Assert that a result is a configuration error.
    #[track_caller]
    pub fn assert_config_error<T: std::fmt::Debug>(result: &DataGateResult<T>) {
        match result {
            Err(DataGateError::Config(_)) => {}
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }
}
