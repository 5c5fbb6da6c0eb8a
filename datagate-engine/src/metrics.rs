//! Prometheus metrics for the strategy engine.
//!
//! `EngineMetrics` owns its registry so that each engine (and each test) has
//! an isolated set of collectors.

use prometheus::{
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
    register_int_gauge_vec_with_registry, Encoder, HistogramVec, IntCounterVec, IntGaugeVec,
    Registry, TextEncoder,
};

use datagate_core::{CircuitState, OutcomeEvent, OutcomeSink};

/// Strategy latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const STRATEGY_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Background refresh results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshResult {
    Started,
    Skipped,
    Success,
    Failure,
}

impl RefreshResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Skipped => "skipped",
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// Container for all engine metrics.
#[derive(Clone)]
pub struct EngineMetrics {
    registry: Registry,

    /// Strategy outcomes - labels: strategy, outcome
    pub strategy_outcomes_total: IntCounterVec,

    /// Strategy duration histogram - labels: strategy, outcome
    pub strategy_duration_seconds: HistogramVec,

    /// Background refreshes - labels: result
    pub background_refresh_total: IntCounterVec,

    /// Remote calls - labels: operation, result
    pub remote_calls_total: IntCounterVec,

    /// Circuit state (0 closed, 1 open, 2 half-open) - labels: operation
    pub circuit_state: IntGaugeVec,
}

impl EngineMetrics {
    /// Create all metrics in a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_registry(Registry::new())
    }

    /// Create all metrics in `registry`.
    pub fn with_registry(registry: Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            strategy_outcomes_total: register_int_counter_vec_with_registry!(
                "datagate_strategy_outcomes_total",
                "Total strategy invocations by outcome",
                &["strategy", "outcome"],
                registry
            )?,
            strategy_duration_seconds: register_histogram_vec_with_registry!(
                "datagate_strategy_duration_seconds",
                "Strategy execution time since request start in seconds",
                &["strategy", "outcome"],
                STRATEGY_LATENCY_BUCKETS.to_vec(),
                registry
            )?,
            background_refresh_total: register_int_counter_vec_with_registry!(
                "datagate_background_refresh_total",
                "Background refreshes by result",
                &["result"],
                registry
            )?,
            remote_calls_total: register_int_counter_vec_with_registry!(
                "datagate_remote_calls_total",
                "Remote data service calls by result",
                &["operation", "result"],
                registry
            )?,
            circuit_state: register_int_gauge_vec_with_registry!(
                "datagate_circuit_state",
                "Circuit breaker state (0 closed, 1 open, 2 half-open)",
                &["operation"],
                registry
            )?,
            registry,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record a background refresh transition.
    pub fn record_refresh(&self, result: RefreshResult) {
        self.background_refresh_total
            .with_label_values(&[result.as_str()])
            .inc();
    }

    /// Record one remote attempt. `result` is "success" or a failure kind.
    pub fn record_remote_call(&self, operation: &str, result: &str) {
        self.remote_calls_total
            .with_label_values(&[operation, result])
            .inc();
    }

    pub fn set_circuit_state(&self, operation: &str, state: CircuitState) {
        self.circuit_state
            .with_label_values(&[operation])
            .set(state as i64);
    }

    /// Render all metrics in Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl OutcomeSink for EngineMetrics {
    fn record(&self, event: &OutcomeEvent) {
        if event.background {
            let result = if event.outcome.is_failure() {
                RefreshResult::Failure
            } else {
                RefreshResult::Success
            };
            self.record_refresh(result);
            return;
        }

        let strategy = event.strategy.as_str();
        let outcome = event.outcome.label();
        self.strategy_outcomes_total
            .with_label_values(&[strategy, outcome])
            .inc();
        self.strategy_duration_seconds
            .with_label_values(&[strategy, outcome])
            .observe(event.elapsed.as_secs_f64());
    }
}

impl std::fmt::Debug for EngineMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineMetrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datagate_core::{
        CacheKey, FailureKind, HitKind, Outcome, SourceId, SpecificDataRequest, StrategyPolicy,
    };
    use std::time::Duration;

    fn event(outcome: Outcome, background: bool) -> OutcomeEvent {
        let source_id = SourceId::new("billing");
        OutcomeEvent {
            strategy: StrategyPolicy::Active,
            outcome,
            cache_key: CacheKey::derive(&source_id, &SpecificDataRequest::new("quote")),
            source_id,
            api_path: "/v1/specific-data".to_string(),
            elapsed: Duration::from_millis(12),
            background,
        }
    }

    #[test]
    fn test_isolated_registries() {
        // Two instances must not collide on registration.
        let a = EngineMetrics::new().unwrap();
        let b = EngineMetrics::new().unwrap();
        a.record(&event(Outcome::CacheMiss, false));
        assert_eq!(
            a.strategy_outcomes_total
                .with_label_values(&["active", "miss"])
                .get(),
            1
        );
        assert_eq!(
            b.strategy_outcomes_total
                .with_label_values(&["active", "miss"])
                .get(),
            0
        );
    }

    #[test]
    fn test_background_events_count_as_refreshes() {
        let m = EngineMetrics::new().unwrap();
        m.record(&event(Outcome::RemoteSuccess, true));
        m.record(&event(Outcome::RemoteFailure(FailureKind::Server), true));
        m.record(&event(Outcome::CacheHit(HitKind::Stale), false));

        assert_eq!(
            m.background_refresh_total
                .with_label_values(&["success"])
                .get(),
            1
        );
        assert_eq!(
            m.background_refresh_total
                .with_label_values(&["failure"])
                .get(),
            1
        );
        assert_eq!(
            m.strategy_outcomes_total
                .with_label_values(&["active", "remote_success"])
                .get(),
            0
        );
    }

    #[test]
    fn test_render_contains_metric_names() {
        let m = EngineMetrics::new().unwrap();
        m.record(&event(Outcome::CacheHit(HitKind::Fresh), false));
        m.record_remote_call("specific-data", "success");
        m.set_circuit_state("specific-data", CircuitState::Open);

        let text = m.render().unwrap();
        assert!(text.contains("datagate_strategy_outcomes_total"));
        assert!(text.contains("datagate_remote_calls_total"));
        assert!(text.contains("datagate_circuit_state"));
    }
}
