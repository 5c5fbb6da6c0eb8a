//! Strategy engine facade.
//!
//! Resolves the policy and freshness rule from one configuration snapshot,
//! builds the request context and runs the selected strategy.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use datagate_core::{
    CircuitState, Clock, DataGateResult, NoopSink, Outcome, OutcomeSink, RemoteInvoker, SourceId,
    SpecificDataRequest, SpecificDataResponse, StrategyContext, StrategyPolicy, SystemClock,
};
use datagate_storage::{CacheStore, RefreshGate};

use crate::metrics::EngineMetrics;
use crate::snapshot::{ConfigHandle, ConfigSnapshot};
use crate::strategy::{StrategyDeps, StrategySet};

/// A successfully served request.
#[derive(Debug, Clone, PartialEq)]
pub struct Served {
    pub response: SpecificDataResponse,
    pub outcome: Outcome,
    pub policy: StrategyPolicy,
    pub request_id: Uuid,
    pub config_version: u64,
    pub diagnostics: BTreeMap<String, String>,
}

/// Wires store, invoker, refresh gate, clock, sink and configuration.
pub struct StrategyEngine {
    strategies: StrategySet,
    deps: StrategyDeps,
    gate: RefreshGate,
    config: ConfigHandle,
}

impl StrategyEngine {
    pub fn builder(
        store: Arc<dyn CacheStore>,
        invoker: Arc<dyn RemoteInvoker>,
        config: ConfigHandle,
    ) -> StrategyEngineBuilder {
        StrategyEngineBuilder {
            store,
            invoker,
            config,
            clock: None,
            sink: None,
            metrics: None,
            gate: None,
        }
    }

    /// Serve one request under the current configuration snapshot.
    pub async fn handle(
        &self,
        request: SpecificDataRequest,
        source_id: SourceId,
        api_path: &str,
    ) -> DataGateResult<Served> {
        self.handle_with_snapshot(self.config.snapshot(), request, source_id, api_path)
            .await
    }

    /// Serve one request under `snapshot`.
    ///
    /// Callers that already consulted a snapshot (for admission) pass it here
    /// so the whole request sees one configuration version; a reload during
    /// the request does not affect it. Policy resolution happens before
    /// context validation, so an unknown policy name fails as a configuration
    /// error.
    pub async fn handle_with_snapshot(
        &self,
        snapshot: Arc<ConfigSnapshot>,
        request: SpecificDataRequest,
        source_id: SourceId,
        api_path: &str,
    ) -> DataGateResult<Served> {
        let config = snapshot.config();

        let strategy = self.strategies.resolve(config, &source_id)?;
        let policy = strategy.policy();
        let rule = config.freshness_for(&request.data_type);

        let mut ctx = StrategyContext::new(request, source_id, rule, policy, self.deps.clock.now())
            .with_api_path(api_path);

        let (outcome, result) = strategy.execute_with_outcome(&mut ctx).await;

        debug!(
            request_id = %ctx.request_id(),
            outcome = %outcome,
            config_version = snapshot.version(),
            diagnostics = ?ctx.extra_params(),
            "Strategy finished"
        );

        Ok(Served {
            response: result?,
            outcome,
            policy,
            request_id: ctx.request_id(),
            config_version: snapshot.version(),
            diagnostics: ctx.extra_params().clone(),
        })
    }

    pub fn strategies(&self) -> &StrategySet {
        &self.strategies
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.deps.store
    }

    pub fn gate(&self) -> &RefreshGate {
        &self.gate
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.deps.clock
    }

    pub fn metrics(&self) -> Option<&EngineMetrics> {
        self.deps.metrics.as_ref()
    }

    pub fn circuit_state(&self) -> Option<CircuitState> {
        self.deps.invoker.circuit_state()
    }
}

/// Builder for [`StrategyEngine`].
pub struct StrategyEngineBuilder {
    store: Arc<dyn CacheStore>,
    invoker: Arc<dyn RemoteInvoker>,
    config: ConfigHandle,
    clock: Option<Arc<dyn Clock>>,
    sink: Option<Arc<dyn OutcomeSink>>,
    metrics: Option<EngineMetrics>,
    gate: Option<RefreshGate>,
}

impl StrategyEngineBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Outcome sink. Defaults to the metrics, or a no-op without metrics.
    pub fn sink(mut self, sink: Arc<dyn OutcomeSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn metrics(mut self, metrics: EngineMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn gate(mut self, gate: RefreshGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn build(self) -> StrategyEngine {
        let sink: Arc<dyn OutcomeSink> = match (self.sink, &self.metrics) {
            (Some(sink), _) => sink,
            (None, Some(metrics)) => Arc::new(metrics.clone()),
            (None, None) => Arc::new(NoopSink),
        };
        let deps = StrategyDeps {
            store: self.store,
            invoker: self.invoker,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            sink,
            metrics: self.metrics,
        };
        let gate = self.gate.unwrap_or_default();

        StrategyEngine {
            strategies: StrategySet::new(deps.clone(), gate.clone()),
            deps,
            gate,
            config: self.config,
        }
    }
}
