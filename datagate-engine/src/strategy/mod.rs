//! Cache strategies and their shared execution skeleton.
//!
//! Every strategy runs through [`StrategyCore::execute_with_outcome`]:
//!
//! 1. validate the context (a malformed context never reaches the store or
//!    the network)
//! 2. run the strategy's own decision procedure
//! 3. record exactly one [`Outcome`] with the elapsed time since the
//!    request's start
//! 4. hand the result back unchanged
//!
//! The set of strategies is closed: [`Strategy`] is a tagged enum selected
//! by [`StrategyPolicy`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info_span, warn, Instrument};

use datagate_core::{
    CacheEntry, CacheKey, Clock, DataGateResult, FailureKind, FreshnessRule, Outcome,
    OutcomeEvent, OutcomeSink, RemoteInvoker, SourceId, SpecificDataRequest,
    SpecificDataResponse, StrategyContext, StrategyPolicy, Timestamp, FETCH_OPERATION,
};
use datagate_storage::CacheStore;

use crate::metrics::EngineMetrics;

pub mod active;
pub mod passive;
pub mod selection;

pub use active::ActiveStrategy;
pub use passive::PassiveStrategy;
pub use selection::StrategySet;

/// Diagnostic key for the cache state observed by a strategy.
pub const EXTRA_CACHE_STATE: &str = "cache_state";
/// Diagnostic key for the background refresh decision.
pub const EXTRA_REFRESH: &str = "refresh";

/// Collaborators shared by all strategies.
#[derive(Clone)]
pub struct StrategyDeps {
    pub store: Arc<dyn CacheStore>,
    pub invoker: Arc<dyn RemoteInvoker>,
    pub clock: Arc<dyn Clock>,
    pub sink: Arc<dyn OutcomeSink>,
    pub metrics: Option<EngineMetrics>,
}

impl StrategyDeps {
    /// Elapsed time since `start`, zero if the clock reads earlier.
    pub(crate) fn elapsed_since(&self, start: Timestamp) -> Duration {
        self.clock
            .now()
            .signed_duration_since(start)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Read an entry, failing open to a miss when the store errors.
    pub(crate) async fn read_entry(&self, key: &CacheKey) -> Option<CacheEntry> {
        match self.store.get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(cache_key = %key, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    /// Fetch from the remote service and, on success, replace the entry.
    ///
    /// A failed write is logged and does not fail the fetch. A failed fetch
    /// leaves the store untouched.
    pub(crate) async fn fetch_and_store(
        &self,
        request: &SpecificDataRequest,
        source_id: &SourceId,
        key: &CacheKey,
        rule: &FreshnessRule,
    ) -> DataGateResult<SpecificDataResponse> {
        let response = self
            .invoker
            .invoke(request, source_id, FETCH_OPERATION)
            .await?;

        let entry = CacheEntry::from_rule(response.clone(), self.clock.now(), rule);
        if let Err(e) = self.store.put(key, entry).await {
            warn!(cache_key = %key, error = %e, "Cache write failed, serving fetched value");
        }
        Ok(response)
    }

    /// Synchronous miss path shared by both strategies.
    pub(crate) async fn miss(
        &self,
        ctx: &StrategyContext,
    ) -> (Outcome, DataGateResult<SpecificDataResponse>) {
        let result = self
            .fetch_and_store(
                ctx.request(),
                ctx.source_id(),
                ctx.cache_key(),
                ctx.freshness_rule(),
            )
            .await;
        let outcome = match &result {
            Ok(_) => Outcome::CacheMiss,
            Err(e) => Outcome::RemoteFailure(e.kind()),
        };
        (outcome, result)
    }
}

/// Build the event recorded for one request-path invocation.
pub(crate) fn outcome_event(
    policy: StrategyPolicy,
    ctx: &StrategyContext,
    outcome: Outcome,
    elapsed: Duration,
) -> OutcomeEvent {
    OutcomeEvent {
        strategy: policy,
        outcome,
        source_id: ctx.source_id().clone(),
        cache_key: ctx.cache_key().clone(),
        api_path: ctx.api_path().to_string(),
        elapsed,
        background: false,
    }
}

/// A strategy's decision procedure plus the shared skeleton around it.
#[async_trait]
pub trait StrategyCore: Send + Sync {
    fn policy(&self) -> StrategyPolicy;

    fn deps(&self) -> &StrategyDeps;

    /// The strategy-specific decision procedure. Runs on a validated context
    /// and reports the outcome alongside the result.
    async fn do_execute(
        &self,
        ctx: &mut StrategyContext,
    ) -> (Outcome, DataGateResult<SpecificDataResponse>);

    /// Validate, execute, record one outcome, propagate.
    async fn execute_with_outcome(
        &self,
        ctx: &mut StrategyContext,
    ) -> (Outcome, DataGateResult<SpecificDataResponse>) {
        let deps = self.deps();
        let policy = self.policy();

        if let Err(e) = ctx.validate(deps.clock.now()) {
            let outcome = Outcome::RemoteFailure(FailureKind::Context);
            warn!(strategy = policy.as_str(), error = %e, "Rejected malformed strategy context");
            let elapsed = deps.elapsed_since(ctx.start_time());
            deps.sink
                .record(&outcome_event(policy, ctx, outcome, elapsed));
            return (outcome, Err(e.into()));
        }

        let span = info_span!(
            "strategy",
            strategy = policy.as_str(),
            source_id = %ctx.source_id(),
            cache_key = %ctx.cache_key(),
            api_path = ctx.api_path(),
            request_id = %ctx.request_id(),
        );
        let (outcome, result) = self.do_execute(ctx).instrument(span).await;

        let elapsed = deps.elapsed_since(ctx.start_time());
        deps.sink
            .record(&outcome_event(policy, ctx, outcome, elapsed));
        (outcome, result)
    }

    /// Run the skeleton and return only the result.
    async fn execute(&self, ctx: &mut StrategyContext) -> DataGateResult<SpecificDataResponse> {
        self.execute_with_outcome(ctx).await.1
    }
}

/// The closed set of strategies.
pub enum Strategy {
    Passive(PassiveStrategy),
    Active(ActiveStrategy),
}

impl Strategy {
    pub fn policy(&self) -> StrategyPolicy {
        match self {
            Self::Passive(_) => StrategyPolicy::Passive,
            Self::Active(_) => StrategyPolicy::Active,
        }
    }

    pub async fn execute_with_outcome(
        &self,
        ctx: &mut StrategyContext,
    ) -> (Outcome, DataGateResult<SpecificDataResponse>) {
        match self {
            Self::Passive(s) => s.execute_with_outcome(ctx).await,
            Self::Active(s) => s.execute_with_outcome(ctx).await,
        }
    }

    pub async fn execute(&self, ctx: &mut StrategyContext) -> DataGateResult<SpecificDataResponse> {
        self.execute_with_outcome(ctx).await.1
    }
}

impl std::fmt::Debug for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Strategy").field(&self.policy()).finish()
    }
}
