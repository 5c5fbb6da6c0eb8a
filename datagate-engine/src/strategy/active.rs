//! Stale-while-revalidate strategy.
//!
//! Fresh and stale entries are served immediately. A stale hit also tries to
//! claim the key's [`RefreshTicket`](datagate_storage::RefreshTicket); the
//! winner refreshes in a detached task, everyone else skips. Absent and
//! expired entries take the synchronous miss path.

use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info_span, warn, Instrument};

use datagate_core::{
    DataGateResult, EntryState, HitKind, Outcome, OutcomeEvent, SpecificDataResponse,
    StrategyContext, StrategyPolicy,
};
use datagate_storage::RefreshGate;

use super::{StrategyCore, StrategyDeps, EXTRA_CACHE_STATE, EXTRA_REFRESH};
use crate::metrics::RefreshResult;

pub struct ActiveStrategy {
    deps: StrategyDeps,
    gate: RefreshGate,
}

impl ActiveStrategy {
    pub fn new(deps: StrategyDeps, gate: RefreshGate) -> Self {
        Self { deps, gate }
    }

    pub fn gate(&self) -> &RefreshGate {
        &self.gate
    }

    /// Launch a background refresh for the context's key unless one is
    /// already in flight.
    ///
    /// The refresh runs on its own task: cancelling the triggering request
    /// does not cancel it. The ticket moves into the task and is released
    /// when the task ends, whatever the result.
    fn spawn_refresh(&self, ctx: &StrategyContext) -> RefreshResult {
        let Some(ticket) = self.gate.try_acquire(ctx.cache_key()) else {
            debug!("Refresh already in flight, skipping");
            self.note_refresh(RefreshResult::Skipped);
            return RefreshResult::Skipped;
        };
        self.note_refresh(RefreshResult::Started);

        let deps = self.deps.clone();
        let request = ctx.request().clone();
        let source_id = ctx.source_id().clone();
        let cache_key = ctx.cache_key().clone();
        let rule = *ctx.freshness_rule();
        let api_path = ctx.api_path().to_string();

        let span = info_span!(
            "background_refresh",
            source_id = %source_id,
            cache_key = %cache_key,
            request_id = %ctx.request_id(),
        );

        tokio::spawn(
            async move {
                let _ticket = ticket;
                let started = Instant::now();

                let result = deps
                    .fetch_and_store(&request, &source_id, &cache_key, &rule)
                    .await;

                let outcome = match &result {
                    Ok(_) => {
                        debug!("Background refresh stored new entry");
                        Outcome::RemoteSuccess
                    }
                    Err(e) => {
                        warn!(error = %e, kind = e.kind().as_str(), "Background refresh failed, keeping stale entry");
                        Outcome::RemoteFailure(e.kind())
                    }
                };

                deps.sink.record(&OutcomeEvent {
                    strategy: StrategyPolicy::Active,
                    outcome,
                    source_id,
                    cache_key,
                    api_path,
                    elapsed: started.elapsed(),
                    background: true,
                });
            }
            .instrument(span),
        );

        RefreshResult::Started
    }

    fn note_refresh(&self, result: RefreshResult) {
        if let Some(metrics) = &self.deps.metrics {
            metrics.record_refresh(result);
        }
    }
}

#[async_trait]
impl StrategyCore for ActiveStrategy {
    fn policy(&self) -> StrategyPolicy {
        StrategyPolicy::Active
    }

    fn deps(&self) -> &StrategyDeps {
        &self.deps
    }

    async fn do_execute(
        &self,
        ctx: &mut StrategyContext,
    ) -> (Outcome, DataGateResult<SpecificDataResponse>) {
        let now = self.deps.clock.now();

        match self.deps.read_entry(ctx.cache_key()).await {
            Some(entry) => {
                let state = entry.state_at(now);
                ctx.set_extra(EXTRA_CACHE_STATE, state.as_str());
                match state {
                    EntryState::Fresh => {
                        return (Outcome::CacheHit(HitKind::Fresh), Ok(entry.into_value()));
                    }
                    EntryState::Stale => {
                        let refresh = self.spawn_refresh(ctx);
                        ctx.set_extra(EXTRA_REFRESH, refresh.as_str());
                        debug!(
                            age = ?entry.age_at(now),
                            refresh = refresh.as_str(),
                            "Serving stale entry"
                        );
                        return (Outcome::CacheHit(HitKind::Stale), Ok(entry.into_value()));
                    }
                    EntryState::Expired => {
                        debug!("Entry expired, fetching");
                    }
                }
            }
            None => {
                ctx.set_extra(EXTRA_CACHE_STATE, "absent");
                debug!("No entry, fetching");
            }
        }

        self.deps.miss(ctx).await
    }
}
