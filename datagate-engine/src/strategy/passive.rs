//! Cache-aside strategy.
//!
//! Only fresh entries are served. Stale, expired and absent entries all take
//! the synchronous miss path, so a caller never sees data older than `ttl`.

use async_trait::async_trait;
use tracing::debug;

use datagate_core::{
    DataGateResult, EntryState, HitKind, Outcome, SpecificDataResponse, StrategyContext,
    StrategyPolicy,
};

use super::{StrategyCore, StrategyDeps, EXTRA_CACHE_STATE};

pub struct PassiveStrategy {
    deps: StrategyDeps,
}

impl PassiveStrategy {
    pub fn new(deps: StrategyDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl StrategyCore for PassiveStrategy {
    fn policy(&self) -> StrategyPolicy {
        StrategyPolicy::Passive
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
                if state == EntryState::Fresh {
                    debug!(age = ?entry.age_at(now), "Serving fresh entry");
                    return (Outcome::CacheHit(HitKind::Fresh), Ok(entry.into_value()));
                }
                debug!(state = state.as_str(), "Entry not fresh, fetching");
            }
            None => {
                ctx.set_extra(EXTRA_CACHE_STATE, "absent");
                debug!("No entry, fetching");
            }
        }

        self.deps.miss(ctx).await
    }
}
