//! Strategy selection by configured policy.

use std::str::FromStr;

use datagate_core::{ConfigError, GatewayConfig, SourceId, StrategyPolicy};
use datagate_storage::RefreshGate;

use super::{ActiveStrategy, PassiveStrategy, Strategy, StrategyDeps};

/// One instance of each strategy, sharing collaborators.
#[derive(Debug)]
pub struct StrategySet {
    passive: Strategy,
    active: Strategy,
}

impl StrategySet {
    pub fn new(deps: StrategyDeps, gate: RefreshGate) -> Self {
        Self {
            passive: Strategy::Passive(PassiveStrategy::new(deps.clone())),
            active: Strategy::Active(ActiveStrategy::new(deps, gate)),
        }
    }

    pub fn get(&self, policy: StrategyPolicy) -> &Strategy {
        match policy {
            StrategyPolicy::Passive => &self.passive,
            StrategyPolicy::Active => &self.active,
        }
    }

    /// Select by policy name. Unknown names are a configuration error.
    pub fn by_name(&self, name: &str) -> Result<&Strategy, ConfigError> {
        Ok(self.get(StrategyPolicy::from_str(name)?))
    }

    /// Select for a source under `config`: the source's own policy if one is
    /// configured, the default policy otherwise.
    pub fn resolve(
        &self,
        config: &GatewayConfig,
        source_id: &SourceId,
    ) -> Result<&Strategy, ConfigError> {
        Ok(self.get(config.resolve_policy(source_id)?))
    }
}
