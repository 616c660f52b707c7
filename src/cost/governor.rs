//! Enforcer tree built from configuration.

use std::sync::Arc;

use tracing::info;

use super::chain::{ChainedEnforcer, GLOBAL_LEVEL};
use super::config::{ConfigError, CostConfig, LevelConfig};
use super::enforcer::{Enforcer, EnforcerOptions};
use super::limit::{DynamicLimitManager, LimitManagerOptions};
use super::tracker::AtomicTracker;
use crate::metrics::{EnforcerMetrics, EnforcerMetricsSnapshot};

/// Handles to one configured level: its limit source and its metrics.
#[derive(Debug, Clone)]
pub struct GovernedLevel {
    name: &'static str,
    limits: Arc<DynamicLimitManager>,
    metrics: Arc<EnforcerMetrics>,
}

impl GovernedLevel {
    fn build(name: &'static str, config: &LevelConfig) -> (Self, Enforcer) {
        let limits = Arc::new(DynamicLimitManager::new(
            LimitManagerOptions::new().with_default_limit(config.limit()),
        ));
        let metrics = Arc::new(EnforcerMetrics::new(name));

        let mut options = EnforcerOptions::new().with_reporter(metrics.clone());
        if let Some(message) = &config.message {
            options = options.with_cost_exceeded_message(message.clone());
        }
        let enforcer = Enforcer::new(limits.clone(), Arc::new(AtomicTracker::new()), options);

        (
            Self {
                name,
                limits,
                metrics,
            },
            enforcer,
        )
    }

    /// Level name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Limit source shared by every enforcer of this level.
    pub fn limits(&self) -> &Arc<DynamicLimitManager> {
        &self.limits
    }

    /// Metrics shared by every enforcer of this level.
    pub fn metrics(&self) -> &Arc<EnforcerMetrics> {
        &self.metrics
    }
}

/// The global enforcer tree of a query coordinator.
///
/// Holds the root (global) node plus the limit source of each level, so a
/// new [`CostConfig`] can be applied to live enforcers with
/// [`apply`](Self::apply). Violation messages are fixed when the governor
/// is built.
#[derive(Debug, Clone)]
pub struct CostGovernor {
    root: Arc<ChainedEnforcer>,
    global: GovernedLevel,
    query: GovernedLevel,
    block: GovernedLevel,
}

impl CostGovernor {
    /// Build the global -> query -> block tree described by `config`.
    pub fn new(config: &CostConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let (global, global_enforcer) = GovernedLevel::build("global", &config.global);
        let (query, query_enforcer) = GovernedLevel::build("query", &config.query);
        let (block, block_enforcer) = GovernedLevel::build("block", &config.block);

        let root = ChainedEnforcer::new(
            GLOBAL_LEVEL,
            vec![global_enforcer, query_enforcer, block_enforcer],
        )?;

        Ok(Self {
            root,
            global,
            query,
            block,
        })
    }

    /// Root (global) node.
    pub fn root(&self) -> &Arc<ChainedEnforcer> {
        &self.root
    }

    /// Start accounting for a new query.
    pub fn query(&self, resource_name: impl Into<String>) -> Arc<ChainedEnforcer> {
        self.root.child(resource_name)
    }

    /// Update every level's limit from `config`.
    ///
    /// Existing enforcers pick up the new limits on their next add.
    pub fn apply(&self, config: &CostConfig) -> Result<(), ConfigError> {
        config.validate()?;
        for (level, level_config) in self.levels().into_iter().zip([
            &config.global,
            &config.query,
            &config.block,
        ]) {
            level.limits.set_default_limit(level_config.limit());
        }
        info!(
            global = ?config.global.limit(),
            query = ?config.query.limit(),
            block = ?config.block.limit(),
            "cost limits reloaded"
        );
        Ok(())
    }

    /// Levels in tree order: global, query, block.
    pub fn levels(&self) -> [&GovernedLevel; 3] {
        [&self.global, &self.query, &self.block]
    }

    /// Metrics of every level.
    pub fn metrics(&self) -> Vec<EnforcerMetricsSnapshot> {
        self.levels()
            .iter()
            .map(|level| level.metrics.snapshot())
            .collect()
    }
}

impl CostConfig {
    /// Build a [`CostGovernor`] from this config.
    pub fn build(&self) -> Result<CostGovernor, ConfigError> {
        CostGovernor::new(self)
    }
}
