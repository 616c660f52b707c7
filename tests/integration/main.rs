//! Integration tests for hierarchical cost enforcement.

mod blocks;
mod concurrency;
mod scenarios;

use std::sync::Arc;

use querycost::cost::{ChainedEnforcer, Cost, CostEnforcer, Enforcer, Limit, Report};

/// Enforcer with an enabled limit at `threshold`.
pub fn enforcer(threshold: f64) -> Enforcer {
    Enforcer::with_limit(Limit::enabled(Cost::new(threshold)))
}

/// Root with the given per-level thresholds (global first).
pub fn tree(thresholds: &[f64]) -> Arc<ChainedEnforcer> {
    let levels = thresholds.iter().map(|t| enforcer(*t)).collect();
    ChainedEnforcer::new("global", levels).expect("at least one level")
}

/// Current cost of `enforcer`'s own scope.
pub fn cur_cost(enforcer: &dyn CostEnforcer) -> Cost {
    enforcer.state().0.cost
}

/// Assert a report carries no error and the expected cost.
pub fn assert_clean(report: &Report, expected: f64) {
    assert_eq!(report, &Report::new(Cost::new(expected)));
}
