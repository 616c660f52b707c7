//! Enforcer observability.
//!
//! Every call to [`Enforcer::add`](crate::cost::Enforcer::add) reports the
//! cost added and the new running total to an [`EnforcerReporter`], and
//! reports a violation whenever the total reaches the threshold, split by
//! whether the limit was enabled. That split shows how much work a shadow
//! limit *would* have rejected.
//!
//! The concrete metrics backend belongs to the embedding service; it plugs
//! in by implementing [`EnforcerReporter`]. [`EnforcerMetrics`] is the
//! in-process default.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::cost::{AtomicTracker, Cost, Tracker};

/// Listener for enforcer events.
pub trait EnforcerReporter: fmt::Debug + Send + Sync {
    /// Called on every add with the cost being added.
    fn report_cost(&self, cost: Cost);

    /// Called on every add with the resulting running total.
    fn report_current(&self, current: Cost);

    /// Called every time an add leaves the total at or over the threshold.
    /// `enabled` is whether the limit was enforced at the time.
    fn report_over_limit(&self, enabled: bool);
}

/// Reporter that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl EnforcerReporter for NoopReporter {
    fn report_cost(&self, _cost: Cost) {}

    fn report_current(&self, _current: Cost) {}

    fn report_over_limit(&self, _enabled: bool) {}
}

/// Default reporter: lock-free counters plus `tracing` events.
///
/// One instance is normally shared by every enforcer of a level, so the
/// counters aggregate over all scopes at that level and the running total
/// is only the last one any of those scopes reported.
#[derive(Debug, Default)]
pub struct EnforcerMetrics {
    scope: String,
    adds: AtomicU64,
    cost_added: AtomicTracker,
    last_observed: AtomicU64,
    over_limit: AtomicU64,
    over_limit_and_enabled: AtomicU64,
}

impl EnforcerMetrics {
    /// Create a reporter labelled with `scope`.
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            ..Self::default()
        }
    }

    /// Scope label.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Capture the current counter values.
    pub fn snapshot(&self) -> EnforcerMetricsSnapshot {
        EnforcerMetricsSnapshot {
            scope: self.scope.clone(),
            adds: self.adds.load(Ordering::Relaxed),
            cost_added: self.cost_added.current().value(),
            last_observed: Cost::from_bits(self.last_observed.load(Ordering::Relaxed)).value(),
            over_limit: self.over_limit.load(Ordering::Relaxed),
            over_limit_and_enabled: self.over_limit_and_enabled.load(Ordering::Relaxed),
        }
    }
}

impl EnforcerReporter for EnforcerMetrics {
    fn report_cost(&self, cost: Cost) {
        self.adds.fetch_add(1, Ordering::Relaxed);
        self.cost_added.add(cost);
    }

    fn report_current(&self, current: Cost) {
        self.last_observed.store(current.to_bits(), Ordering::Relaxed);
        trace!(scope = %self.scope, %current, "cost total updated");
    }

    fn report_over_limit(&self, enabled: bool) {
        if enabled {
            self.over_limit_and_enabled.fetch_add(1, Ordering::Relaxed);
            warn!(scope = %self.scope, "cost limit exceeded");
        } else {
            self.over_limit.fetch_add(1, Ordering::Relaxed);
            debug!(scope = %self.scope, "disabled cost limit exceeded");
        }
    }
}

/// Point-in-time view of an [`EnforcerMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnforcerMetricsSnapshot {
    pub scope: String,
    /// Number of add calls
    pub adds: u64,
    /// Sum of all costs added (releases included as negatives)
    pub cost_added: f64,
    /// Running total from the most recent add of any scope sharing this
    /// reporter, not a sum over scopes
    pub last_observed: f64,
    /// Violations while the limit was disabled
    pub over_limit: u64,
    /// Violations while the limit was enabled
    pub over_limit_and_enabled: u64,
}

impl EnforcerMetricsSnapshot {
    /// Total violations regardless of enforcement.
    pub fn total_over_limit(&self) -> u64 {
        self.over_limit + self.over_limit_and_enabled
    }

    /// Format as a human-readable string.
    pub fn format(&self) -> String {
        let mut output = format!("## Cost Metrics: {}\n\n", self.scope);
        output.push_str(&format!("**Adds**: {}\n", self.adds));
        output.push_str(&format!("**Cost Added**: {}\n", self.cost_added));
        output.push_str(&format!("**Last Observed Total**: {}\n", self.last_observed));
        output.push_str(&format!(
            "**Over Limit**: {} ({} enforced, {} shadow)\n",
            self.total_over_limit(),
            self.over_limit_and_enabled,
            self.over_limit
        ));
        output
    }
}
