//! Single-scope cost enforcement.

use std::sync::{Arc, OnceLock};

use super::error::CostError;
use super::limit::{LimitManager, StaticLimitManager};
use super::tracker::{AtomicTracker, NoopTracker, Tracker};
use super::types::{Cost, Limit, Report};
use crate::metrics::{EnforcerMetrics, EnforcerReporter, NoopReporter};

/// Common interface of [`Enforcer`] and [`ChainedEnforcer`](super::ChainedEnforcer).
pub trait CostEnforcer {
    /// Add `cost` and report the new total and any limit violation.
    fn add(&self, cost: Cost) -> Report;

    /// Current total, violation status and limit, without mutating anything.
    fn state(&self) -> (Report, Limit);
}

/// Options for constructing an [`Enforcer`].
#[derive(Debug, Clone, Default)]
pub struct EnforcerOptions {
    reporter: Option<Arc<dyn EnforcerReporter>>,
    cost_exceeded_message: Option<String>,
}

impl EnforcerOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reporter. Without one, a fresh [`EnforcerMetrics`] is used.
    pub fn with_reporter(mut self, reporter: Arc<dyn EnforcerReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Set a message appended to limit violation errors.
    pub fn with_cost_exceeded_message(mut self, message: impl Into<String>) -> Self {
        self.cost_exceeded_message = Some(message.into());
        self
    }

    /// Get the reporter, if set.
    pub fn reporter(&self) -> Option<&Arc<dyn EnforcerReporter>> {
        self.reporter.as_ref()
    }

    /// Get the custom violation message, if set.
    pub fn cost_exceeded_message(&self) -> Option<&str> {
        self.cost_exceeded_message.as_deref()
    }
}

/// Enforces a cost limit for one scope.
///
/// Cloning an `Enforcer` yields another handle to the *same* scope. Use
/// [`clone_empty`](Self::clone_empty) to start a new scope with the same
/// limit configuration.
#[derive(Debug, Clone)]
pub struct Enforcer {
    limits: Arc<dyn LimitManager>,
    tracker: Arc<dyn Tracker>,
    message: Option<String>,
    reporter: Arc<dyn EnforcerReporter>,
}

impl Enforcer {
    /// Create an enforcer from a limit source and a tracker.
    pub fn new(limits: Arc<dyn LimitManager>, tracker: Arc<dyn Tracker>, options: EnforcerOptions) -> Self {
        let reporter = options
            .reporter
            .unwrap_or_else(|| Arc::new(EnforcerMetrics::default()));
        Self {
            limits,
            tracker,
            message: options.cost_exceeded_message,
            reporter,
        }
    }

    /// Enforcer with a fixed limit and a fresh tracker.
    pub fn with_limit(limit: Limit) -> Self {
        Self::new(
            Arc::new(StaticLimitManager::from_limit(limit)),
            Arc::new(AtomicTracker::new()),
            EnforcerOptions::new(),
        )
    }

    /// The shared enforcer that tracks nothing and never rejects.
    pub fn noop() -> Enforcer {
        static NOOP: OnceLock<Enforcer> = OnceLock::new();
        NOOP.get_or_init(|| {
            Enforcer::new(
                Arc::new(StaticLimitManager::from_limit(Limit::unlimited())),
                Arc::new(NoopTracker),
                EnforcerOptions::new().with_reporter(Arc::new(NoopReporter)),
            )
        })
        .clone()
    }

    /// Add `cost` to this scope's total.
    ///
    /// The returned report carries an error when the new total is at or over
    /// an enabled limit. The cost is recorded either way.
    pub fn add(&self, cost: Cost) -> Report {
        self.reporter.report_cost(cost);
        let current = self.tracker.add(cost);
        self.reporter.report_current(current);

        let limit = self.limits.limit();
        if limit.is_exceeded_by(current) {
            self.reporter.report_over_limit(limit.enabled);
        }

        Report {
            cost: current,
            error: self.check_limit(current, limit),
        }
    }

    /// Current state of this scope.
    pub fn state(&self) -> (Report, Limit) {
        let cost = self.tracker.current();
        let limit = self.limits.limit();
        let report = Report {
            cost,
            error: self.check_limit(cost, limit),
        };
        (report, limit)
    }

    /// A new scope sharing this enforcer's limit source, message and
    /// reporter, with its own zeroed tracker.
    pub fn clone_empty(&self) -> Enforcer {
        Enforcer {
            limits: Arc::clone(&self.limits),
            tracker: self.tracker.fresh(),
            message: self.message.clone(),
            reporter: Arc::clone(&self.reporter),
        }
    }

    /// Current total.
    pub fn current(&self) -> Cost {
        self.tracker.current()
    }

    /// The limit currently in effect.
    pub fn limit(&self) -> Limit {
        self.limits.limit()
    }

    /// Limit source.
    pub fn limit_manager(&self) -> &Arc<dyn LimitManager> {
        &self.limits
    }

    fn check_limit(&self, cost: Cost, limit: Limit) -> Option<CostError> {
        if !limit.enabled || !limit.is_exceeded_by(cost) {
            return None;
        }
        Some(CostError::LimitExceeded {
            cost,
            threshold: limit.threshold,
            message: self.message.clone(),
        })
    }
}

impl CostEnforcer for Enforcer {
    fn add(&self, cost: Cost) -> Report {
        Enforcer::add(self, cost)
    }

    fn state(&self) -> (Report, Limit) {
        Enforcer::state(self)
    }
}
