//! Errors produced by cost enforcement.

use thiserror::Error;

use super::types::Cost;

/// Errors that can occur while enforcing cost limits.
///
/// Limit violations are expected, recoverable conditions: they tell the
/// caller to stop producing work for a scope. They are carried in
/// [`Report::error`](super::Report) rather than returned as failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CostError {
    /// A scope's accumulated cost reached its enabled threshold.
    #[error("{cost} exceeds limit of {threshold}{}", custom_suffix(.message))]
    LimitExceeded {
        cost: Cost,
        threshold: Cost,
        message: Option<String>,
    },

    /// A limit violation attributed to a named scope of a chained enforcer.
    #[error("exceeded {resource} limit: {source}")]
    ScopeExceeded {
        resource: String,
        source: Box<CostError>,
    },

    /// A chained enforcer was built without any enforcer levels.
    #[error("must provide at least one enforcer level for a chained enforcer")]
    NoLevels,

    /// A child was requested deeper than the configured enforcer levels.
    #[error("no enforcer level configured for child {resource:?} at depth {depth}")]
    DepthExceeded { resource: String, depth: usize },

    /// `release` was called a second time on the same enforcer.
    #[error("{resource} enforcer was already released")]
    AlreadyReleased { resource: String },

    /// Cost was added to an enforcer after it was released.
    #[error("cannot add cost to released {resource} enforcer")]
    Released { resource: String },
}

impl CostError {
    /// Whether this error is a limit violation (at any scope).
    pub fn is_limit_violation(&self) -> bool {
        matches!(
            self,
            CostError::LimitExceeded { .. } | CostError::ScopeExceeded { .. }
        )
    }

    /// Name of the scope a violation was attributed to, if any.
    pub fn scope(&self) -> Option<&str> {
        match self {
            CostError::ScopeExceeded { resource, .. } => Some(resource),
            _ => None,
        }
    }
}

fn custom_suffix(message: &Option<String>) -> String {
    match message {
        Some(msg) if !msg.is_empty() => format!(": {}", msg),
        _ => String::new(),
    }
}

/// Result type for cost enforcement operations.
pub type CostResult<T> = Result<T, CostError>;
