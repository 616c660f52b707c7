//! Sources of cost limits.
//!
//! A [`LimitManager`] answers "what is the limit for this scope right now?".
//! [`StaticLimitManager`] always gives the same answer; [`DynamicLimitManager`]
//! can be updated while enforcers built on it are in use.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use super::types::Limit;

/// Supplies the limit currently in effect for a scope.
pub trait LimitManager: fmt::Debug + Send + Sync {
    /// The current limit. Must not block on writers.
    fn limit(&self) -> Limit;
}

/// Options shared by limit manager implementations.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LimitManagerOptions {
    default_limit: Limit,
}

impl LimitManagerOptions {
    /// Create options with an unlimited default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the limit used when nothing more specific is configured.
    pub fn with_default_limit(mut self, limit: Limit) -> Self {
        self.default_limit = limit;
        self
    }

    /// Get the default limit.
    pub fn default_limit(&self) -> Limit {
        self.default_limit
    }
}

/// Limit manager that always returns its default limit.
#[derive(Debug, Clone)]
pub struct StaticLimitManager {
    limit: Limit,
}

impl StaticLimitManager {
    /// Create a static limit manager from options.
    pub fn new(options: LimitManagerOptions) -> Self {
        Self {
            limit: options.default_limit(),
        }
    }

    /// Shorthand for a manager fixed at `limit`.
    pub fn from_limit(limit: Limit) -> Self {
        Self::new(LimitManagerOptions::new().with_default_limit(limit))
    }
}

impl LimitManager for StaticLimitManager {
    fn limit(&self) -> Limit {
        self.limit
    }
}

/// State published by a [`DynamicLimitManager`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicLimitState {
    /// Fallback limit.
    pub default: Limit,
    /// Latest override, if one has been set.
    pub current: Option<Limit>,
}

impl DynamicLimitState {
    /// The limit in effect: the override if present, else the default.
    pub fn effective(&self) -> Limit {
        self.current.unwrap_or(self.default)
    }
}

/// Limit manager whose limit can change at runtime.
///
/// Readers see the most recently published value. Updates come either from
/// direct calls ([`set_limit`](Self::set_limit),
/// [`set_default_limit`](Self::set_default_limit)) or from a feed spawned with
/// [`spawn_feed`](Self::spawn_feed).
#[derive(Debug)]
pub struct DynamicLimitManager {
    state: watch::Sender<DynamicLimitState>,
}

impl DynamicLimitManager {
    /// Create a dynamic limit manager with no override.
    pub fn new(options: LimitManagerOptions) -> Self {
        let (state, _) = watch::channel(DynamicLimitState {
            default: options.default_limit(),
            current: None,
        });
        Self { state }
    }

    /// Replace the fallback limit.
    pub fn set_default_limit(&self, limit: Limit) {
        debug!(?limit, "default cost limit updated");
        self.state.send_modify(|state| state.default = limit);
    }

    /// Override the limit until [`clear_limit`](Self::clear_limit) is called.
    pub fn set_limit(&self, limit: Limit) {
        debug!(?limit, "cost limit override applied");
        self.state.send_modify(|state| state.current = Some(limit));
    }

    /// Drop any override and fall back to the default limit.
    pub fn clear_limit(&self) {
        debug!("cost limit override cleared");
        self.state.send_modify(|state| state.current = None);
    }

    /// Current default and override.
    pub fn state(&self) -> DynamicLimitState {
        *self.state.borrow()
    }

    /// Watch limit changes.
    pub fn subscribe(&self) -> watch::Receiver<DynamicLimitState> {
        self.state.subscribe()
    }

    /// Apply limit updates from `feed` until the sending side closes.
    ///
    /// `Some(limit)` overrides the limit, `None` clears the override. Must be
    /// called from within a tokio runtime.
    pub fn spawn_feed(self: &Arc<Self>, mut feed: mpsc::Receiver<Option<Limit>>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(update) = feed.recv().await {
                match update {
                    Some(limit) => manager.set_limit(limit),
                    None => manager.clear_limit(),
                }
            }
            debug!("cost limit feed closed");
        })
    }
}

impl LimitManager for DynamicLimitManager {
    fn limit(&self) -> Limit {
        self.state.borrow().effective()
    }
}
