//! Tree of enforcers with cost rollup.
//!
//! A [`ChainedEnforcer`] enforces limits on several nested scopes at once.
//! Cost added to a node is also added to every ancestor, so the global
//! total always reflects all in-flight work. When a node's work is done,
//! [`release`](ChainedEnforcer::release) hands its cost back to every
//! ancestor.
//!
//! ```ignore
//! use querycost::cost::{ChainedEnforcer, Cost, Enforcer, Limit};
//!
//! let root = ChainedEnforcer::new("global", vec![
//!     Enforcer::with_limit(Limit::enabled(Cost::new(1e6))),
//!     Enforcer::with_limit(Limit::enabled(Cost::new(1e5))),
//!     Enforcer::with_limit(Limit::enabled(Cost::new(1e4))),
//! ])?;
//!
//! let query = root.child("query");
//! let block = query.child("block");
//! if let Some(err) = block.add(Cost::new(500.0)).error {
//!     // stop producing work for this block
//! }
//! block.release()?;
//! query.release()?;
//! ```

use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::warn;

use super::enforcer::{CostEnforcer, Enforcer};
use super::error::{CostError, CostResult};
use super::types::{Cost, Limit, Report};

/// Resource name of per-block enforcers.
pub const BLOCK_LEVEL: &str = "block";
/// Resource name of per-query enforcers.
pub const QUERY_LEVEL: &str = "query";
/// Resource name of the global enforcer.
pub const GLOBAL_LEVEL: &str = "global";

/// A node in a tree of enforcers.
///
/// Nodes are shared through `Arc`. A child holds its parent, so a parent
/// can never be dropped before the children that roll up into it.
///
/// An add holds its node's `released` read guard until the cost has reached
/// every ancestor, and a release holds the write guard while it subtracts.
/// Locks are only ever taken from a node towards the root.
#[derive(Debug)]
pub struct ChainedEnforcer {
    resource_name: String,
    local: Enforcer,
    parent: Option<Arc<ChainedEnforcer>>,
    levels: Arc<[Enforcer]>,
    depth: usize,
    released: RwLock<bool>,
    shared: bool,
}

impl ChainedEnforcer {
    /// Build the root of a tree.
    ///
    /// `levels[0]` enforces the root itself (and is used directly, not
    /// cloned); `levels[1]` is the template for the root's children,
    /// `levels[2]` for their children, and so on.
    pub fn new(root_resource_name: impl Into<String>, levels: Vec<Enforcer>) -> CostResult<Arc<Self>> {
        let local = levels.first().cloned().ok_or(CostError::NoLevels)?;
        Ok(Arc::new(Self {
            resource_name: root_resource_name.into(),
            local,
            parent: None,
            levels: levels.into(),
            depth: 0,
            released: RwLock::new(false),
            shared: false,
        }))
    }

    /// The shared node that enforces nothing and reports nothing.
    ///
    /// It is also what [`child`](Self::child) returns past the configured depth.
    pub fn noop() -> Arc<Self> {
        static NOOP: OnceLock<Arc<ChainedEnforcer>> = OnceLock::new();
        Arc::clone(NOOP.get_or_init(|| {
            Arc::new(Self {
                resource_name: String::new(),
                local: Enforcer::noop(),
                parent: None,
                levels: Arc::from(vec![Enforcer::noop()]),
                depth: 0,
                released: RwLock::new(false),
                shared: true,
            })
        }))
    }

    /// Create a child whose cost rolls up into this node.
    ///
    /// If no level is configured for the child's depth this logs a warning
    /// and returns [`ChainedEnforcer::noop`], leaving the subtree unmetered.
    /// Use [`try_child`](Self::try_child) to treat that as an error instead.
    pub fn child(self: &Arc<Self>, resource_name: impl Into<String>) -> Arc<Self> {
        if self.shared {
            return Self::noop();
        }
        match self.try_child(resource_name) {
            Ok(child) => child,
            Err(err) => {
                warn!(%err, parent = %self.resource_name, "using no-op cost enforcer");
                Self::noop()
            }
        }
    }

    /// Create a child, failing if no level is configured for its depth.
    pub fn try_child(self: &Arc<Self>, resource_name: impl Into<String>) -> CostResult<Arc<Self>> {
        let resource_name = resource_name.into();
        let depth = self.depth + 1;
        let Some(template) = self.levels.get(depth) else {
            return Err(CostError::DepthExceeded {
                resource: resource_name,
                depth,
            });
        };
        Ok(self.spawn(resource_name, template.clone_empty(), depth))
    }

    /// Create a child enforced by a clone of `template` instead of the
    /// configured level. The child's own children still use the level
    /// templates below it.
    pub fn child_with(self: &Arc<Self>, resource_name: impl Into<String>, template: &Enforcer) -> Arc<Self> {
        self.spawn(resource_name.into(), template.clone_empty(), self.depth + 1)
    }

    fn spawn(self: &Arc<Self>, resource_name: String, local: Enforcer, depth: usize) -> Arc<Self> {
        Arc::new(Self {
            resource_name,
            local,
            parent: Some(Arc::clone(self)),
            levels: Arc::clone(&self.levels),
            depth,
            released: RwLock::new(false),
            shared: false,
        })
    }

    /// Add `cost` to this node and every ancestor.
    ///
    /// The cost is always applied to every scope, even one that rejects it;
    /// the error only tells the caller to stop producing work. A violation of
    /// this node's own limit takes precedence over an ancestor's. Adding to a
    /// released node changes nothing and returns [`CostError::Released`].
    pub fn add(&self, cost: Cost) -> Report {
        let released = self.released.read().unwrap_or_else(PoisonError::into_inner);
        if *released {
            warn!(resource = %self.resource_name, %cost, "cost added to released enforcer");
            let (mut report, _) = self.local.state();
            report.error = Some(CostError::Released {
                resource: self.resource_name.clone(),
            });
            return report;
        }
        self.apply(cost)
    }

    fn apply(&self, cost: Cost) -> Report {
        let local = self.local.add(cost);
        let Some(parent) = &self.parent else {
            return self.wrap_local(local);
        };
        let upstream = parent.add(cost);

        if local.error.is_some() {
            return self.wrap_local(local);
        }
        if upstream.error.is_some() {
            return upstream;
        }
        local
    }

    fn wrap_local(&self, report: Report) -> Report {
        match report.error {
            Some(err) => Report {
                cost: report.cost,
                error: Some(CostError::ScopeExceeded {
                    resource: self.resource_name.clone(),
                    source: Box::new(err),
                }),
            },
            None => report,
        }
    }

    /// State of this node only; ancestors are not consulted.
    pub fn state(&self) -> (Report, Limit) {
        self.local.state()
    }

    /// Hand this node's accumulated cost back to itself and every ancestor.
    ///
    /// Must be called once when the node's work is finished. Later calls
    /// return [`CostError::AlreadyReleased`] without touching any total.
    pub fn release(&self) -> CostResult<Report> {
        if self.shared {
            return Ok(self.local.state().0);
        }
        let mut released = self.released.write().unwrap_or_else(PoisonError::into_inner);
        if *released {
            return Err(CostError::AlreadyReleased {
                resource: self.resource_name.clone(),
            });
        }
        *released = true;
        let (report, _) = self.local.state();
        Ok(self.apply(-report.cost))
    }

    /// Scope label used in error messages.
    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    /// Enforcer for this node's own scope.
    pub fn local(&self) -> &Enforcer {
        &self.local
    }

    /// Parent node, `None` for the root.
    pub fn parent(&self) -> Option<&Arc<ChainedEnforcer>> {
        self.parent.as_ref()
    }

    /// Whether this node is a root.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Whether [`release`](Self::release) has been called.
    pub fn is_released(&self) -> bool {
        *self.released.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Distance from the root (the root is at depth 0).
    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl CostEnforcer for ChainedEnforcer {
    fn add(&self, cost: Cost) -> Report {
        ChainedEnforcer::add(self, cost)
    }

    fn state(&self) -> (Report, Limit) {
        ChainedEnforcer::state(self)
    }
}
