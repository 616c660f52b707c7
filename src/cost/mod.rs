//! Hierarchical cost enforcement for query execution.
//!
//! This module meters resource consumption at several nested scopes at once
//! (per block, per query and globally across all queries) and rejects further
//! consumption once any scope is over its limit.
//!
//! # Overview
//!
//! The cost enforcement system consists of:
//! - **Cost / Limit / Report**: value types for usage, thresholds and outcomes
//! - **Tracker**: atomic running total for one scope
//! - **LimitManager**: static or live-updating source of a scope's limit
//! - **Enforcer**: one tracker gated by one limit
//! - **ChainedEnforcer**: a tree of enforcers where cost rolls up to every ancestor
//! - **CostConfig / CostGovernor**: per-level configuration and the tree built from it
//!
//! # Example
//!
//! ```ignore
//! use querycost::cost::{CostConfig, Cost, LevelConfig, BLOCK_LEVEL};
//!
//! let config = CostConfig::new()
//!     .with_global(LevelConfig::new().with_threshold(1e7).with_enabled(true))
//!     .with_query(LevelConfig::new().with_threshold(1e6).with_enabled(true));
//! let governor = config.build()?;
//!
//! let query = governor.query("query");
//! let block = query.child(BLOCK_LEVEL);
//!
//! // Record datapoints read
//! let report = block.add(Cost::new(5_000.0));
//! if let Some(err) = report.error {
//!     // stop reading and fail the query
//! }
//!
//! block.release()?;
//! query.release()?;
//! ```

mod chain;
mod config;
mod enforcer;
mod error;
mod governor;
mod limit;
mod tracker;
mod types;

pub use self::chain::{ChainedEnforcer, BLOCK_LEVEL, GLOBAL_LEVEL, QUERY_LEVEL};
pub use self::config::{ConfigError, CostConfig, LevelConfig, ENV_PREFIX, ENV_SEPARATOR};
pub use self::enforcer::{CostEnforcer, Enforcer, EnforcerOptions};
pub use self::error::{CostError, CostResult};
pub use self::governor::{CostGovernor, GovernedLevel};
pub use self::limit::{
    DynamicLimitManager, DynamicLimitState, LimitManager, LimitManagerOptions, StaticLimitManager,
};
pub use self::tracker::{AtomicTracker, NoopTracker, Tracker};
pub use self::types::{Cost, Limit, Report};
