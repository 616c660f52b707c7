//! querycost: resource governance for query execution.
//!
//! Queries fan out into many concurrently processed blocks. The [`cost`]
//! module meters what each block consumes at block, query and global
//! scope and rejects further work once a scope is over its limit;
//! [`block`] ties a block's accounting to its lifetime; [`metrics`] is the
//! observability hook.

pub mod block;
pub mod cost;
pub mod metrics;

pub use block::{AccountedBlock, Block};
pub use cost::{
    ChainedEnforcer, Cost, CostConfig, CostEnforcer, CostError, CostGovernor, Enforcer, Limit, Report,
};
