//! Blocks whose cost is accounted against a chained enforcer.
//!
//! An [`AccountedBlock`] owns the block-level enforcer for one block of
//! query results. Whatever happens to the block, its cost is handed back
//! to the query and global scopes: explicitly on [`AccountedBlock::close`],
//! or on drop if the block is abandoned (error paths, panics, cancelled
//! tasks).

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tracing::warn;

use crate::cost::{ChainedEnforcer, Cost, Report};

/// A unit of query results that must be closed when consumed.
pub trait Block {
    /// Error returned when closing fails.
    type Error;

    /// Free the block's resources.
    fn close(&mut self) -> Result<(), Self::Error>;
}

/// A block paired with the enforcer that meters it.
#[derive(Debug)]
pub struct AccountedBlock<B> {
    block: B,
    enforcer: Arc<ChainedEnforcer>,
    closed: bool,
}

impl<B> AccountedBlock<B> {
    /// Wrap `block`, accounting its cost against `enforcer`.
    pub fn new(block: B, enforcer: Arc<ChainedEnforcer>) -> Self {
        Self {
            block,
            enforcer,
            closed: false,
        }
    }

    /// Add cost incurred while processing this block.
    ///
    /// On an error the caller should stop processing the block.
    pub fn add_cost(&self, cost: Cost) -> Report {
        self.enforcer.add(cost)
    }

    /// Enforcer metering this block.
    pub fn enforcer(&self) -> &Arc<ChainedEnforcer> {
        &self.enforcer
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn release(&self) {
        if let Err(err) = self.enforcer.release() {
            warn!(%err, "failed to release block cost");
        }
    }
}

impl<B: Block> AccountedBlock<B> {
    /// Release the block's cost, then close the wrapped block.
    pub fn close(&mut self) -> Result<(), B::Error> {
        if !self.closed {
            self.closed = true;
            self.release();
        }
        self.block.close()
    }
}

impl<B> Deref for AccountedBlock<B> {
    type Target = B;

    fn deref(&self) -> &B {
        &self.block
    }
}

impl<B> DerefMut for AccountedBlock<B> {
    fn deref_mut(&mut self) -> &mut B {
        &mut self.block
    }
}

impl<B> Drop for AccountedBlock<B> {
    fn drop(&mut self) {
        if !self.closed {
            self.release();
        }
    }
}
