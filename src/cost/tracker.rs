//! Per-scope cost tracking.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::types::Cost;

/// Accumulates the cost of a single scope.
///
/// Implementations must be safe to update from many threads at once: every
/// block of a query adds to the shared query and global trackers.
pub trait Tracker: fmt::Debug + Send + Sync {
    /// Apply `delta` to the running total and return the new total.
    fn add(&self, delta: Cost) -> Cost;

    /// Snapshot of the running total.
    fn current(&self) -> Cost;

    /// A new, zeroed tracker of the same kind.
    fn fresh(&self) -> Arc<dyn Tracker>;
}

/// Lock-free tracker storing the running total as the bit pattern of an `f64`.
#[derive(Default)]
pub struct AtomicTracker {
    bits: AtomicU64,
}

impl AtomicTracker {
    /// Create a tracker starting at zero.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tracker for AtomicTracker {
    fn add(&self, delta: Cost) -> Cost {
        let update = self
            .bits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                Some((Cost::from_bits(bits) + delta).to_bits())
            });
        // The closure never declines, so both arms carry the previous value.
        match update {
            Ok(prev) | Err(prev) => Cost::from_bits(prev) + delta,
        }
    }

    fn current(&self) -> Cost {
        Cost::from_bits(self.bits.load(Ordering::Acquire))
    }

    fn fresh(&self) -> Arc<dyn Tracker> {
        Arc::new(AtomicTracker::new())
    }
}

impl fmt::Debug for AtomicTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomicTracker")
            .field("current", &self.current())
            .finish()
    }
}

/// Tracker that stores nothing and always reports zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracker;

impl Tracker for NoopTracker {
    fn add(&self, _delta: Cost) -> Cost {
        Cost::ZERO
    }

    fn current(&self) -> Cost {
        Cost::ZERO
    }

    fn fresh(&self) -> Arc<dyn Tracker> {
        Arc::new(NoopTracker)
    }
}
