//! Cost, limit and report value types.

use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

use super::error::CostError;

/// A quantity of resource consumed by query execution.
///
/// The unit is chosen by the caller (datapoints read, bytes materialized,
/// ...). Costs are additive and negative values hand cost back.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cost(f64);

impl Cost {
    /// No cost.
    pub const ZERO: Cost = Cost(0.0);

    /// Largest representable cost, used as the threshold of unbounded limits.
    pub const MAX: Cost = Cost(f64::MAX);

    /// Create a cost from a raw value.
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    /// Get the raw value.
    pub const fn value(self) -> f64 {
        self.0
    }

    pub(crate) fn to_bits(self) -> u64 {
        self.0.to_bits()
    }

    pub(crate) fn from_bits(bits: u64) -> Self {
        Self(f64::from_bits(bits))
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<f64> for Cost {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl From<u64> for Cost {
    fn from(value: u64) -> Self {
        Self(value as f64)
    }
}

impl Add for Cost {
    type Output = Cost;

    fn add(self, rhs: Cost) -> Cost {
        Cost(self.0 + rhs.0)
    }
}

impl AddAssign for Cost {
    fn add_assign(&mut self, rhs: Cost) {
        self.0 += rhs.0;
    }
}

impl Sub for Cost {
    type Output = Cost;

    fn sub(self, rhs: Cost) -> Cost {
        Cost(self.0 - rhs.0)
    }
}

impl SubAssign for Cost {
    fn sub_assign(&mut self, rhs: Cost) {
        self.0 -= rhs.0;
    }
}

impl Neg for Cost {
    type Output = Cost;

    fn neg(self) -> Cost {
        Cost(-self.0)
    }
}

/// A cost limit for one scope.
///
/// A disabled limit is still compared against (and reported on) but never
/// rejects anything, which allows new limits to be rolled out in shadow mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Limit {
    /// Cost at or above which the scope is over its limit.
    pub threshold: Cost,
    /// Whether going over the threshold is an error.
    pub enabled: bool,
}

impl Limit {
    /// An enforced limit.
    pub const fn enabled(threshold: Cost) -> Self {
        Self {
            threshold,
            enabled: true,
        }
    }

    /// A shadow limit: tracked and reported, never enforced.
    pub const fn disabled(threshold: Cost) -> Self {
        Self {
            threshold,
            enabled: false,
        }
    }

    /// A limit that can never trip.
    pub const fn unlimited() -> Self {
        Self::disabled(Cost::MAX)
    }

    /// Check whether `cost` is over this limit's threshold, ignoring `enabled`.
    pub fn is_exceeded_by(&self, cost: Cost) -> bool {
        cost >= self.threshold
    }
}

impl Default for Limit {
    fn default() -> Self {
        Self::unlimited()
    }
}

/// Outcome of adding cost to, or inspecting, an enforcer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    /// Accumulated cost at the reporting scope.
    pub cost: Cost,
    /// Set when the scope (or, for chained enforcers, an ancestor) is over its limit.
    pub error: Option<CostError>,
}

impl Report {
    /// A report without an error.
    pub fn new(cost: Cost) -> Self {
        Self { cost, error: None }
    }

    /// Whether the report carries no error.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Convert into a `Result`, so callers can stop work with `?`.
    pub fn into_result(self) -> Result<Cost, CostError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.cost),
        }
    }
}
