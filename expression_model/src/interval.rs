//! Axis intervals - the numeric footprint of gate constraints.

use serde::{Deserialize, Serialize};

/// A closed interval over one axis, possibly unbounded on either side.
///
/// `None` bounds stand for -inf / +inf. The diagnostics algebra is
/// closed-interval: touching endpoints count as overlapping, not disjoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Interval {
    /// Lower bound, `None` = unbounded below.
    pub lower: Option<f64>,

    /// Upper bound, `None` = unbounded above.
    pub upper: Option<f64>,
}

impl Interval {
    /// Create an interval with both bounds.
    pub fn bounded(lower: f64, upper: f64) -> Self {
        Self {
            lower: Some(lower),
            upper: Some(upper),
        }
    }

    /// Create an interval bounded only from below: `[lower, +inf)`.
    pub fn at_least(lower: f64) -> Self {
        Self {
            lower: Some(lower),
            upper: None,
        }
    }

    /// Create an interval bounded only from above: `(-inf, upper]`.
    pub fn at_most(upper: f64) -> Self {
        Self {
            lower: None,
            upper: Some(upper),
        }
    }

    /// The fully unconstrained interval `(-inf, +inf)`.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// A single point `[value, value]`.
    pub fn point(value: f64) -> Self {
        Self::bounded(value, value)
    }

    /// Whether the interval would be empty (`lower > upper`).
    pub fn is_empty(&self) -> bool {
        match (self.lower, self.upper) {
            (Some(lo), Some(hi)) => lo > hi,
            _ => false,
        }
    }

    /// Whether this interval is a subset of `other`.
    ///
    /// Missing bounds are treated as -inf / +inf.
    pub fn subset_of(&self, other: &Interval) -> bool {
        let lower_ok = match (self.lower, other.lower) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(a), Some(b)) => a >= b,
        };
        let upper_ok = match (self.upper, other.upper) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(a), Some(b)) => a <= b,
        };
        lower_ok && upper_ok
    }

    /// Whether this interval shares no point with `other`.
    ///
    /// Strict inequality: `[0.0, 0.5]` and `[0.5, 1.0]` touch and are
    /// therefore not disjoint.
    pub fn disjoint_from(&self, other: &Interval) -> bool {
        let a_below_b = match (self.upper, other.lower) {
            (Some(hi), Some(lo)) => hi < lo,
            _ => false,
        };
        let b_below_a = match (other.upper, self.lower) {
            (Some(hi), Some(lo)) => hi < lo,
            _ => false,
        };
        a_below_b || b_below_a
    }

    /// Intersection of two intervals. May produce an empty interval.
    pub fn intersect(&self, other: &Interval) -> Interval {
        let lower = match (self.lower, other.lower) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (Some(a), None) => Some(a),
            (None, b) => b,
        };
        let upper = match (self.upper, other.upper) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, b) => b,
        };
        Interval { lower, upper }
    }

    /// Length of the interval clipped to `[domain_lo, domain_hi]`.
    ///
    /// Unbounded sides take the domain edge. Empty intersections yield 0.
    pub fn clipped_length(&self, domain_lo: f64, domain_hi: f64) -> f64 {
        let lo = self.lower.unwrap_or(domain_lo).max(domain_lo);
        let hi = self.upper.unwrap_or(domain_hi).min(domain_hi);
        (hi - lo).max(0.0)
    }
}

/// The satisfiability-aware constraint on one axis.
///
/// Modeling the empty set as its own variant keeps the "empty implies
/// anything" rule a single pattern match instead of a flag scattered
/// through the implication logic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AxisConstraint {
    /// A non-empty interval of admissible values.
    Satisfiable(Interval),

    /// A contradiction (e.g. `x >= 0.8` intersected with `x <= 0.2`).
    Unsatisfiable,
}

impl AxisConstraint {
    /// Constrain with an interval, collapsing empty intervals.
    pub fn from_interval(interval: Interval) -> Self {
        if interval.is_empty() {
            AxisConstraint::Unsatisfiable
        } else {
            AxisConstraint::Satisfiable(interval)
        }
    }

    /// The unconstrained axis.
    pub fn unconstrained() -> Self {
        AxisConstraint::Satisfiable(Interval::unbounded())
    }

    /// Whether this constraint admits no value at all.
    pub fn is_unsatisfiable(&self) -> bool {
        matches!(self, AxisConstraint::Unsatisfiable)
    }

    /// The underlying interval, if satisfiable.
    pub fn interval(&self) -> Option<&Interval> {
        match self {
            AxisConstraint::Satisfiable(interval) => Some(interval),
            AxisConstraint::Unsatisfiable => None,
        }
    }

    /// Intersect with another constraint.
    pub fn intersect(&self, other: &AxisConstraint) -> AxisConstraint {
        match (self, other) {
            (AxisConstraint::Satisfiable(a), AxisConstraint::Satisfiable(b)) => {
                AxisConstraint::from_interval(a.intersect(b))
            }
            _ => AxisConstraint::Unsatisfiable,
        }
    }
}

impl Default for AxisConstraint {
    fn default() -> Self {
        Self::unconstrained()
    }
}
