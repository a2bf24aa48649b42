//! Constraint extraction - collapsing a gate list into per-axis intervals.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::gate::{Gate, GateParseError};
use crate::interval::AxisConstraint;

/// How much of a gate list survived parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseStatus {
    /// Every gate parsed.
    Complete,
    /// Some gates parsed, some did not.
    Partial,
    /// Nothing parsed (or the list was empty of parseable gates).
    Failed,
}

/// Per-axis interval constraints for one prototype's gate list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSet {
    /// Intersection of all gates, per axis.
    pub intervals: BTreeMap<String, AxisConstraint>,

    /// Completeness of the extraction.
    pub parse_status: ParseStatus,

    /// Parse errors for the gates that did not contribute.
    pub parse_errors: Vec<GateParseError>,
}

impl ConstraintSet {
    /// Whether any axis is a contradiction, making the whole set empty.
    pub fn is_unsatisfiable(&self) -> bool {
        self.intervals.values().any(AxisConstraint::is_unsatisfiable)
    }

    /// Axes carrying an explicit constraint.
    pub fn constrained_axes(&self) -> impl Iterator<Item = &str> {
        self.intervals.keys().map(String::as_str)
    }
}

/// Extracts interval constraints from raw gate expressions.
///
/// Unparseable gates degrade the parse status instead of failing the
/// extraction; callers decide whether a `Partial` set is usable.
#[derive(Debug, Clone, Default)]
pub struct GateConstraintExtractor;

impl GateConstraintExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract the per-axis constraint map for a gate list.
    ///
    /// Gates on the same axis are intersected; an empty intersection
    /// (e.g. `x >= 0.8` with `x <= 0.2`) marks the axis `Unsatisfiable`.
    pub fn extract(&self, gates: &[String]) -> ConstraintSet {
        let mut intervals: BTreeMap<String, AxisConstraint> = BTreeMap::new();
        let mut parse_errors = Vec::new();
        let mut parsed_count = 0usize;

        for expr in gates {
            match Gate::parse(expr) {
                Ok(gate) => {
                    parsed_count += 1;
                    let constraint = AxisConstraint::from_interval(gate.to_interval());
                    intervals
                        .entry(gate.axis)
                        .and_modify(|existing| *existing = existing.intersect(&constraint))
                        .or_insert(constraint);
                }
                Err(err) => parse_errors.push(err),
            }
        }

        let parse_status = if parse_errors.is_empty() {
            ParseStatus::Complete
        } else if parsed_count > 0 {
            ParseStatus::Partial
        } else {
            ParseStatus::Failed
        };

        ConstraintSet {
            intervals,
            parse_status,
            parse_errors,
        }
    }
}
