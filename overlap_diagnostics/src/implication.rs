//! Gate implication - interval-subset logic between two prototypes'
//! constraint maps.
//!
//! The evaluator walks the union of both axis sets, treating a missing
//! axis as unconstrained, and derives a pairwise relation from the
//! per-axis subset and disjointness flags. Unsatisfiable sides are
//! handled by vacuous truth: the empty set implies anything.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use expression_model::{AxisConstraint, Gate, GateConstraintExtractor, Interval, ParseStatus};

/// Pairwise relation between two gate constraint sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateRelation {
    /// Mutual implication.
    Equal,
    /// A implies B only.
    Narrower,
    /// B implies A only.
    Wider,
    /// Some axis admits no shared value.
    Disjoint,
    /// Overlapping without implication either way.
    Overlapping,
}

/// Which side(s) were unsatisfiable in a vacuous evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VacuousReason {
    AUnsatisfiable,
    BUnsatisfiable,
    BothUnsatisfiable,
}

/// Per-axis evidence for a non-vacuous implication evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisEvidence {
    pub axis: String,
    pub interval_a: Interval,
    pub interval_b: Interval,
    pub a_subset_b: bool,
    pub b_subset_a: bool,
}

/// Outcome of one pairwise implication evaluation. Produced fresh per
/// call and never mutated after return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplicationResult {
    pub a_implies_b: bool,
    pub b_implies_a: bool,
    pub relation: GateRelation,
    pub is_vacuous: bool,
    pub vacuous_reason: Option<VacuousReason>,

    /// Axes that defeated `a_implies_b` or `b_implies_a`.
    pub counter_example_axes: Vec<String>,

    /// One entry per axis in the union of both maps. Empty when vacuous.
    pub evidence: Vec<AxisEvidence>,
}

/// Confidence attached to an expression-level implication check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImplicationConfidence {
    /// Both expressions parsed; the answer is exact.
    Deterministic,
    /// At least one expression failed to parse.
    Unknown,
}

/// Result of checking implication between two raw gate expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateImplication {
    pub confidence: ImplicationConfidence,
    pub implies: bool,
    pub is_vacuous: bool,
    pub parse_errors: Vec<String>,
}

/// Evaluates logical implication between per-axis constraint maps.
#[derive(Debug, Clone, Default)]
pub struct GateImplicationEvaluator {
    extractor: GateConstraintExtractor,
}

impl GateImplicationEvaluator {
    pub fn new() -> Self {
        Self {
            extractor: GateConstraintExtractor::new(),
        }
    }

    /// Evaluate implication between two constraint maps.
    ///
    /// An axis present on one side only is unconstrained on the other.
    /// If either side carries any unsatisfiable axis, the whole side is
    /// empty and the result is vacuous: evidence and counter-example
    /// lists stay empty and the relation is restricted to
    /// `Equal`/`Narrower`/`Wider`.
    pub fn evaluate(
        &self,
        intervals_a: &BTreeMap<String, AxisConstraint>,
        intervals_b: &BTreeMap<String, AxisConstraint>,
    ) -> ImplicationResult {
        let a_empty = intervals_a.values().any(AxisConstraint::is_unsatisfiable);
        let b_empty = intervals_b.values().any(AxisConstraint::is_unsatisfiable);

        if a_empty || b_empty {
            let (reason, relation, a_implies_b, b_implies_a) = match (a_empty, b_empty) {
                (true, true) => (VacuousReason::BothUnsatisfiable, GateRelation::Equal, true, true),
                (true, false) => (VacuousReason::AUnsatisfiable, GateRelation::Narrower, true, false),
                (false, true) => (VacuousReason::BUnsatisfiable, GateRelation::Wider, false, true),
                (false, false) => unreachable!(),
            };
            debug!(?reason, "gate implication vacuous: unsatisfiable side");
            return ImplicationResult {
                a_implies_b,
                b_implies_a,
                relation,
                is_vacuous: true,
                vacuous_reason: Some(reason),
                counter_example_axes: Vec::new(),
                evidence: Vec::new(),
            };
        }

        let axes: BTreeSet<&String> = intervals_a.keys().chain(intervals_b.keys()).collect();

        let mut a_implies_b = true;
        let mut b_implies_a = true;
        let mut any_disjoint = false;
        let mut counter_example_axes = Vec::new();
        let mut evidence = Vec::new();

        for axis in axes {
            let interval_a = constraint_interval(intervals_a.get(axis.as_str()));
            let interval_b = constraint_interval(intervals_b.get(axis.as_str()));

            let a_subset_b = interval_a.subset_of(&interval_b);
            let b_subset_a = interval_b.subset_of(&interval_a);

            if interval_a.disjoint_from(&interval_b) {
                any_disjoint = true;
            }
            if !a_subset_b || !b_subset_a {
                counter_example_axes.push(axis.clone());
            }
            a_implies_b &= a_subset_b;
            b_implies_a &= b_subset_a;

            evidence.push(AxisEvidence {
                axis: axis.clone(),
                interval_a,
                interval_b,
                a_subset_b,
                b_subset_a,
            });
        }

        let (a_implies_b, b_implies_a, relation) = if any_disjoint {
            (false, false, GateRelation::Disjoint)
        } else {
            let relation = match (a_implies_b, b_implies_a) {
                (true, true) => GateRelation::Equal,
                (true, false) => GateRelation::Narrower,
                (false, true) => GateRelation::Wider,
                (false, false) => GateRelation::Overlapping,
            };
            (a_implies_b, b_implies_a, relation)
        };

        debug!(
            ?relation,
            a_implies_b,
            b_implies_a,
            axes = evidence.len(),
            "gate implication evaluated"
        );

        ImplicationResult {
            a_implies_b,
            b_implies_a,
            relation,
            is_vacuous: false,
            vacuous_reason: None,
            counter_example_axes,
            evidence,
        }
    }

    /// Check implication between two raw gate expressions.
    ///
    /// Parse failures are surfaced in the result, never thrown; the
    /// caller decides whether an unparseable gate blocks its analysis.
    pub fn check_implication(&self, expr_a: &str, expr_b: &str) -> GateImplication {
        let set_a = self.extractor.extract(std::slice::from_ref(&expr_a.to_string()));
        let set_b = self.extractor.extract(std::slice::from_ref(&expr_b.to_string()));

        if set_a.parse_status != ParseStatus::Complete || set_b.parse_status != ParseStatus::Complete
        {
            let parse_errors = set_a
                .parse_errors
                .iter()
                .chain(set_b.parse_errors.iter())
                .map(|e| e.to_string())
                .collect();
            return GateImplication {
                confidence: ImplicationConfidence::Unknown,
                implies: false,
                is_vacuous: false,
                parse_errors,
            };
        }

        let result = self.evaluate(&set_a.intervals, &set_b.intervals);
        GateImplication {
            confidence: ImplicationConfidence::Deterministic,
            implies: result.a_implies_b,
            is_vacuous: result.is_vacuous,
            parse_errors: Vec::new(),
        }
    }

    /// Human-readable form of a gate expression.
    pub fn describe_gate(&self, expr: &str) -> String {
        match Gate::parse(expr) {
            Ok(gate) => gate.to_string(),
            Err(err) => format!("[Unparseable gate: {err}]"),
        }
    }
}

fn constraint_interval(constraint: Option<&AxisConstraint>) -> Interval {
    match constraint {
        Some(AxisConstraint::Satisfiable(interval)) => *interval,
        // Unsatisfiable sides are handled before the per-axis walk.
        Some(AxisConstraint::Unsatisfiable) | None => Interval::unbounded(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constraints(entries: &[(&str, Interval)]) -> BTreeMap<String, AxisConstraint> {
        entries
            .iter()
            .map(|(axis, interval)| {
                (axis.to_string(), AxisConstraint::Satisfiable(*interval))
            })
            .collect()
    }

    #[test]
    fn test_narrower_interval_implies_wider() {
        let evaluator = GateImplicationEvaluator::new();
        let a = constraints(&[("threat", Interval::bounded(0.1, 0.3))]);
        let b = constraints(&[("threat", Interval::bounded(0.0, 0.5))]);

        let result = evaluator.evaluate(&a, &b);

        assert!(result.a_implies_b);
        assert!(!result.b_implies_a);
        assert_eq!(result.relation, GateRelation::Narrower);
        assert!(!result.is_vacuous);
        assert_eq!(result.counter_example_axes, vec!["threat".to_string()]);
    }

    #[test]
    fn test_equal_maps() {
        let evaluator = GateImplicationEvaluator::new();
        let a = constraints(&[("threat", Interval::bounded(0.1, 0.3))]);

        let result = evaluator.evaluate(&a, &a.clone());

        assert_eq!(result.relation, GateRelation::Equal);
        assert!(result.a_implies_b && result.b_implies_a);
        assert!(result.counter_example_axes.is_empty());
    }

    #[test]
    fn test_missing_axis_is_unconstrained() {
        let evaluator = GateImplicationEvaluator::new();
        let a = constraints(&[
            ("threat", Interval::bounded(0.1, 0.3)),
            ("valence", Interval::bounded(0.5, 0.8)),
        ]);
        let b = constraints(&[("threat", Interval::bounded(0.0, 0.5))]);

        let result = evaluator.evaluate(&a, &b);

        // A constrains valence, B does not, so A is still narrower.
        assert!(result.a_implies_b);
        assert!(!result.b_implies_a);
        assert_eq!(result.evidence.len(), 2);
    }

    #[test]
    fn test_disjoint_axis_dominates() {
        let evaluator = GateImplicationEvaluator::new();
        let a = constraints(&[("threat", Interval::bounded(0.0, 0.2))]);
        let b = constraints(&[("threat", Interval::bounded(0.6, 0.9))]);

        let result = evaluator.evaluate(&a, &b);

        assert_eq!(result.relation, GateRelation::Disjoint);
        assert!(!result.a_implies_b);
        assert!(!result.b_implies_a);
    }

    #[test]
    fn test_touching_endpoints_overlap() {
        let evaluator = GateImplicationEvaluator::new();
        let a = constraints(&[("threat", Interval::bounded(0.0, 0.4))]);
        let b = constraints(&[("threat", Interval::bounded(0.4, 0.9))]);

        let result = evaluator.evaluate(&a, &b);
        assert_eq!(result.relation, GateRelation::Overlapping);
    }

    #[test]
    fn test_unsatisfiable_side_is_vacuous() {
        let evaluator = GateImplicationEvaluator::new();
        let mut a = constraints(&[("threat", Interval::bounded(0.1, 0.3))]);
        a.insert("valence".to_string(), AxisConstraint::Unsatisfiable);
        let b = constraints(&[("threat", Interval::bounded(0.0, 0.5))]);

        let result = evaluator.evaluate(&a, &b);

        assert!(result.is_vacuous);
        assert_eq!(result.vacuous_reason, Some(VacuousReason::AUnsatisfiable));
        assert!(result.a_implies_b);
        assert!(!result.b_implies_a);
        assert_eq!(result.relation, GateRelation::Narrower);
        assert!(result.evidence.is_empty());
        assert!(result.counter_example_axes.is_empty());
    }

    #[test]
    fn test_both_unsatisfiable() {
        let evaluator = GateImplicationEvaluator::new();
        let mut a = BTreeMap::new();
        a.insert("x".to_string(), AxisConstraint::Unsatisfiable);
        let mut b = BTreeMap::new();
        b.insert("y".to_string(), AxisConstraint::Unsatisfiable);

        let result = evaluator.evaluate(&a, &b);

        assert_eq!(result.vacuous_reason, Some(VacuousReason::BothUnsatisfiable));
        assert_eq!(result.relation, GateRelation::Equal);
        assert!(result.a_implies_b && result.b_implies_a);
    }

    #[test]
    fn test_evaluate_does_not_mutate_inputs() {
        let evaluator = GateImplicationEvaluator::new();
        let a = constraints(&[("threat", Interval::bounded(0.1, 0.3))]);
        let b = constraints(&[("valence", Interval::bounded(0.0, 0.5))]);
        let a_before = a.clone();
        let b_before = b.clone();

        let _ = evaluator.evaluate(&a, &b);

        assert_eq!(a, a_before);
        assert_eq!(b, b_before);
    }

    #[test]
    fn test_check_implication_deterministic() {
        let evaluator = GateImplicationEvaluator::new();

        let result = evaluator.check_implication("threat >= 0.5", "threat >= 0.3");
        assert_eq!(result.confidence, ImplicationConfidence::Deterministic);
        assert!(result.implies);

        let reverse = evaluator.check_implication("threat >= 0.3", "threat >= 0.5");
        assert!(!reverse.implies);
    }

    #[test]
    fn test_check_implication_parse_failure() {
        let evaluator = GateImplicationEvaluator::new();

        let result = evaluator.check_implication("threat >= 0.5", "garbage");
        assert_eq!(result.confidence, ImplicationConfidence::Unknown);
        assert!(!result.implies);
        assert!(!result.parse_errors.is_empty());
    }

    #[test]
    fn test_describe_gate() {
        let evaluator = GateImplicationEvaluator::new();

        assert_eq!(evaluator.describe_gate("valence>=0.55"), "valence >= 0.55");
        assert!(evaluator.describe_gate("???").starts_with("[Unparseable gate:"));
    }
}
