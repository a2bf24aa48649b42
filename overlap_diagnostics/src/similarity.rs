//! Route-B candidate selection - gate-structure similarity filtering.
//!
//! Route A (not here) selects pairs by static weight similarity alone.
//! Route B decides whether a pair deserves the expensive behavioral
//! analysis using gate structure: deterministic implication first, then
//! fractional interval overlap against a configured threshold.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use expression_model::{
    cosine_similarity, AxisConstraint, ConstraintSet, GateConstraintExtractor, ParseStatus,
    Prototype,
};

use crate::error::{require_in_range, ConfigError};
use crate::implication::{GateImplicationEvaluator, ImplicationResult};

/// Stage-A structural metrics, computed purely from weight vectors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct CandidateMetrics {
    /// Jaccard overlap of the two active-axis sets.
    pub active_axis_overlap: f64,

    /// Fraction of shared active axes whose weights agree in sign.
    pub sign_agreement: f64,

    /// Cosine similarity of the full weight vectors.
    pub weight_cosine_similarity: f64,
}

impl CandidateMetrics {
    /// Compute structural metrics for a prototype pair. No sampling.
    pub fn from_weights(a: &Prototype, b: &Prototype, active_axis_epsilon: f64) -> Self {
        let active_a = a.active_axes(active_axis_epsilon);
        let active_b = b.active_axes(active_axis_epsilon);

        let shared: BTreeSet<&str> = active_a.intersection(&active_b).copied().collect();
        let union_len = active_a.union(&active_b).count();

        let active_axis_overlap = if union_len == 0 {
            0.0
        } else {
            shared.len() as f64 / union_len as f64
        };

        let sign_agreement = if shared.is_empty() {
            0.0
        } else {
            let agreeing = shared
                .iter()
                .filter(|axis| {
                    a.weights.get(**axis).copied().unwrap_or(0.0).signum()
                        == b.weights.get(**axis).copied().unwrap_or(0.0).signum()
                })
                .count();
            agreeing as f64 / shared.len() as f64
        };

        Self {
            active_axis_overlap,
            sign_agreement,
            weight_cosine_similarity: cosine_similarity(&a.weights, &b.weights),
        }
    }
}

/// Why a pair passed the Route-B filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimilarityReason {
    /// Deterministic gate implication in at least one direction.
    GateImplication,
    /// Mean interval overlap at or above the configured minimum.
    GateOverlap,
}

/// Outcome of one pairwise similarity check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateSimilarity {
    pub passes: bool,
    pub reason: Option<SimilarityReason>,
    pub implication: Option<ImplicationResult>,
    pub overlap_ratio: Option<f64>,
}

/// A prototype pair queued for Route-B filtering, carrying the Stage-A
/// metrics computed upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrototypePair {
    pub a: Prototype,
    pub b: Prototype,
    pub candidate_metrics: CandidateMetrics,
}

/// Which selection path kept a candidate pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionRoute {
    RouteB,
}

/// A pair that survived filtering, with its similarity evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedPair {
    pub pair: PrototypePair,
    pub selected_by: SelectionRoute,
    pub similarity: GateSimilarity,
}

/// Tallies for one `filter_pairs` run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterStats {
    pub passed: usize,
    pub rejected: usize,
    pub by_implication: usize,
    pub by_overlap: usize,
}

/// Result of filtering a batch of candidate pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterOutcome {
    pub candidates: Vec<SelectedPair>,
    pub stats: FilterStats,
}

/// Configuration for the similarity filter.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityConfig {
    /// Minimum mean per-axis interval overlap for the overlap route.
    pub gate_based_min_interval_overlap: f64,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            gate_based_min_interval_overlap: 0.6,
        }
    }
}

impl SimilarityConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_in_range(
            "gate_based_min_interval_overlap",
            self.gate_based_min_interval_overlap,
            0.0,
            1.0,
        )
    }
}

/// Route-B gate-structure similarity filter.
#[derive(Debug, Clone)]
pub struct GateSimilarityFilter {
    config: SimilarityConfig,
    extractor: GateConstraintExtractor,
    evaluator: GateImplicationEvaluator,
}

impl GateSimilarityFilter {
    /// Create a filter, validating the configuration up front.
    pub fn new(config: SimilarityConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            extractor: GateConstraintExtractor::new(),
            evaluator: GateImplicationEvaluator::new(),
        })
    }

    pub fn with_defaults() -> Self {
        Self::new(SimilarityConfig::default()).expect("default config is valid")
    }

    /// Decide whether one pair is worth deeper behavioral analysis.
    ///
    /// Route priority: non-vacuous deterministic implication in either
    /// direction, then mean interval overlap against the configured
    /// minimum. The implication route is skipped entirely unless both
    /// gate lists parsed completely.
    pub fn check_gate_similarity(&self, a: &Prototype, b: &Prototype) -> GateSimilarity {
        let set_a = self.extractor.extract(&a.gates);
        let set_b = self.extractor.extract(&b.gates);

        let both_complete = set_a.parse_status == ParseStatus::Complete
            && set_b.parse_status == ParseStatus::Complete;

        if both_complete {
            let implication = self.evaluator.evaluate(&set_a.intervals, &set_b.intervals);
            if !implication.is_vacuous && (implication.a_implies_b || implication.b_implies_a) {
                return GateSimilarity {
                    passes: true,
                    reason: Some(SimilarityReason::GateImplication),
                    implication: Some(implication),
                    overlap_ratio: None,
                };
            }

            let ratio = mean_interval_overlap(&set_a, &set_b);
            let passes = ratio >= self.config.gate_based_min_interval_overlap;
            return GateSimilarity {
                passes,
                reason: passes.then_some(SimilarityReason::GateOverlap),
                implication: Some(implication),
                overlap_ratio: Some(ratio),
            };
        }

        let ratio = mean_interval_overlap(&set_a, &set_b);
        let passes = ratio >= self.config.gate_based_min_interval_overlap;
        GateSimilarity {
            passes,
            reason: passes.then_some(SimilarityReason::GateOverlap),
            implication: None,
            overlap_ratio: Some(ratio),
        }
    }

    /// Filter a batch of pairs, preserving their Stage-A metrics.
    pub fn filter_pairs(&self, pairs: Vec<PrototypePair>) -> FilterOutcome {
        let mut candidates = Vec::new();
        let mut stats = FilterStats::default();

        for pair in pairs {
            let similarity = self.check_gate_similarity(&pair.a, &pair.b);
            if similarity.passes {
                stats.passed += 1;
                match similarity.reason {
                    Some(SimilarityReason::GateImplication) => stats.by_implication += 1,
                    Some(SimilarityReason::GateOverlap) => stats.by_overlap += 1,
                    None => {}
                }
                candidates.push(SelectedPair {
                    pair,
                    selected_by: SelectionRoute::RouteB,
                    similarity,
                });
            } else {
                stats.rejected += 1;
            }
        }

        debug!(
            passed = stats.passed,
            rejected = stats.rejected,
            by_implication = stats.by_implication,
            by_overlap = stats.by_overlap,
            "route-B pair filtering complete"
        );

        FilterOutcome { candidates, stats }
    }
}

/// Mean per-axis interval overlap over the union of constrained axes.
///
/// Both constrained: intersection length over union length, clipped to
/// the unit domain. Exactly one constrained: `0.5` by construction. No
/// constrained axes at all: `1.0` (two fully unconstrained prototypes
/// overlap trivially). Unsatisfiable axes contribute zero.
fn mean_interval_overlap(set_a: &ConstraintSet, set_b: &ConstraintSet) -> f64 {
    let axes: BTreeSet<&String> = set_a.intervals.keys().chain(set_b.intervals.keys()).collect();
    if axes.is_empty() {
        return 1.0;
    }

    let mut total = 0.0;
    for axis in &axes {
        let a = set_a.intervals.get(axis.as_str());
        let b = set_b.intervals.get(axis.as_str());
        total += match (a, b) {
            (Some(ca), Some(cb)) => constrained_overlap(ca, cb),
            (Some(_), None) | (None, Some(_)) => 0.5,
            (None, None) => 1.0,
        };
    }
    total / axes.len() as f64
}

fn constrained_overlap(a: &AxisConstraint, b: &AxisConstraint) -> f64 {
    match (a.interval(), b.interval()) {
        (Some(ia), Some(ib)) => {
            let intersection = ia.intersect(ib).clipped_length(0.0, 1.0);
            let len_a = ia.clipped_length(0.0, 1.0);
            let len_b = ib.clipped_length(0.0, 1.0);
            let union = len_a + len_b - intersection;
            if union <= 0.0 {
                // Two point intervals: overlap is 1 when they coincide.
                if ia.disjoint_from(ib) {
                    0.0
                } else {
                    1.0
                }
            } else {
                intersection / union
            }
        }
        _ => 0.0,
    }
}
