//! Overlap classification - threshold-gated decision rules.
//!
//! Consumes Stage-A structural metrics and Stage-B behavioral metrics
//! and assigns the pair a relationship type. Pure function over its
//! inputs: no I/O, no hidden state, so identical inputs always produce
//! identical output.

use serde::{Deserialize, Serialize};

use crate::behavior::BehaviorMetrics;
use crate::error::{require_in_range, ConfigError};
use crate::implication::ImplicationResult;
use crate::similarity::CandidateMetrics;

/// Which prototype of the pair a classification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    /// The other side.
    pub fn flipped(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

/// Relationship classification for one prototype pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    /// Strong evidence the pair is one prototype expressed twice.
    Merge,
    /// Merge thresholds met loosely.
    MergeRecommended,
    /// One side never fires alone and is dominated when both fire.
    Subsumed { subsumed: Side },
    /// Subsumption thresholds met loosely.
    SubsumedRecommended { subsumed: Side },
    /// One side's firing implies the other's: a tiering relationship.
    NestedSiblings { narrower: Side },
    /// Nested but separable by tightening gates.
    NeedsSeparation { narrower: Side },
    /// No redundancy signal.
    NotRedundant,
}

impl Classification {
    /// Stable snake_case tag, used when handing the classification to
    /// external suggestion engines.
    pub fn tag(&self) -> &'static str {
        match self {
            Classification::Merge => "merge",
            Classification::MergeRecommended => "merge_recommended",
            Classification::Subsumed { .. } => "subsumed",
            Classification::SubsumedRecommended { .. } => "subsumed_recommended",
            Classification::NestedSiblings { .. } => "nested_siblings",
            Classification::NeedsSeparation { .. } => "needs_separation",
            Classification::NotRedundant => "not_redundant",
        }
    }

    /// The same classification with the pair order swapped.
    pub fn flipped(self) -> Classification {
        match self {
            Classification::Subsumed { subsumed } => Classification::Subsumed {
                subsumed: subsumed.flipped(),
            },
            Classification::SubsumedRecommended { subsumed } => {
                Classification::SubsumedRecommended {
                    subsumed: subsumed.flipped(),
                }
            }
            Classification::NestedSiblings { narrower } => Classification::NestedSiblings {
                narrower: narrower.flipped(),
            },
            Classification::NeedsSeparation { narrower } => Classification::NeedsSeparation {
                narrower: narrower.flipped(),
            },
            other => other,
        }
    }
}

/// Thresholds for the decision rules.
#[derive(Debug, Clone, Copy)]
pub struct ClassifierConfig {
    /// Conditional probability at which one side counts as nested.
    pub nested_conditional_threshold: f64,

    /// Conditional at which the nesting is a near-total subset, making
    /// the pair nested siblings rather than merely separable.
    pub nested_subset_threshold: f64,

    /// Merge: minimum activity over the sample population.
    pub min_on_either_rate_for_merge: f64,

    /// Merge: minimum on-both / on-either ratio.
    pub min_gate_overlap_ratio: f64,

    /// Merge: minimum intensity correlation.
    pub min_correlation_for_merge: f64,

    /// Merge: maximum mean absolute intensity difference.
    pub max_mean_abs_diff_for_merge: f64,

    /// Relaxation factor in `(0, 1]` for the soft `MergeRecommended`
    /// variant; `1.0` disables the soft tier.
    pub merge_soft_factor: f64,

    /// Subsumption: maximum exclusive-fire rate on the subsumed side.
    pub max_exclusive_rate_for_subsumption: f64,

    /// Subsumption: minimum dominance against the subsumed side.
    pub min_dominance_for_subsumption: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            nested_conditional_threshold: 0.9,
            nested_subset_threshold: 0.95,
            min_on_either_rate_for_merge: 0.1,
            min_gate_overlap_ratio: 0.7,
            min_correlation_for_merge: 0.8,
            max_mean_abs_diff_for_merge: 0.1,
            merge_soft_factor: 0.85,
            max_exclusive_rate_for_subsumption: 0.02,
            min_dominance_for_subsumption: 0.6,
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_in_range(
            "nested_conditional_threshold",
            self.nested_conditional_threshold,
            0.0,
            1.0,
        )?;
        require_in_range(
            "nested_subset_threshold",
            self.nested_subset_threshold,
            0.0,
            1.0,
        )?;
        require_in_range(
            "min_on_either_rate_for_merge",
            self.min_on_either_rate_for_merge,
            0.0,
            1.0,
        )?;
        require_in_range("min_gate_overlap_ratio", self.min_gate_overlap_ratio, 0.0, 1.0)?;
        require_in_range(
            "min_correlation_for_merge",
            self.min_correlation_for_merge,
            -1.0,
            1.0,
        )?;
        require_in_range(
            "max_mean_abs_diff_for_merge",
            self.max_mean_abs_diff_for_merge,
            0.0,
            1.0,
        )?;
        if !(self.merge_soft_factor > 0.0 && self.merge_soft_factor <= 1.0) {
            return Err(ConfigError::new(
                "merge_soft_factor",
                format!("must be within (0, 1], got {}", self.merge_soft_factor),
            ));
        }
        require_in_range(
            "max_exclusive_rate_for_subsumption",
            self.max_exclusive_rate_for_subsumption,
            0.0,
            1.0,
        )?;
        require_in_range(
            "min_dominance_for_subsumption",
            self.min_dominance_for_subsumption,
            0.0,
            1.0,
        )?;
        Ok(())
    }
}

/// Classifies prototype pairs from candidate and behavioral metrics.
#[derive(Debug, Clone)]
pub struct OverlapClassifier {
    config: ClassifierConfig,
}

impl OverlapClassifier {
    /// Create a classifier, validating the configuration up front.
    pub fn new(config: ClassifierConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn with_defaults() -> Self {
        Self::new(ClassifierConfig::default()).expect("default config is valid")
    }

    /// Assign a classification to the pair.
    ///
    /// Rule order: merge (hard, then soft), deterministic gate nesting
    /// (which overrides behavioral conditionals for the direction),
    /// subsumption, behavioral nesting, and finally `NotRedundant`.
    pub fn classify(
        &self,
        _candidate: &CandidateMetrics,
        behavior: &BehaviorMetrics,
    ) -> Classification {
        if let Some(classification) = self.check_merge(behavior) {
            return classification;
        }

        // Deterministic one-way implication wins over behavioral
        // probabilities: the narrower side is whichever gate implies the
        // other, and the subset is total.
        if let Some(narrower) = self.deterministic_narrower(behavior) {
            return Classification::NestedSiblings { narrower };
        }

        if let Some(classification) = self.check_subsumption(behavior) {
            return classification;
        }

        if let Some(classification) = self.check_behavioral_nesting(behavior) {
            return classification;
        }

        Classification::NotRedundant
    }

    fn check_merge(&self, behavior: &BehaviorMetrics) -> Option<Classification> {
        let overlap = behavior.gate_overlap;
        let intensity = behavior.intensity;

        let gate_overlap_ratio = if overlap.on_either_rate == 0.0 {
            0.0
        } else {
            overlap.on_both_rate / overlap.on_either_rate
        };

        let hard = overlap.on_either_rate >= self.config.min_on_either_rate_for_merge
            && gate_overlap_ratio >= self.config.min_gate_overlap_ratio
            && intensity.pearson_correlation >= self.config.min_correlation_for_merge
            && intensity.mean_abs_diff <= self.config.max_mean_abs_diff_for_merge;
        if hard {
            return Some(Classification::Merge);
        }

        let soft_factor = self.config.merge_soft_factor;
        if soft_factor < 1.0 {
            let soft = overlap.on_either_rate
                >= self.config.min_on_either_rate_for_merge * soft_factor
                && gate_overlap_ratio >= self.config.min_gate_overlap_ratio * soft_factor
                && intensity.pearson_correlation
                    >= self.config.min_correlation_for_merge * soft_factor
                && intensity.mean_abs_diff <= self.config.max_mean_abs_diff_for_merge / soft_factor;
            if soft {
                return Some(Classification::MergeRecommended);
            }
        }

        None
    }

    /// Narrower side from a deterministic, non-symmetric, parse-complete
    /// gate implication, if one was carried through.
    fn deterministic_narrower(&self, behavior: &BehaviorMetrics) -> Option<Side> {
        if !behavior.gate_parse_complete {
            return None;
        }
        let implication: &ImplicationResult = behavior.gate_implication.as_ref()?;
        if implication.is_vacuous {
            return None;
        }
        match (implication.a_implies_b, implication.b_implies_a) {
            (true, false) => Some(Side::A),
            (false, true) => Some(Side::B),
            // Symmetric results carry no direction.
            _ => None,
        }
    }

    fn check_subsumption(&self, behavior: &BehaviorMetrics) -> Option<Classification> {
        let overlap = behavior.gate_overlap;
        let intensity = behavior.intensity;

        let correlated = intensity.pearson_correlation >= self.config.min_correlation_for_merge;

        // A never fires alone and is out-shone by B when both fire.
        if overlap.p_only_rate <= self.config.max_exclusive_rate_for_subsumption
            && correlated
            && intensity.dominance_q >= self.config.min_dominance_for_subsumption
        {
            return Some(Classification::Subsumed { subsumed: Side::A });
        }
        if overlap.q_only_rate <= self.config.max_exclusive_rate_for_subsumption
            && correlated
            && intensity.dominance_p >= self.config.min_dominance_for_subsumption
        {
            return Some(Classification::Subsumed { subsumed: Side::B });
        }

        None
    }

    fn check_behavioral_nesting(&self, behavior: &BehaviorMetrics) -> Option<Classification> {
        let rates = behavior.pass_rates;
        let threshold = self.config.nested_conditional_threshold;

        // High P(A|B) with materially lower P(B|A) means B's firing
        // implies A's: B is the narrower prototype.
        let (narrower, conditional) = if rates.p_a_given_b >= threshold
            && rates.p_b_given_a < rates.p_a_given_b
        {
            (Side::B, rates.p_a_given_b)
        } else if rates.p_b_given_a >= threshold && rates.p_a_given_b < rates.p_b_given_a {
            (Side::A, rates.p_b_given_a)
        } else {
            return None;
        };

        if conditional >= self.config.nested_subset_threshold {
            Some(Classification::NestedSiblings { narrower })
        } else {
            Some(Classification::NeedsSeparation { narrower })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::{GateOverlapRates, IntensityStats, PassRates};
    use crate::implication::{GateRelation, ImplicationResult};

    fn candidate() -> CandidateMetrics {
        CandidateMetrics {
            active_axis_overlap: 0.5,
            sign_agreement: 1.0,
            weight_cosine_similarity: 0.6,
        }
    }

    fn behavior() -> BehaviorMetrics {
        BehaviorMetrics {
            pass_rates: PassRates {
                pass_a_rate: 0.3,
                pass_b_rate: 0.3,
                p_a_given_b: 0.5,
                p_b_given_a: 0.5,
                co_pass_count: 45,
                sample_count: 300,
            },
            gate_overlap: GateOverlapRates {
                on_either_rate: 0.45,
                on_both_rate: 0.15,
                p_only_rate: 0.15,
                q_only_rate: 0.15,
            },
            intensity: IntensityStats {
                pearson_correlation: 0.3,
                mean_abs_diff: 0.3,
                dominance_p: 0.2,
                dominance_q: 0.2,
            },
            gate_implication: None,
            gate_parse_complete: true,
        }
    }

    fn one_way_implication(a_implies_b: bool) -> ImplicationResult {
        ImplicationResult {
            a_implies_b,
            b_implies_a: !a_implies_b,
            relation: if a_implies_b {
                GateRelation::Narrower
            } else {
                GateRelation::Wider
            },
            is_vacuous: false,
            vacuous_reason: None,
            counter_example_axes: vec!["threat".to_string()],
            evidence: Vec::new(),
        }
    }

    #[test]
    fn test_merge_when_all_thresholds_met() {
        let classifier = OverlapClassifier::with_defaults();
        let mut metrics = behavior();
        metrics.gate_overlap = GateOverlapRates {
            on_either_rate: 0.4,
            on_both_rate: 0.35,
            p_only_rate: 0.03,
            q_only_rate: 0.02,
        };
        metrics.intensity = IntensityStats {
            pearson_correlation: 0.95,
            mean_abs_diff: 0.02,
            dominance_p: 0.05,
            dominance_q: 0.05,
        };

        assert_eq!(
            classifier.classify(&candidate(), &metrics),
            Classification::Merge
        );
    }

    #[test]
    fn test_merge_recommended_on_loose_thresholds() {
        let classifier = OverlapClassifier::with_defaults();
        let mut metrics = behavior();
        // Correlation just under the hard threshold but above the soft.
        metrics.gate_overlap = GateOverlapRates {
            on_either_rate: 0.4,
            on_both_rate: 0.35,
            p_only_rate: 0.03,
            q_only_rate: 0.02,
        };
        metrics.intensity = IntensityStats {
            pearson_correlation: 0.75,
            mean_abs_diff: 0.02,
            dominance_p: 0.05,
            dominance_q: 0.05,
        };

        assert_eq!(
            classifier.classify(&candidate(), &metrics),
            Classification::MergeRecommended
        );
    }

    #[test]
    fn test_nested_siblings_from_behavior() {
        let classifier = OverlapClassifier::with_defaults();
        let mut metrics = behavior();
        metrics.pass_rates.p_a_given_b = 0.98;
        metrics.pass_rates.p_b_given_a = 0.5;

        assert_eq!(
            classifier.classify(&candidate(), &metrics),
            Classification::NestedSiblings { narrower: Side::B }
        );
    }

    #[test]
    fn test_needs_separation_below_subset_threshold() {
        let classifier = OverlapClassifier::with_defaults();
        let mut metrics = behavior();
        metrics.pass_rates.p_a_given_b = 0.92;
        metrics.pass_rates.p_b_given_a = 0.4;

        assert_eq!(
            classifier.classify(&candidate(), &metrics),
            Classification::NeedsSeparation { narrower: Side::B }
        );
    }

    #[test]
    fn test_deterministic_implication_overrides_behavior() {
        let classifier = OverlapClassifier::with_defaults();
        let mut metrics = behavior();
        // Behavioral conditionals are below threshold, but the gates
        // prove A implies B.
        metrics.gate_implication = Some(one_way_implication(true));

        assert_eq!(
            classifier.classify(&candidate(), &metrics),
            Classification::NestedSiblings { narrower: Side::A }
        );
    }

    #[test]
    fn test_deterministic_implication_ignored_without_complete_parse() {
        let classifier = OverlapClassifier::with_defaults();
        let mut metrics = behavior();
        metrics.gate_implication = Some(one_way_implication(true));
        metrics.gate_parse_complete = false;

        assert_eq!(
            classifier.classify(&candidate(), &metrics),
            Classification::NotRedundant
        );
    }

    #[test]
    fn test_subsumption() {
        let classifier = OverlapClassifier::with_defaults();
        let mut metrics = behavior();
        metrics.gate_overlap = GateOverlapRates {
            on_either_rate: 0.3,
            on_both_rate: 0.2,
            p_only_rate: 0.01,
            q_only_rate: 0.09,
        };
        metrics.intensity = IntensityStats {
            pearson_correlation: 0.9,
            mean_abs_diff: 0.25,
            dominance_p: 0.1,
            dominance_q: 0.7,
        };

        assert_eq!(
            classifier.classify(&candidate(), &metrics),
            Classification::Subsumed { subsumed: Side::A }
        );
    }

    #[test]
    fn test_not_redundant_fallback() {
        let classifier = OverlapClassifier::with_defaults();
        assert_eq!(
            classifier.classify(&candidate(), &behavior()),
            Classification::NotRedundant
        );
    }

    #[test]
    fn test_symmetry_swapping_sides() {
        let classifier = OverlapClassifier::with_defaults();
        let mut metrics = behavior();
        metrics.pass_rates.p_a_given_b = 0.98;
        metrics.pass_rates.p_b_given_a = 0.5;

        let forward = classifier.classify(&candidate(), &metrics);

        // Swap the pair: conditionals, exclusive rates and dominance flip.
        let mut swapped = metrics.clone();
        std::mem::swap(
            &mut swapped.pass_rates.p_a_given_b,
            &mut swapped.pass_rates.p_b_given_a,
        );
        std::mem::swap(
            &mut swapped.pass_rates.pass_a_rate,
            &mut swapped.pass_rates.pass_b_rate,
        );
        std::mem::swap(
            &mut swapped.gate_overlap.p_only_rate,
            &mut swapped.gate_overlap.q_only_rate,
        );
        std::mem::swap(
            &mut swapped.intensity.dominance_p,
            &mut swapped.intensity.dominance_q,
        );

        let backward = classifier.classify(&candidate(), &swapped);

        assert_eq!(backward, forward.flipped());
    }

    #[test]
    fn test_classify_is_idempotent() {
        let classifier = OverlapClassifier::with_defaults();
        let metrics = behavior();

        let first = classifier.classify(&candidate(), &metrics);
        let second = classifier.classify(&candidate(), &metrics);
        assert_eq!(first, second);
    }

    #[test]
    fn test_config_validation_names_field() {
        let err = OverlapClassifier::new(ClassifierConfig {
            nested_conditional_threshold: 1.3,
            ..ClassifierConfig::default()
        })
        .unwrap_err();
        assert_eq!(err.field, "nested_conditional_threshold");
    }
}
