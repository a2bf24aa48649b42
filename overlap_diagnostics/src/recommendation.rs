//! Stage-D recommendation synthesis.
//!
//! Turns a classified pair plus its metrics into a structured,
//! human-actionable recommendation: type, severity, confidence, action
//! text, and supporting evidence.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use expression_model::Prototype;

use crate::banding::BandingSuggestion;
use crate::behavior::{BehaviorMetrics, DivergenceExample};
use crate::classifier::Classification;
use crate::error::{require_in_range, ConfigError};
use crate::similarity::CandidateMetrics;

/// Recommendation category derived from the classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendationType {
    PrototypeMergeSuggestion,
    PrototypeSubsumptionSuggestion,
    PrototypeOverlapInfo,
}

impl RecommendationType {
    fn from_classification(classification: &Classification) -> Self {
        match classification {
            Classification::Merge | Classification::MergeRecommended => {
                Self::PrototypeMergeSuggestion
            }
            Classification::Subsumed { .. } | Classification::SubsumedRecommended { .. } => {
                Self::PrototypeSubsumptionSuggestion
            }
            _ => Self::PrototypeOverlapInfo,
        }
    }
}

/// An axis driving both prototypes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedDriver {
    pub axis: String,
    pub weight_a: f64,
    pub weight_b: f64,
}

/// How an axis distinguishes the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DifferentiatorKind {
    OnlyInA,
    OnlyInB,
    OppositeSign,
}

/// An axis present on only one side, or signed oppositely on both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Differentiator {
    pub axis: String,
    pub kind: DifferentiatorKind,
}

/// Supporting evidence attached to a recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Evidence {
    pub shared_drivers: Vec<SharedDriver>,
    pub key_differentiators: Vec<Differentiator>,
    pub divergence_examples: Vec<DivergenceExample>,
}

/// One data-driven suggestion from an external engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionableSuggestion {
    pub axis: String,
    pub suggestion_type: String,
    pub suggested_value: f64,
    pub confidence: f64,
    pub estimated_impact: f64,
    pub is_valid: bool,
    pub validation_message: Option<String>,
}

/// Inputs required for engine-driven suggestions; all three parts must
/// be present for the engine to be consulted.
#[derive(Debug, Clone)]
pub struct V3Data {
    pub vector_a: Vec<f64>,
    pub vector_b: Vec<f64>,
    pub context_pool: Vec<Vec<f64>>,
}

/// External engine producing concrete numeric suggestions for a pair.
pub trait ActionableSuggestionEngine {
    fn generate_suggestions(
        &self,
        vector_a: &[f64],
        vector_b: &[f64],
        context_pool: &[Vec<f64>],
        classification_tag: &str,
    ) -> Vec<ActionableSuggestion>;
}

/// Final recommendation for one prototype pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub recommendation_type: RecommendationType,
    pub prototype_family: String,
    pub prototype_a: String,
    pub prototype_b: String,
    pub classification: Classification,
    pub severity: f64,
    pub confidence: f64,
    pub actions: Vec<String>,
    pub evidence: Evidence,
    pub candidate_metrics: CandidateMetrics,
    pub behavior_metrics: BehaviorMetrics,
    pub suggestions: Vec<BandingSuggestion>,
    pub actionable_suggestions: Vec<ActionableSuggestion>,
}

/// Configuration for recommendation synthesis.
#[derive(Debug, Clone)]
pub struct RecommendationConfig {
    /// Weight magnitude above which an axis counts as active.
    pub active_axis_epsilon: f64,

    /// Family label stamped on every recommendation.
    pub prototype_family: String,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            active_axis_epsilon: 0.05,
            prototype_family: "emotion".to_string(),
        }
    }
}

impl RecommendationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_in_range("active_axis_epsilon", self.active_axis_epsilon, 0.0, 1.0)
    }
}

/// Builds recommendations from classified pairs.
pub struct OverlapRecommendationBuilder {
    config: RecommendationConfig,
    engine: Option<Box<dyn ActionableSuggestionEngine>>,
}

impl OverlapRecommendationBuilder {
    /// Create a builder, validating the configuration up front.
    pub fn new(config: RecommendationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            engine: None,
        })
    }

    pub fn with_defaults() -> Self {
        Self::new(RecommendationConfig::default()).expect("default config is valid")
    }

    /// Attach an external suggestion engine.
    pub fn with_engine(mut self, engine: Box<dyn ActionableSuggestionEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Synthesize the recommendation for one pair.
    ///
    /// Missing prototypes degrade to placeholder ids rather than
    /// failing the whole batch.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        &self,
        a: Option<&Prototype>,
        b: Option<&Prototype>,
        classification: &Classification,
        candidate_metrics: &CandidateMetrics,
        behavior_metrics: &BehaviorMetrics,
        divergence_examples: &[DivergenceExample],
        banding_suggestions: &[BandingSuggestion],
        v3_data: Option<&V3Data>,
    ) -> Recommendation {
        let id_a = a.map(|p| p.id.clone()).unwrap_or_else(|| "unknown_a".to_string());
        let id_b = b.map(|p| p.id.clone()).unwrap_or_else(|| "unknown_b".to_string());

        let recommendation_type = RecommendationType::from_classification(classification);
        let severity = self.severity(classification, candidate_metrics, behavior_metrics);
        let confidence = tiered_confidence(behavior_metrics.gate_overlap.on_either_rate);

        let evidence = Evidence {
            shared_drivers: self.shared_drivers(a, b),
            key_differentiators: self.key_differentiators(a, b),
            divergence_examples: divergence_examples.to_vec(),
        };

        let actions = self.actions(recommendation_type, classification, &id_a, &id_b);
        let actionable_suggestions = self.engine_suggestions(classification, v3_data);

        Recommendation {
            recommendation_type,
            prototype_family: self.config.prototype_family.clone(),
            prototype_a: id_a,
            prototype_b: id_b,
            classification: *classification,
            severity,
            confidence,
            actions,
            evidence,
            candidate_metrics: *candidate_metrics,
            behavior_metrics: behavior_metrics.clone(),
            suggestions: banding_suggestions.to_vec(),
            actionable_suggestions,
        }
    }

    fn severity(
        &self,
        classification: &Classification,
        candidate: &CandidateMetrics,
        behavior: &BehaviorMetrics,
    ) -> f64 {
        let severity = match RecommendationType::from_classification(classification) {
            RecommendationType::PrototypeMergeSuggestion => {
                let overlap = &behavior.gate_overlap;
                let ratio = if overlap.on_either_rate > 0.0 {
                    overlap.on_both_rate / overlap.on_either_rate
                } else {
                    0.0
                };
                (behavior.intensity.pearson_correlation + ratio) / 2.0
                    - behavior.intensity.mean_abs_diff
            }
            RecommendationType::PrototypeSubsumptionSuggestion => behavior
                .intensity
                .dominance_p
                .max(behavior.intensity.dominance_q),
            RecommendationType::PrototypeOverlapInfo => {
                candidate.weight_cosine_similarity * 0.3
            }
        };
        severity.clamp(0.0, 1.0)
    }

    fn shared_drivers(&self, a: Option<&Prototype>, b: Option<&Prototype>) -> Vec<SharedDriver> {
        let (a, b) = match (a, b) {
            (Some(a), Some(b)) => (a, b),
            _ => return Vec::new(),
        };
        let epsilon = self.config.active_axis_epsilon;

        let mut drivers: Vec<SharedDriver> = a
            .weights
            .iter()
            .filter_map(|(axis, &weight_a)| {
                let &weight_b = b.weights.get(axis)?;
                if weight_a.abs() > epsilon && weight_b.abs() > epsilon {
                    Some(SharedDriver {
                        axis: axis.clone(),
                        weight_a,
                        weight_b,
                    })
                } else {
                    None
                }
            })
            .collect();

        drivers.sort_by(|x, y| {
            let mx = x.weight_a.abs() + x.weight_b.abs();
            let my = y.weight_a.abs() + y.weight_b.abs();
            my.partial_cmp(&mx).unwrap_or(std::cmp::Ordering::Equal)
        });
        drivers
    }

    fn key_differentiators(
        &self,
        a: Option<&Prototype>,
        b: Option<&Prototype>,
    ) -> Vec<Differentiator> {
        let (a, b) = match (a, b) {
            (Some(a), Some(b)) => (a, b),
            _ => return Vec::new(),
        };
        let epsilon = self.config.active_axis_epsilon;

        let axes: BTreeSet<&String> = a.weights.keys().chain(b.weights.keys()).collect();
        let mut differentiators = Vec::new();

        for axis in axes {
            let weight_a = a.weights.get(axis).copied();
            let weight_b = b.weights.get(axis).copied();
            let active_a = weight_a.map_or(false, |w| w.abs() > epsilon);
            let active_b = weight_b.map_or(false, |w| w.abs() > epsilon);

            let kind = match (active_a, active_b) {
                (true, false) => Some(DifferentiatorKind::OnlyInA),
                (false, true) => Some(DifferentiatorKind::OnlyInB),
                (true, true) => {
                    let (wa, wb) = (weight_a.unwrap_or(0.0), weight_b.unwrap_or(0.0));
                    if wa * wb < 0.0 {
                        Some(DifferentiatorKind::OppositeSign)
                    } else {
                        None
                    }
                }
                (false, false) => None,
            };

            if let Some(kind) = kind {
                differentiators.push(Differentiator {
                    axis: axis.clone(),
                    kind,
                });
            }
        }
        differentiators
    }

    fn actions(
        &self,
        recommendation_type: RecommendationType,
        classification: &Classification,
        id_a: &str,
        id_b: &str,
    ) -> Vec<String> {
        match recommendation_type {
            RecommendationType::PrototypeMergeSuggestion => vec![
                format!("merge '{id_a}' and '{id_b}' into a single prototype"),
                format!("alternatively, keep '{id_a}' and alias '{id_b}' to it"),
            ],
            RecommendationType::PrototypeSubsumptionSuggestion => {
                let (subsumed, survivor) = match classification {
                    Classification::Subsumed { subsumed }
                    | Classification::SubsumedRecommended { subsumed } => match subsumed {
                        crate::classifier::Side::A => (id_a, id_b),
                        crate::classifier::Side::B => (id_b, id_a),
                    },
                    _ => (id_b, id_a),
                };
                vec![
                    format!("remove '{subsumed}'; its behavior is covered by '{survivor}'"),
                    format!("tighten the gates on '{survivor}' so it no longer covers '{subsumed}'"),
                ]
            }
            RecommendationType::PrototypeOverlapInfo => vec![format!(
                "no action needed for '{id_a}' and '{id_b}'; overlap is informational"
            )],
        }
    }

    fn engine_suggestions(
        &self,
        classification: &Classification,
        v3_data: Option<&V3Data>,
    ) -> Vec<ActionableSuggestion> {
        let (engine, data) = match (&self.engine, v3_data) {
            (Some(engine), Some(data)) => (engine, data),
            _ => return Vec::new(),
        };

        let raw = engine.generate_suggestions(
            &data.vector_a,
            &data.vector_b,
            &data.context_pool,
            classification.tag(),
        );

        let mut valid = Vec::with_capacity(raw.len());
        for suggestion in raw {
            if suggestion.is_valid {
                valid.push(suggestion);
            } else {
                warn!(
                    axis = %suggestion.axis,
                    message = suggestion.validation_message.as_deref().unwrap_or(""),
                    "dropping invalid data-driven suggestion"
                );
            }
        }
        info!(count = valid.len(), "data-driven suggestions accepted");
        valid
    }
}

/// Confidence from the on-either rate, piecewise linear across tiers.
///
/// Tier floors: `>= 0.2 -> 0.9`, `>= 0.1 -> 0.7`, `>= 0.05 -> 0.5`,
/// else `0.3`; within a tier the value rises linearly toward the next
/// floor, so the mapping is monotonic over `[0, 1]`.
fn tiered_confidence(on_either_rate: f64) -> f64 {
    let r = on_either_rate.clamp(0.0, 1.0);
    if r >= 0.2 {
        0.9 + (r - 0.2) / 0.8 * 0.1
    } else if r >= 0.1 {
        0.7 + (r - 0.1) / 0.1 * 0.2
    } else if r >= 0.05 {
        0.5 + (r - 0.05) / 0.05 * 0.2
    } else {
        0.3 + r / 0.05 * 0.2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::{GateOverlapRates, IntensityStats, PassRates};
    use crate::classifier::Side;
    use approx::assert_relative_eq;

    fn prototype(id: &str, weights: &[(&str, f64)]) -> Prototype {
        let mut p = Prototype::new(id);
        for (axis, w) in weights {
            p = p.with_weight(*axis, *w);
        }
        p
    }

    fn behavior(on_either: f64, on_both: f64, correlation: f64, mean_abs_diff: f64) -> BehaviorMetrics {
        BehaviorMetrics {
            pass_rates: PassRates::default(),
            gate_overlap: GateOverlapRates {
                on_either_rate: on_either,
                on_both_rate: on_both,
                p_only_rate: 0.0,
                q_only_rate: 0.0,
            },
            intensity: IntensityStats {
                pearson_correlation: correlation,
                mean_abs_diff,
                dominance_p: 0.0,
                dominance_q: 0.0,
            },
            gate_implication: None,
            gate_parse_complete: true,
        }
    }

    #[test]
    fn test_type_mapping() {
        let builder = OverlapRecommendationBuilder::with_defaults();
        let a = prototype("a", &[("valence", 0.5)]);
        let b = prototype("b", &[("valence", 0.5)]);
        let metrics = CandidateMetrics::from_weights(&a, &b, 0.05);
        let behavior = behavior(0.3, 0.25, 0.9, 0.05);

        let cases = [
            (Classification::Merge, RecommendationType::PrototypeMergeSuggestion),
            (
                Classification::MergeRecommended,
                RecommendationType::PrototypeMergeSuggestion,
            ),
            (
                Classification::Subsumed { subsumed: Side::A },
                RecommendationType::PrototypeSubsumptionSuggestion,
            ),
            (
                Classification::NestedSiblings { narrower: Side::A },
                RecommendationType::PrototypeOverlapInfo,
            ),
            (
                Classification::NotRedundant,
                RecommendationType::PrototypeOverlapInfo,
            ),
        ];

        for (classification, expected) in cases {
            let rec = builder.build(
                Some(&a),
                Some(&b),
                &classification,
                &metrics,
                &behavior,
                &[],
                &[],
                None,
            );
            assert_eq!(rec.recommendation_type, expected);
        }
    }

    #[test]
    fn test_merge_severity_formula() {
        let builder = OverlapRecommendationBuilder::with_defaults();
        let a = prototype("a", &[("valence", 0.5)]);
        let b = prototype("b", &[("valence", 0.5)]);
        let metrics = CandidateMetrics::from_weights(&a, &b, 0.05);
        let behavior = behavior(0.4, 0.3, 0.8, 0.05);

        let rec = builder.build(
            Some(&a),
            Some(&b),
            &Classification::Merge,
            &metrics,
            &behavior,
            &[],
            &[],
            None,
        );
        // (0.8 + 0.3/0.4) / 2 - 0.05 = 0.725
        assert_relative_eq!(rec.severity, 0.725, epsilon = 1e-12);
    }

    #[test]
    fn test_merge_severity_zero_on_either() {
        let builder = OverlapRecommendationBuilder::with_defaults();
        let a = prototype("a", &[("valence", 0.5)]);
        let b = prototype("b", &[("valence", 0.5)]);
        let metrics = CandidateMetrics::from_weights(&a, &b, 0.05);
        let behavior = behavior(0.0, 0.0, 0.8, 0.0);

        let rec = builder.build(
            Some(&a),
            Some(&b),
            &Classification::Merge,
            &metrics,
            &behavior,
            &[],
            &[],
            None,
        );
        assert_relative_eq!(rec.severity, 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_subsumption_severity_is_max_dominance() {
        let builder = OverlapRecommendationBuilder::with_defaults();
        let a = prototype("a", &[("valence", 0.5)]);
        let b = prototype("b", &[("valence", 0.5)]);
        let metrics = CandidateMetrics::from_weights(&a, &b, 0.05);
        let mut behavior = behavior(0.3, 0.25, 0.9, 0.05);
        behavior.intensity.dominance_p = 0.2;
        behavior.intensity.dominance_q = 0.7;

        let rec = builder.build(
            Some(&a),
            Some(&b),
            &Classification::Subsumed { subsumed: Side::A },
            &metrics,
            &behavior,
            &[],
            &[],
            None,
        );
        assert_relative_eq!(rec.severity, 0.7, epsilon = 1e-12);
    }

    #[test]
    fn test_confidence_tier_boundaries() {
        assert_relative_eq!(tiered_confidence(0.0), 0.3, epsilon = 1e-12);
        assert_relative_eq!(tiered_confidence(0.05), 0.5, epsilon = 1e-12);
        assert_relative_eq!(tiered_confidence(0.1), 0.7, epsilon = 1e-12);
        assert_relative_eq!(tiered_confidence(0.2), 0.9, epsilon = 1e-12);
        assert_relative_eq!(tiered_confidence(1.0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_confidence_monotonic() {
        let mut last = -1.0;
        for step in 0..=100 {
            let value = tiered_confidence(step as f64 / 100.0);
            assert!(value >= last, "confidence regressed at step {step}");
            last = value;
        }
    }

    #[test]
    fn test_shared_drivers_sorted_by_combined_magnitude() {
        let builder = OverlapRecommendationBuilder::with_defaults();
        let a = prototype("a", &[("valence", 0.2), ("threat", 0.9), ("arousal", 0.001)]);
        let b = prototype("b", &[("valence", 0.3), ("threat", 0.8), ("arousal", 0.9)]);
        let metrics = CandidateMetrics::from_weights(&a, &b, 0.05);

        let rec = builder.build(
            Some(&a),
            Some(&b),
            &Classification::NotRedundant,
            &metrics,
            &behavior(0.3, 0.1, 0.2, 0.3),
            &[],
            &[],
            None,
        );

        let axes: Vec<&str> = rec
            .evidence
            .shared_drivers
            .iter()
            .map(|d| d.axis.as_str())
            .collect();
        // arousal is inactive on A, so only threat and valence qualify.
        assert_eq!(axes, vec!["threat", "valence"]);
    }

    #[test]
    fn test_key_differentiators() {
        let builder = OverlapRecommendationBuilder::with_defaults();
        let a = prototype("a", &[("valence", 0.5), ("threat", 0.4)]);
        let b = prototype("b", &[("valence", -0.5), ("calm", 0.6)]);
        let metrics = CandidateMetrics::from_weights(&a, &b, 0.05);

        let rec = builder.build(
            Some(&a),
            Some(&b),
            &Classification::NotRedundant,
            &metrics,
            &behavior(0.3, 0.1, 0.2, 0.3),
            &[],
            &[],
            None,
        );

        let by_axis: Vec<(&str, DifferentiatorKind)> = rec
            .evidence
            .key_differentiators
            .iter()
            .map(|d| (d.axis.as_str(), d.kind))
            .collect();
        assert!(by_axis.contains(&("calm", DifferentiatorKind::OnlyInB)));
        assert!(by_axis.contains(&("threat", DifferentiatorKind::OnlyInA)));
        assert!(by_axis.contains(&("valence", DifferentiatorKind::OppositeSign)));
    }

    #[test]
    fn test_missing_prototypes_get_placeholder_ids() {
        let builder = OverlapRecommendationBuilder::with_defaults();
        let metrics = CandidateMetrics::default();

        let rec = builder.build(
            None,
            None,
            &Classification::NotRedundant,
            &metrics,
            &BehaviorMetrics::default(),
            &[],
            &[],
            None,
        );
        assert_eq!(rec.prototype_a, "unknown_a");
        assert_eq!(rec.prototype_b, "unknown_b");
        assert!(rec.evidence.shared_drivers.is_empty());
    }

    #[test]
    fn test_subsumption_actions_name_both_ids() {
        let builder = OverlapRecommendationBuilder::with_defaults();
        let a = prototype("fear", &[("threat", 0.9)]);
        let b = prototype("terror", &[("threat", 1.0)]);
        let metrics = CandidateMetrics::from_weights(&a, &b, 0.05);

        let rec = builder.build(
            Some(&a),
            Some(&b),
            &Classification::Subsumed { subsumed: Side::B },
            &metrics,
            &behavior(0.3, 0.25, 0.9, 0.05),
            &[],
            &[],
            None,
        );
        assert_eq!(rec.actions.len(), 2);
        assert!(rec.actions[0].contains("terror"));
        assert!(rec.actions[0].contains("fear"));
    }

    struct FixedEngine {
        output: Vec<ActionableSuggestion>,
    }

    impl ActionableSuggestionEngine for FixedEngine {
        fn generate_suggestions(
            &self,
            _vector_a: &[f64],
            _vector_b: &[f64],
            _context_pool: &[Vec<f64>],
            _classification_tag: &str,
        ) -> Vec<ActionableSuggestion> {
            self.output.clone()
        }
    }

    #[test]
    fn test_engine_output_filtered_to_valid() {
        let suggestion = |axis: &str, is_valid: bool| ActionableSuggestion {
            axis: axis.to_string(),
            suggestion_type: "gate_adjustment".to_string(),
            suggested_value: 0.4,
            confidence: 0.8,
            estimated_impact: 0.1,
            is_valid,
            validation_message: if is_valid {
                None
            } else {
                Some("out of range".to_string())
            },
        };
        let builder = OverlapRecommendationBuilder::with_defaults().with_engine(Box::new(
            FixedEngine {
                output: vec![suggestion("valence", true), suggestion("threat", false)],
            },
        ));

        let v3 = V3Data {
            vector_a: vec![0.5, 0.1],
            vector_b: vec![0.4, 0.2],
            context_pool: vec![vec![0.1, 0.2]],
        };
        let rec = builder.build(
            None,
            None,
            &Classification::Merge,
            &CandidateMetrics::default(),
            &BehaviorMetrics::default(),
            &[],
            &[],
            Some(&v3),
        );
        assert_eq!(rec.actionable_suggestions.len(), 1);
        assert_eq!(rec.actionable_suggestions[0].axis, "valence");
    }

    #[test]
    fn test_no_engine_or_no_data_yields_no_suggestions() {
        let builder = OverlapRecommendationBuilder::with_defaults();
        let rec = builder.build(
            None,
            None,
            &Classification::Merge,
            &CandidateMetrics::default(),
            &BehaviorMetrics::default(),
            &[],
            &[],
            None,
        );
        assert!(rec.actionable_suggestions.is_empty());
    }
}
