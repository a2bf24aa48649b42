//! Candidate-axis validation.
//!
//! Scores each candidate axis by simulating its addition: project every
//! prototype onto the candidate direction, remove the explained
//! component, and measure how much residual weight mass, strong-axis
//! pressure, and axis co-usage the addition relieves.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use expression_model::Prototype;

use crate::axis_extraction::{CandidateAxis, CandidateSource};
use crate::error::{require_in_range, ConfigError};

const NEAR_ZERO_MAGNITUDE: f64 = 1e-6;

/// Verdict for one candidate axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisRecommendation {
    AddAxis,
    RefinePrototypes,
    InsufficientData,
}

/// Improvement metrics from simulating the axis addition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ImprovementMetrics {
    pub rmse_reduction: f64,
    pub strong_axis_reduction: f64,
    pub co_usage_reduction: f64,
    /// Weighted combination of the normalized reductions, in `[0, 1]`.
    pub combined_score: f64,
}

/// Validation result for one candidate axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateAxisValidation {
    pub candidate_id: String,
    pub source: CandidateSource,
    pub is_recommended: bool,
    pub recommendation: AxisRecommendation,
    /// Sorted ids of prototypes whose projection onto the candidate
    /// direction is significant.
    pub affected_prototypes: Vec<String>,
    pub improvement: ImprovementMetrics,
    pub rationale: String,
    pub validation_error: Option<String>,
}

/// Validation thresholds and score weights.
#[derive(Debug, Clone, Copy)]
pub struct ValidationConfig {
    /// Weight magnitude at which an axis counts as strong.
    pub strong_axis_threshold: f64,

    /// Projection magnitude at which a prototype counts as affected.
    pub projection_significance: f64,

    pub rmse_weight: f64,
    pub strong_axis_weight: f64,
    pub co_usage_weight: f64,

    pub candidate_axis_min_affected_prototypes: usize,
    pub candidate_axis_min_rmse_reduction: f64,
    pub candidate_axis_min_combined_score: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            strong_axis_threshold: 0.3,
            projection_significance: 0.2,
            rmse_weight: 0.5,
            strong_axis_weight: 0.3,
            co_usage_weight: 0.2,
            candidate_axis_min_affected_prototypes: 2,
            candidate_axis_min_rmse_reduction: 0.05,
            candidate_axis_min_combined_score: 0.3,
        }
    }
}

impl ValidationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_in_range("strong_axis_threshold", self.strong_axis_threshold, 0.0, 1.0)?;
        require_in_range(
            "projection_significance",
            self.projection_significance,
            0.0,
            1.0,
        )?;
        require_in_range("rmse_weight", self.rmse_weight, 0.0, 1.0)?;
        require_in_range("strong_axis_weight", self.strong_axis_weight, 0.0, 1.0)?;
        require_in_range("co_usage_weight", self.co_usage_weight, 0.0, 1.0)?;
        require_in_range(
            "candidate_axis_min_rmse_reduction",
            self.candidate_axis_min_rmse_reduction,
            0.0,
            1.0,
        )?;
        require_in_range(
            "candidate_axis_min_combined_score",
            self.candidate_axis_min_combined_score,
            0.0,
            1.0,
        )
    }
}

/// Axis-space metrics for one configuration of prototypes.
#[derive(Debug, Clone, Copy, Default)]
struct SpaceMetrics {
    rmse: f64,
    strong_axis_count: usize,
    co_usage: f64,
}

/// Validates candidate axes against the existing prototype set.
#[derive(Debug, Clone)]
pub struct CandidateAxisValidator {
    config: ValidationConfig,
}

impl CandidateAxisValidator {
    /// Create a validator, validating the configuration up front.
    pub fn new(config: ValidationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn with_defaults() -> Self {
        Self::new(ValidationConfig::default()).expect("default config is valid")
    }

    /// Validate every candidate. Under two prototypes or with no
    /// candidates there is nothing to measure, so the batch is empty.
    pub fn validate(
        &self,
        prototypes: &[Prototype],
        existing_axes: &[String],
        candidates: &[CandidateAxis],
    ) -> Vec<CandidateAxisValidation> {
        if prototypes.len() < 2 || candidates.is_empty() {
            return Vec::new();
        }

        let axes: Vec<String> = if existing_axes.is_empty() {
            let harvested: BTreeSet<String> = prototypes
                .iter()
                .flat_map(|p| p.weights.keys().cloned())
                .collect();
            harvested.into_iter().collect()
        } else {
            existing_axes.to_vec()
        };

        let baseline = self.space_metrics(prototypes, &axes, None);
        debug!(
            rmse = baseline.rmse,
            strong_axes = baseline.strong_axis_count,
            co_usage = baseline.co_usage,
            "baseline axis-space metrics"
        );

        candidates
            .iter()
            .map(|candidate| self.validate_one(prototypes, &axes, baseline, candidate))
            .collect()
    }

    fn validate_one(
        &self,
        prototypes: &[Prototype],
        axes: &[String],
        baseline: SpaceMetrics,
        candidate: &CandidateAxis,
    ) -> CandidateAxisValidation {
        if let Some(error) = direction_error(candidate) {
            return CandidateAxisValidation {
                candidate_id: candidate.candidate_id.clone(),
                source: candidate.source,
                is_recommended: false,
                recommendation: AxisRecommendation::InsufficientData,
                affected_prototypes: Vec::new(),
                improvement: ImprovementMetrics::default(),
                rationale: format!("direction vector rejected: {error}"),
                validation_error: Some(error.to_string()),
            };
        }

        let unit = unit_direction(candidate);
        let simulated = self.space_metrics(prototypes, axes, Some(&unit));

        let rmse_reduction = (baseline.rmse - simulated.rmse).max(0.0);
        let strong_axis_reduction =
            (baseline.strong_axis_count as f64 - simulated.strong_axis_count as f64).max(0.0);
        let co_usage_reduction = (baseline.co_usage - simulated.co_usage).max(0.0);

        let normalized = |reduction: f64, base: f64| {
            if base > 0.0 {
                (reduction / base).clamp(0.0, 1.0)
            } else {
                0.0
            }
        };
        let combined_score = (self.config.rmse_weight * normalized(rmse_reduction, baseline.rmse)
            + self.config.strong_axis_weight
                * normalized(strong_axis_reduction, baseline.strong_axis_count as f64)
            + self.config.co_usage_weight * normalized(co_usage_reduction, baseline.co_usage))
        .clamp(0.0, 1.0);

        let mut affected: Vec<String> = prototypes
            .iter()
            .filter(|p| projection(p, &unit).abs() >= self.config.projection_significance)
            .map(|p| p.id.clone())
            .collect();
        affected.sort();

        let improvement = ImprovementMetrics {
            rmse_reduction,
            strong_axis_reduction,
            co_usage_reduction,
            combined_score,
        };

        let (recommendation, rationale) = if affected.len()
            < self.config.candidate_axis_min_affected_prototypes
        {
            (
                AxisRecommendation::InsufficientData,
                format!(
                    "only {} prototype(s) load significantly on this direction",
                    affected.len()
                ),
            )
        } else if rmse_reduction >= self.config.candidate_axis_min_rmse_reduction
            && combined_score >= self.config.candidate_axis_min_combined_score
        {
            (
                AxisRecommendation::AddAxis,
                format!(
                    "adding this axis reduces residual weight RMSE by {rmse_reduction:.3} \
                     (combined score {combined_score:.2}) across {} prototypes",
                    affected.len()
                ),
            )
        } else {
            (
                AxisRecommendation::RefinePrototypes,
                "improvement is below the add-axis bar; refine the loading prototypes instead"
                    .to_string(),
            )
        };

        CandidateAxisValidation {
            candidate_id: candidate.candidate_id.clone(),
            source: candidate.source,
            is_recommended: recommendation == AxisRecommendation::AddAxis,
            recommendation,
            affected_prototypes: affected,
            improvement,
            rationale,
            validation_error: None,
        }
    }

    /// RMSE / strong-axis / co-usage over the axis set, optionally after
    /// removing each prototype's component along `direction`.
    fn space_metrics(
        &self,
        prototypes: &[Prototype],
        axes: &[String],
        direction: Option<&[(String, f64)]>,
    ) -> SpaceMetrics {
        let threshold = self.config.strong_axis_threshold;
        let mut squared_sum = 0.0;
        let mut value_count = 0usize;
        let mut strong_axis_count = 0usize;
        let mut co_usage = 0.0;

        for prototype in prototypes {
            let proj = direction.map(|d| projection(prototype, d));
            let mut strong_here = 0usize;

            for axis in axes {
                let raw = prototype.weights.get(axis).copied().unwrap_or(0.0);
                let residual = match (direction, proj) {
                    (Some(d), Some(proj)) => {
                        let coord = d
                            .iter()
                            .find(|(a, _)| a == axis)
                            .map(|(_, v)| *v)
                            .unwrap_or(0.0);
                        raw - proj * coord
                    }
                    _ => raw,
                };
                squared_sum += residual * residual;
                value_count += 1;
                if residual.abs() >= threshold {
                    strong_here += 1;
                }
            }

            // The candidate itself becomes an axis in the simulated
            // space; its coordinate is explained mass, not residual.
            if let Some(proj) = proj {
                if proj.abs() >= threshold {
                    strong_here += 1;
                }
            }

            strong_axis_count += strong_here;
            co_usage += (strong_here * strong_here.saturating_sub(1)) as f64 / 2.0;
        }

        SpaceMetrics {
            rmse: if value_count > 0 {
                (squared_sum / value_count as f64).sqrt()
            } else {
                0.0
            },
            strong_axis_count,
            co_usage,
        }
    }
}

/// Reason the direction vector is unusable, if it is.
fn direction_error(candidate: &CandidateAxis) -> Option<&'static str> {
    if candidate.direction.is_empty() {
        return Some("direction_null_or_invalid");
    }
    let finite_magnitude: f64 = candidate
        .direction
        .values()
        .filter(|v| v.is_finite())
        .map(|v| v * v)
        .sum::<f64>()
        .sqrt();
    if finite_magnitude < NEAR_ZERO_MAGNITUDE {
        return Some("direction_near_zero_magnitude");
    }
    None
}

/// Unit direction as an ordered slice, skipping non-finite entries.
fn unit_direction(candidate: &CandidateAxis) -> Vec<(String, f64)> {
    let entries: Vec<(String, f64)> = candidate
        .direction
        .iter()
        .filter(|(_, v)| v.is_finite())
        .map(|(k, v)| (k.clone(), *v))
        .collect();
    let magnitude = entries.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
    entries
        .into_iter()
        .map(|(k, v)| (k, v / magnitude))
        .collect()
}

fn projection(prototype: &Prototype, unit: &[(String, f64)]) -> f64 {
    unit.iter()
        .map(|(axis, coord)| prototype.weights.get(axis).copied().unwrap_or(0.0) * coord)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn candidate(id: &str, entries: &[(&str, f64)]) -> CandidateAxis {
        CandidateAxis {
            candidate_id: id.to_string(),
            source: CandidateSource::CoverageGap,
            direction: entries
                .iter()
                .map(|(axis, v)| (axis.to_string(), *v))
                .collect(),
            confidence: 0.8,
            source_prototypes: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    fn prototype(id: &str, weights: &[(&str, f64)]) -> Prototype {
        let mut p = Prototype::new(id);
        for (axis, w) in weights {
            p = p.with_weight(*axis, *w);
        }
        p
    }

    #[test]
    fn test_guards_return_empty() {
        let validator = CandidateAxisValidator::with_defaults();
        let one = vec![prototype("a", &[("x", 0.5)])];
        let two = vec![
            prototype("a", &[("x", 0.5)]),
            prototype("b", &[("x", 0.4)]),
        ];
        let c = vec![candidate("c0", &[("x", 1.0)])];

        assert!(validator.validate(&[], &[], &c).is_empty());
        assert!(validator.validate(&one, &[], &c).is_empty());
        assert!(validator.validate(&two, &[], &[]).is_empty());
    }

    #[test]
    fn test_zero_magnitude_direction_flagged() {
        let validator = CandidateAxisValidator::with_defaults();
        let prototypes = vec![
            prototype("a", &[("x", 0.5)]),
            prototype("b", &[("x", 0.4)]),
        ];
        let zero = candidate("c0", &[("x", 0.0), ("y", 0.0)]);

        let results = validator.validate(&prototypes, &[], &[zero]);
        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(
            result.validation_error.as_deref(),
            Some("direction_near_zero_magnitude")
        );
        assert_eq!(result.improvement.combined_score, 0.0);
        assert_eq!(result.recommendation, AxisRecommendation::InsufficientData);
        assert!(!result.is_recommended);
    }

    #[test]
    fn test_empty_direction_flagged_invalid() {
        let validator = CandidateAxisValidator::with_defaults();
        let prototypes = vec![
            prototype("a", &[("x", 0.5)]),
            prototype("b", &[("x", 0.4)]),
        ];
        let empty = candidate("c0", &[]);

        let results = validator.validate(&prototypes, &[], &[empty]);
        assert_eq!(
            results[0].validation_error.as_deref(),
            Some("direction_null_or_invalid")
        );
    }

    #[test]
    fn test_bad_direction_does_not_abort_batch() {
        let validator = CandidateAxisValidator::with_defaults();
        let prototypes = vec![
            prototype("a", &[("x", 0.6), ("y", 0.6)]),
            prototype("b", &[("x", 0.5), ("y", 0.5)]),
        ];
        let results = validator.validate(
            &prototypes,
            &[],
            &[candidate("bad", &[("x", 0.0)]), candidate("good", &[("x", 0.7), ("y", 0.7)])],
        );
        assert_eq!(results.len(), 2);
        assert!(results[0].validation_error.is_some());
        assert!(results[1].validation_error.is_none());
    }

    #[test]
    fn test_aligned_direction_recommended() {
        let validator = CandidateAxisValidator::with_defaults();
        // Every prototype loads on the same diagonal; a diagonal axis
        // absorbs nearly all the weight mass.
        let prototypes = vec![
            prototype("a", &[("x", 0.6), ("y", 0.6)]),
            prototype("b", &[("x", 0.5), ("y", 0.5)]),
            prototype("c", &[("x", 0.4), ("y", 0.4)]),
        ];
        let diagonal = candidate("c0", &[("x", 1.0), ("y", 1.0)]);

        let results = validator.validate(&prototypes, &[], &[diagonal]);
        let result = &results[0];
        assert_eq!(result.recommendation, AxisRecommendation::AddAxis);
        assert!(result.is_recommended);
        assert!(result.improvement.rmse_reduction > 0.05);
        assert_eq!(result.affected_prototypes, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_orthogonal_direction_not_recommended() {
        let validator = CandidateAxisValidator::with_defaults();
        let prototypes = vec![
            prototype("a", &[("x", 0.6)]),
            prototype("b", &[("x", 0.5)]),
        ];
        // No prototype loads on z at all.
        let orthogonal = candidate("c0", &[("z", 1.0)]);

        let results = validator.validate(&prototypes, &[], &[orthogonal]);
        let result = &results[0];
        assert_eq!(result.recommendation, AxisRecommendation::InsufficientData);
        assert!(result.affected_prototypes.is_empty());
    }

    #[test]
    fn test_affected_prototypes_sorted() {
        let validator = CandidateAxisValidator::with_defaults();
        let prototypes = vec![
            prototype("zeta", &[("x", 0.9)]),
            prototype("alpha", &[("x", 0.8)]),
            prototype("mid", &[("x", 0.7)]),
        ];
        let results = validator.validate(&prototypes, &[], &[candidate("c0", &[("x", 1.0)])]);
        assert_eq!(results[0].affected_prototypes, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_explicit_axes_respected_over_harvest() {
        let validator = CandidateAxisValidator::with_defaults();
        let prototypes = vec![
            prototype("a", &[("x", 0.6), ("hidden", 0.9)]),
            prototype("b", &[("x", 0.5)]),
        ];
        let axes = vec!["x".to_string()];
        let results = validator.validate(&prototypes, &axes, &[candidate("c0", &[("x", 1.0)])]);
        // "hidden" is outside the declared axis space, so baseline RMSE
        // only reflects x.
        assert!(results[0].validation_error.is_none());
    }
}
