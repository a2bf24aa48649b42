//! Axis-gap report synthesis.
//!
//! Aggregates every upstream signal (PCA residuals, hubs, coverage
//! gaps, conflicts, candidate-axis validation) into a single report
//! with a family-deduplicated confidence level and per-prototype
//! weight summaries.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use expression_model::Prototype;

use crate::axis_validation::{AxisRecommendation, CandidateAxisValidation};
use crate::error::{require_in_range, ConfigError};
use crate::signals::{
    CoverageGap, HubPrototype, MultiAxisConflict, PcaResult, SignalFamily, SplitConflicts,
};

/// Unique identifier for one synthesized report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportId(pub Uuid);

impl ReportId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ReportId {
    fn default() -> Self {
        Self::new()
    }
}

/// Overall confidence that the signal set indicates a real axis gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

/// Raw signal counts by source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SignalBreakdown {
    /// 1 when the PCA residual counts as triggered, 0 otherwise.
    pub pca_signals: usize,
    pub hub_signals: usize,
    pub coverage_gap_signals: usize,
    pub multi_axis_conflict_signals: usize,
    pub high_axis_loading_signals: usize,
    pub sign_tension_signals: usize,
    pub candidate_axis_count: usize,
    pub recommended_candidate_count: usize,
}

/// Report header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_prototypes_analyzed: usize,
    pub signal_breakdown: SignalBreakdown,
    pub confidence: ConfidenceLevel,
    pub recommendation_count: usize,
    pub potential_gaps_detected: usize,
}

/// One axis/weight entry in a prototype summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisWeight {
    pub axis: String,
    pub weight: f64,
}

/// Why one prototype keeps showing up across signal sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrototypeWeightSummary {
    pub prototype_id: String,

    /// Deduplicated reason tags, one per flagging source kind.
    pub reasons: Vec<String>,
    pub metrics_by_reason: BTreeMap<String, BTreeMap<String, f64>>,

    /// Distinct signal families behind the reasons; this is what gates
    /// confidence boosting, not the raw reason count.
    pub distinct_family_count: usize,

    /// Raw-count agreement flag, kept alongside the family count.
    pub multi_signal_agreement: bool,

    /// Top-5 weights by magnitude, non-finite values dropped.
    pub top_axes: Vec<AxisWeight>,

    /// Mirror of the first reason entry.
    pub reason: Option<String>,
    /// Mirror of the first metrics entry.
    pub metrics: Option<BTreeMap<String, f64>>,
}

/// One prioritized follow-up action in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapRecommendation {
    pub priority: f64,
    pub description: String,
    pub related_prototypes: Vec<String>,
}

/// Produces and orders the report's follow-up recommendations.
pub trait GapRecommendationBuilder {
    fn generate(
        &self,
        pca: &PcaResult,
        hubs: &[HubPrototype],
        gaps: &[CoverageGap],
        conflicts: &[MultiAxisConflict],
        candidate_validation: &[CandidateAxisValidation],
    ) -> Vec<GapRecommendation>;

    fn sort_by_priority(&self, recommendations: Vec<GapRecommendation>) -> Vec<GapRecommendation>;
}

/// Default recommendation builder: one entry per actionable signal,
/// prioritized by how direct the follow-up is.
#[derive(Debug, Clone, Default)]
pub struct StandardGapRecommendationBuilder;

impl GapRecommendationBuilder for StandardGapRecommendationBuilder {
    fn generate(
        &self,
        _pca: &PcaResult,
        hubs: &[HubPrototype],
        gaps: &[CoverageGap],
        conflicts: &[MultiAxisConflict],
        candidate_validation: &[CandidateAxisValidation],
    ) -> Vec<GapRecommendation> {
        let mut recommendations = Vec::new();

        for validation in candidate_validation {
            match validation.recommendation {
                AxisRecommendation::AddAxis => recommendations.push(GapRecommendation {
                    priority: 0.9,
                    description: format!(
                        "add candidate axis '{}': {}",
                        validation.candidate_id, validation.rationale
                    ),
                    related_prototypes: validation.affected_prototypes.clone(),
                }),
                AxisRecommendation::RefinePrototypes => recommendations.push(GapRecommendation {
                    priority: 0.6,
                    description: format!(
                        "refine prototypes loading on candidate '{}' instead of adding an axis",
                        validation.candidate_id
                    ),
                    related_prototypes: validation.affected_prototypes.clone(),
                }),
                AxisRecommendation::InsufficientData => {}
            }
        }

        for hub in hubs {
            recommendations.push(GapRecommendation {
                priority: (0.4 + 0.3 * hub.hub_score).clamp(0.0, 1.0),
                description: format!(
                    "review hub prototype '{}' overlapping {} neighbors",
                    hub.prototype_id,
                    hub.overlapping_prototypes.len()
                ),
                related_prototypes: vec![hub.prototype_id.clone()],
            });
        }

        for gap in gaps {
            recommendations.push(GapRecommendation {
                priority: (0.3 + 0.3 * gap.distance_to_nearest_axis).clamp(0.0, 1.0),
                description: format!(
                    "investigate coverage gap of {} states far from every axis",
                    gap.cluster_size
                ),
                related_prototypes: gap.affected_prototypes.clone(),
            });
        }

        for conflict in conflicts {
            recommendations.push(GapRecommendation {
                priority: (0.3 + 0.4 * conflict.conflict_score).clamp(0.0, 1.0),
                description: format!(
                    "resolve multi-axis conflict in '{}' across axes {:?}",
                    conflict.prototype_id, conflict.axes
                ),
                related_prototypes: vec![conflict.prototype_id.clone()],
            });
        }

        recommendations
    }

    fn sort_by_priority(
        &self,
        mut recommendations: Vec<GapRecommendation>,
    ) -> Vec<GapRecommendation> {
        recommendations.sort_by(|x, y| {
            y.priority
                .partial_cmp(&x.priority)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        recommendations
    }
}

/// Full axis-gap report, built once per analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub report_id: ReportId,
    pub summary: ReportSummary,
    pub pca_analysis: PcaResult,
    pub hub_prototypes: Vec<HubPrototype>,
    pub coverage_gaps: Vec<CoverageGap>,
    pub multi_axis_conflicts: Vec<MultiAxisConflict>,
    pub high_axis_loadings: Vec<crate::signals::AxisLoading>,
    pub sign_tensions: Vec<crate::signals::SignTension>,
    pub candidate_axis_validation: Vec<CandidateAxisValidation>,
    pub recommendations: Vec<GapRecommendation>,
    pub prototype_weight_summaries: Vec<PrototypeWeightSummary>,
}

/// Synthesis thresholds.
#[derive(Debug, Clone, Copy)]
pub struct SynthesizerConfig {
    /// Whether a strong PCA residual alone counts as a triggered method
    /// without another signal family backing it up.
    pub pca_require_corroboration: bool,

    /// Residual variance ratio above which the PCA residual is strong.
    pub pca_residual_variance_threshold: f64,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            pca_require_corroboration: true,
            pca_residual_variance_threshold: 0.15,
        }
    }
}

impl SynthesizerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_in_range(
            "pca_residual_variance_threshold",
            self.pca_residual_variance_threshold,
            0.0,
            1.0,
        )
    }
}

/// Top-level report synthesizer.
pub struct AxisGapReportSynthesizer {
    config: SynthesizerConfig,
    recommendation_builder: Box<dyn GapRecommendationBuilder>,
}

impl AxisGapReportSynthesizer {
    /// Create a synthesizer, validating the configuration up front.
    pub fn new(config: SynthesizerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            recommendation_builder: Box::new(StandardGapRecommendationBuilder),
        })
    }

    pub fn with_defaults() -> Self {
        Self::new(SynthesizerConfig::default()).expect("default config is valid")
    }

    /// Replace the recommendation builder.
    pub fn with_recommendation_builder(
        mut self,
        builder: Box<dyn GapRecommendationBuilder>,
    ) -> Self {
        self.recommendation_builder = builder;
        self
    }

    /// Aggregate all signals into one report.
    #[allow(clippy::too_many_arguments)]
    pub fn synthesize(
        &self,
        pca: &PcaResult,
        hubs: &[HubPrototype],
        coverage_gaps: &[CoverageGap],
        conflicts: &[MultiAxisConflict],
        total_prototypes: usize,
        prototypes: &[Prototype],
        split_conflicts: Option<&SplitConflicts>,
        candidate_validation: Option<&[CandidateAxisValidation]>,
    ) -> Report {
        let validation = candidate_validation.unwrap_or(&[]);
        let empty_split = SplitConflicts::default();
        let split = split_conflicts.unwrap_or(&empty_split);

        let conflict_signals_present = !conflicts.is_empty()
            || !split.high_axis_loadings.is_empty()
            || !split.sign_tensions.is_empty();
        let other_family_present =
            !hubs.is_empty() || !coverage_gaps.is_empty() || conflict_signals_present;
        let pca_triggered = self.pca_triggered(pca, other_family_present);

        let signal_breakdown = SignalBreakdown {
            pca_signals: usize::from(pca_triggered),
            hub_signals: hubs.len(),
            coverage_gap_signals: coverage_gaps.len(),
            multi_axis_conflict_signals: conflicts.len(),
            high_axis_loading_signals: split.high_axis_loadings.len(),
            sign_tension_signals: split.sign_tensions.len(),
            candidate_axis_count: validation.len(),
            recommended_candidate_count: validation.iter().filter(|v| v.is_recommended).count(),
        };

        let mut methods_triggered = 0usize;
        if pca_triggered {
            methods_triggered += 1;
        }
        if !hubs.is_empty() {
            methods_triggered += 1;
        }
        if !coverage_gaps.is_empty() {
            methods_triggered += 1;
        }
        if conflict_signals_present {
            methods_triggered += 1;
        }

        let prototype_weight_summaries =
            compute_prototype_weight_summaries(prototypes, pca, hubs, coverage_gaps, conflicts, split);

        let mut confidence = match methods_triggered {
            0 | 1 => ConfidenceLevel::Low,
            2 => ConfidenceLevel::Medium,
            _ => ConfidenceLevel::High,
        };
        if confidence == ConfidenceLevel::Medium
            && prototype_weight_summaries
                .iter()
                .any(|s| s.distinct_family_count >= 3)
        {
            confidence = ConfidenceLevel::High;
        }

        let recommendations = self.recommendation_builder.sort_by_priority(
            self.recommendation_builder
                .generate(pca, hubs, coverage_gaps, conflicts, validation),
        );

        debug!(
            methods_triggered,
            ?confidence,
            recommendations = recommendations.len(),
            "axis-gap report synthesized"
        );

        Report {
            report_id: ReportId::new(),
            summary: ReportSummary {
                total_prototypes_analyzed: total_prototypes,
                signal_breakdown,
                confidence,
                recommendation_count: recommendations.len(),
                potential_gaps_detected: recommendations.len(),
            },
            pca_analysis: pca.clone(),
            hub_prototypes: hubs.to_vec(),
            coverage_gaps: coverage_gaps.to_vec(),
            multi_axis_conflicts: conflicts.to_vec(),
            high_axis_loadings: split.high_axis_loadings.clone(),
            sign_tensions: split.sign_tensions.clone(),
            candidate_axis_validation: validation.to_vec(),
            recommendations,
            prototype_weight_summaries,
        }
    }

    /// A report with the full structure but nothing in it.
    pub fn build_empty_report(&self, total_prototypes: usize) -> Report {
        Report {
            report_id: ReportId::new(),
            summary: ReportSummary {
                total_prototypes_analyzed: total_prototypes,
                signal_breakdown: SignalBreakdown::default(),
                confidence: ConfidenceLevel::Low,
                recommendation_count: 0,
                potential_gaps_detected: 0,
            },
            pca_analysis: PcaResult::default(),
            hub_prototypes: Vec::new(),
            coverage_gaps: Vec::new(),
            multi_axis_conflicts: Vec::new(),
            high_axis_loadings: Vec::new(),
            sign_tensions: Vec::new(),
            candidate_axis_validation: Vec::new(),
            recommendations: Vec::new(),
            prototype_weight_summaries: Vec::new(),
        }
    }

    /// Corroboration rule: extra significant components always trigger;
    /// a strong residual alone triggers only without the corroboration
    /// requirement or with another family present.
    fn pca_triggered(&self, pca: &PcaResult, other_family_present: bool) -> bool {
        if pca.additional_significant_components > 0 {
            return true;
        }
        if pca.residual_variance_ratio >= self.config.pca_residual_variance_threshold {
            return !self.config.pca_require_corroboration || other_family_present;
        }
        false
    }
}

/// Accumulate per-prototype flag reasons across every signal source.
pub fn compute_prototype_weight_summaries(
    prototypes: &[Prototype],
    pca: &PcaResult,
    hubs: &[HubPrototype],
    coverage_gaps: &[CoverageGap],
    conflicts: &[MultiAxisConflict],
    split: &SplitConflicts,
) -> Vec<PrototypeWeightSummary> {
    let mut summaries = Vec::new();

    for prototype in prototypes {
        let mut reasons: Vec<String> = Vec::new();
        let mut metrics_by_reason: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();

        let mut flag = |reason: &str, metrics: BTreeMap<String, f64>| {
            // Repeated flags from the same source kind collapse to one.
            if !reasons.iter().any(|r| r == reason) {
                reasons.push(reason.to_string());
                metrics_by_reason.insert(reason.to_string(), metrics);
            }
        };

        if pca.top_loading_prototypes.contains(&prototype.id) {
            flag(
                "pca_top_loading",
                BTreeMap::from([(
                    "residual_variance_ratio".to_string(),
                    pca.residual_variance_ratio,
                )]),
            );
        }
        for hub in hubs.iter().filter(|h| h.prototype_id == prototype.id) {
            flag(
                "hub_prototype",
                BTreeMap::from([
                    ("hub_score".to_string(), hub.hub_score),
                    (
                        "neighborhood_diversity".to_string(),
                        hub.neighborhood_diversity,
                    ),
                ]),
            );
        }
        for gap in coverage_gaps
            .iter()
            .filter(|g| g.affected_prototypes.contains(&prototype.id))
        {
            flag(
                "coverage_gap",
                BTreeMap::from([
                    ("cluster_size".to_string(), gap.cluster_size as f64),
                    (
                        "distance_to_nearest_axis".to_string(),
                        gap.distance_to_nearest_axis,
                    ),
                ]),
            );
        }
        for conflict in conflicts.iter().filter(|c| c.prototype_id == prototype.id) {
            flag(
                "multi_axis_conflict",
                BTreeMap::from([("conflict_score".to_string(), conflict.conflict_score)]),
            );
        }
        for loading in split
            .high_axis_loadings
            .iter()
            .filter(|l| l.prototype_id == prototype.id)
        {
            flag(
                "high_axis_loading",
                BTreeMap::from([("loading".to_string(), loading.loading)]),
            );
        }
        for tension in split
            .sign_tensions
            .iter()
            .filter(|t| t.prototype_id == prototype.id)
        {
            flag(
                "sign_tension",
                BTreeMap::from([("tension".to_string(), tension.tension)]),
            );
        }

        if reasons.is_empty() {
            continue;
        }

        let families: BTreeSet<SignalFamily> = reasons
            .iter()
            .filter_map(|r| SignalFamily::of_reason(r))
            .collect();

        let mut top_axes: Vec<AxisWeight> = prototype
            .weights
            .iter()
            .filter(|(_, w)| w.is_finite())
            .map(|(axis, weight)| AxisWeight {
                axis: axis.clone(),
                weight: *weight,
            })
            .collect();
        top_axes.sort_by(|x, y| {
            y.weight
                .abs()
                .partial_cmp(&x.weight.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        top_axes.truncate(5);

        summaries.push(PrototypeWeightSummary {
            prototype_id: prototype.id.clone(),
            reason: reasons.first().cloned(),
            metrics: reasons.first().and_then(|r| metrics_by_reason.get(r).cloned()),
            distinct_family_count: families.len(),
            multi_signal_agreement: reasons.len() >= 3,
            top_axes,
            reasons,
            metrics_by_reason,
        });
    }

    summaries
}
