//! Candidate-axis mining.
//!
//! Proposes brand-new axes from three independent signal sources: the
//! PCA residual eigenvector, coverage-gap cluster directions, and
//! hub-prototype neighbor centroids. Candidates are filtered by a
//! confidence floor, deduplicated when near-parallel, and capped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use expression_model::{cosine_similarity, Prototype};

use crate::error::{require_in_range, ConfigError};
use crate::signals::{CoverageGap, HubPrototype, PcaResult};

/// Direction magnitudes below this count as a zero vector.
const NEAR_ZERO_MAGNITUDE: f64 = 1e-6;

/// Residual variance below this is too diffuse to mine.
const PCA_RESIDUAL_VARIANCE_MIN: f64 = 0.15;

/// Cosine similarity above which two candidate directions collapse.
const NEAR_PARALLEL_COSINE: f64 = 0.95;

/// Which analysis proposed a candidate axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateSource {
    PcaResidual,
    CoverageGap,
    HubDerived,
}

impl CandidateSource {
    pub fn tag(self) -> &'static str {
        match self {
            CandidateSource::PcaResidual => "pca_residual",
            CandidateSource::CoverageGap => "coverage_gap",
            CandidateSource::HubDerived => "hub_derived",
        }
    }
}

/// A proposed new axis with provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateAxis {
    pub candidate_id: String,
    pub source: CandidateSource,
    pub direction: BTreeMap<String, f64>,
    pub confidence: f64,
    pub source_prototypes: Vec<String>,
    pub metadata: BTreeMap<String, f64>,
}

/// Extraction thresholds.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionConfig {
    /// Candidates below this confidence are dropped before dedup.
    pub candidate_axis_min_extraction_confidence: f64,

    /// Hard cap on the returned candidate count.
    pub candidate_axis_max_candidates: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            candidate_axis_min_extraction_confidence: 0.3,
            candidate_axis_max_candidates: 8,
        }
    }
}

impl ExtractionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_in_range(
            "candidate_axis_min_extraction_confidence",
            self.candidate_axis_min_extraction_confidence,
            0.0,
            1.0,
        )?;
        if self.candidate_axis_max_candidates == 0 {
            return Err(ConfigError {
                field: "candidate_axis_max_candidates",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Mines candidate axes from upstream signals.
#[derive(Debug, Clone)]
pub struct CandidateAxisExtractor {
    config: ExtractionConfig,
}

impl CandidateAxisExtractor {
    /// Create an extractor, validating the configuration up front.
    pub fn new(config: ExtractionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn with_defaults() -> Self {
        Self::new(ExtractionConfig::default()).expect("default config is valid")
    }

    /// Extract candidates: source mining, confidence floor, near-parallel
    /// dedup, descending sort, cap.
    pub fn extract(
        &self,
        pca: &PcaResult,
        coverage_gaps: &[CoverageGap],
        hubs: &[HubPrototype],
        prototypes: &[Prototype],
    ) -> Vec<CandidateAxis> {
        let mut candidates = Vec::new();

        if let Some(candidate) = self.pca_candidate(pca) {
            candidates.push(candidate);
        }
        for (index, gap) in coverage_gaps.iter().enumerate() {
            if let Some(candidate) = self.gap_candidate(index, gap) {
                candidates.push(candidate);
            }
        }
        for hub in hubs {
            if let Some(candidate) = self.hub_candidate(hub, prototypes) {
                candidates.push(candidate);
            }
        }

        let floor = self.config.candidate_axis_min_extraction_confidence;
        let before_floor = candidates.len();
        candidates.retain(|c| c.confidence >= floor);

        let deduped = dedup_near_parallel(candidates);

        let mut sorted = deduped;
        sorted.sort_by(|x, y| {
            y.confidence
                .partial_cmp(&x.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted.truncate(self.config.candidate_axis_max_candidates);

        debug!(
            mined = before_floor,
            kept = sorted.len(),
            "candidate axes extracted"
        );
        sorted
    }

    /// Residual-eigenvector candidate, only when the residual is both
    /// strong and attributable to specific prototypes.
    fn pca_candidate(&self, pca: &PcaResult) -> Option<CandidateAxis> {
        let eigenvector = pca.residual_eigenvector.as_ref()?;
        if magnitude(eigenvector) < NEAR_ZERO_MAGNITUDE {
            return None;
        }
        if pca.top_loading_prototypes.is_empty() {
            return None;
        }
        if pca.residual_variance_ratio < PCA_RESIDUAL_VARIANCE_MIN {
            return None;
        }

        let confidence = (0.5 + pca.residual_variance_ratio).min(0.95);
        let mut metadata = BTreeMap::new();
        metadata.insert(
            "residual_variance_ratio".to_string(),
            pca.residual_variance_ratio,
        );

        Some(CandidateAxis {
            candidate_id: "pca_residual_0".to_string(),
            source: CandidateSource::PcaResidual,
            direction: eigenvector.clone(),
            confidence,
            source_prototypes: pca.top_loading_prototypes.clone(),
            metadata,
        })
    }

    fn gap_candidate(&self, index: usize, gap: &CoverageGap) -> Option<CandidateAxis> {
        let direction = gap.suggested_axis_direction.as_ref()?;
        if magnitude(direction) < NEAR_ZERO_MAGNITUDE {
            return None;
        }

        let distance_term = gap.distance_to_nearest_axis.clamp(0.0, 1.0);
        let size_term = (gap.cluster_size as f64 / 20.0).min(1.0);
        let confidence = (0.3 + 0.4 * distance_term + 0.3 * size_term).clamp(0.0, 1.0);

        let mut metadata = BTreeMap::new();
        metadata.insert("cluster_size".to_string(), gap.cluster_size as f64);
        metadata.insert(
            "distance_to_nearest_axis".to_string(),
            gap.distance_to_nearest_axis,
        );

        Some(CandidateAxis {
            candidate_id: format!("coverage_gap_{index}"),
            source: CandidateSource::CoverageGap,
            direction: normalized(direction),
            confidence,
            source_prototypes: gap.affected_prototypes.clone(),
            metadata,
        })
    }

    /// Normalized centroid of the hub's neighbor weight vectors.
    fn hub_candidate(
        &self,
        hub: &HubPrototype,
        prototypes: &[Prototype],
    ) -> Option<CandidateAxis> {
        if hub.overlapping_prototypes.len() < 2 {
            return None;
        }

        let mut centroid: BTreeMap<String, f64> = BTreeMap::new();
        let mut neighbor_count = 0usize;
        for neighbor_id in &hub.overlapping_prototypes {
            let Some(neighbor) = prototypes.iter().find(|p| &p.id == neighbor_id) else {
                continue;
            };
            neighbor_count += 1;
            for (axis, weight) in &neighbor.weights {
                *centroid.entry(axis.clone()).or_insert(0.0) += weight;
            }
        }
        if neighbor_count < 2 {
            return None;
        }
        for value in centroid.values_mut() {
            *value /= neighbor_count as f64;
        }
        if magnitude(&centroid) < NEAR_ZERO_MAGNITUDE {
            return None;
        }

        let confidence =
            (0.3 + 0.4 * hub.hub_score.clamp(0.0, 1.0)
                + 0.3 * hub.neighborhood_diversity.clamp(0.0, 1.0))
            .clamp(0.0, 1.0);

        let mut metadata = BTreeMap::new();
        metadata.insert("hub_score".to_string(), hub.hub_score);
        metadata.insert(
            "neighborhood_diversity".to_string(),
            hub.neighborhood_diversity,
        );

        let mut source_prototypes = vec![hub.prototype_id.clone()];
        source_prototypes.extend(hub.overlapping_prototypes.iter().cloned());

        Some(CandidateAxis {
            candidate_id: format!("hub_{}", hub.prototype_id),
            source: CandidateSource::HubDerived,
            direction: normalized(&centroid),
            confidence,
            source_prototypes,
            metadata,
        })
    }
}

/// Collapse candidates whose directions are near-parallel, keeping the
/// higher-confidence one.
fn dedup_near_parallel(candidates: Vec<CandidateAxis>) -> Vec<CandidateAxis> {
    let mut kept: Vec<CandidateAxis> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match kept.iter_mut().find(|existing| {
            cosine_similarity(&existing.direction, &candidate.direction) > NEAR_PARALLEL_COSINE
        }) {
            Some(existing) => {
                if candidate.confidence > existing.confidence {
                    *existing = candidate;
                }
            }
            None => kept.push(candidate),
        }
    }
    kept
}

fn magnitude(vector: &BTreeMap<String, f64>) -> f64 {
    vector.values().map(|v| v * v).sum::<f64>().sqrt()
}

fn normalized(vector: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    let mag = magnitude(vector);
    if mag < NEAR_ZERO_MAGNITUDE {
        return vector.clone();
    }
    vector.iter().map(|(k, v)| (k.clone(), v / mag)).collect()
}
