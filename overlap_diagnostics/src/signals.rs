//! Axis-gap signal inputs.
//!
//! Upstream analyses (PCA residuals, hub detection, coverage clustering,
//! conflict scans) hand their findings to the diagnostics engine in
//! these shapes. The engine never recomputes them; it only mines and
//! aggregates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Closed set of signal families used for confidence dedup.
///
/// Family membership is what counts toward report confidence: three
/// reasons from two families is still two families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SignalFamily {
    Pca,
    Hub,
    Gap,
    Conflict,
}

impl SignalFamily {
    /// Family owning a reason tag, if the tag is recognized.
    pub fn of_reason(reason: &str) -> Option<Self> {
        match reason {
            "pca_top_loading" => Some(Self::Pca),
            "hub_prototype" => Some(Self::Hub),
            "coverage_gap" => Some(Self::Gap),
            "multi_axis_conflict" | "high_axis_loading" | "sign_tension" => Some(Self::Conflict),
            _ => None,
        }
    }
}

/// Residual principal-component analysis over the prototype weight matrix.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PcaResult {
    /// Fraction of weight variance unexplained by the existing axes.
    pub residual_variance_ratio: f64,

    /// Significant components beyond the existing axis count.
    pub additional_significant_components: usize,

    /// Direction of the dominant residual component, roughly unit length.
    pub residual_eigenvector: Option<BTreeMap<String, f64>>,

    /// Prototypes loading most heavily on the residual component.
    pub top_loading_prototypes: Vec<String>,
}

/// A prototype whose activation region overlaps many neighbors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubPrototype {
    pub prototype_id: String,

    /// Overlap centrality in `[0, 1]`.
    pub hub_score: f64,

    /// How spread-out the neighbors are in weight space, in `[0, 1]`.
    pub neighborhood_diversity: f64,

    pub overlapping_prototypes: Vec<String>,
}

/// A cluster of observed states poorly explained by any existing axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageGap {
    pub cluster_size: usize,

    /// Distance from the cluster centroid to the nearest axis direction.
    pub distance_to_nearest_axis: f64,

    /// Proposed direction for a new axis covering the cluster, if the
    /// upstream analysis could derive one.
    pub suggested_axis_direction: Option<BTreeMap<String, f64>>,

    /// Prototypes nearest to the cluster.
    pub affected_prototypes: Vec<String>,
}

/// A prototype pulling several axes in incompatible directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiAxisConflict {
    pub prototype_id: String,
    pub axes: Vec<String>,
    pub conflict_score: f64,
}

/// One axis carrying an outsized share of a prototype's weight mass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisLoading {
    pub prototype_id: String,
    pub axis: String,
    pub loading: f64,
}

/// Two prototypes agreeing on activation but opposing on an axis sign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignTension {
    pub prototype_id: String,
    pub axis: String,
    pub tension: f64,
}

/// Conflict scan output split into its two sub-signals.
///
/// Both sub-signals belong to the `Conflict` family for dedup purposes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitConflicts {
    pub high_axis_loadings: Vec<AxisLoading>,
    pub sign_tensions: Vec<SignTension>,
}
