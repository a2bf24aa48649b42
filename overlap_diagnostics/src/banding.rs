//! Gate banding - concrete numeric gate adjustments for nested pairs.
//!
//! For nested or separation-worthy pairs, derives per-axis gate
//! suggestions that push the broader prototype out of the narrower
//! one's range, plus a mutual-exclusion suppression rule for true
//! nested siblings.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classifier::{Classification, Side};
use crate::error::{require_non_negative, ConfigError};
use crate::implication::{AxisEvidence, ImplicationResult};

/// Kind of adjustment being suggested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuggestionKind {
    /// Add a numeric gate to the target prototype.
    GateBand,
    /// Add a mutual-exclusion rule between the two prototypes.
    ExpressionSuppression,
}

/// One concrete adjustment suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandingSuggestion {
    pub kind: SuggestionKind,

    /// Axis the suggestion concerns; empty for suppression rules.
    pub axis: String,

    /// Which prototype should take the adjustment.
    pub target: Side,

    /// Rendered gate text (e.g. `"valence >= 0.55"`) or rule text.
    pub text: String,
}

/// Configuration for banding suggestions.
#[derive(Debug, Clone, Copy)]
pub struct BandingConfig {
    /// Margin added beyond the narrower prototype's bound.
    pub band_margin: f64,
}

impl Default for BandingConfig {
    fn default() -> Self {
        Self { band_margin: 0.05 }
    }
}

impl BandingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_negative("band_margin", self.band_margin)
    }
}

/// Builds gate-adjustment suggestions from per-axis implication evidence.
///
/// Stateless and deterministic: identical inputs produce identical
/// suggestion lists.
#[derive(Debug, Clone)]
pub struct GateBandingSuggestionBuilder {
    config: BandingConfig,
}

impl GateBandingSuggestionBuilder {
    /// Create a builder, validating the configuration up front.
    pub fn new(config: BandingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn with_defaults() -> Self {
        Self::new(BandingConfig::default()).expect("default config is valid")
    }

    /// Derive suggestions for a classified pair.
    ///
    /// Only `NestedSiblings` and `NeedsSeparation` produce suggestions;
    /// everything else returns an empty list.
    pub fn build_suggestions(
        &self,
        implication: &ImplicationResult,
        classification: &Classification,
    ) -> Vec<BandingSuggestion> {
        let nested_siblings = match classification {
            Classification::NestedSiblings { .. } => true,
            Classification::NeedsSeparation { .. } => false,
            other => {
                debug!(?other, "no banding suggestions for classification");
                return Vec::new();
            }
        };

        let mut suggestions = Vec::new();
        let mut skipped = 0usize;

        for evidence in &implication.evidence {
            match self.axis_suggestion(evidence) {
                Some(suggestion) => suggestions.push(suggestion),
                None => skipped += 1,
            }
        }

        if nested_siblings {
            suggestions.push(BandingSuggestion {
                kind: SuggestionKind::ExpressionSuppression,
                axis: String::new(),
                target: Side::B,
                text: "when the higher-tier prototype is active, suppress the lower-tier \
                       prototype via a mutual-exclusion rule"
                    .to_string(),
            });
        }

        debug!(
            count = suggestions.len(),
            skipped, "gate banding suggestions built"
        );
        suggestions
    }

    /// A band suggestion for one axis, if its subset flags single out a
    /// narrower side with a bound that actually separates the intervals.
    fn axis_suggestion(&self, evidence: &AxisEvidence) -> Option<BandingSuggestion> {
        // Equal or mutually non-nested axes carry no band direction.
        let (narrower, broader, broader_side) = match (evidence.a_subset_b, evidence.b_subset_a) {
            (true, false) => (evidence.interval_a, evidence.interval_b, Side::B),
            (false, true) => (evidence.interval_b, evidence.interval_a, Side::A),
            _ => return None,
        };

        let margin = self.config.band_margin;

        // Band only past a bound the broader prototype actually exceeds;
        // a shared bound leaves no room on that side. Prefer banding
        // above the narrower range when its upper bound distinguishes
        // the pair (broader upper of None = +inf), otherwise below its
        // distinguishing lower bound.
        if let Some(upper) = narrower.upper {
            if broader.upper.map_or(true, |b| upper < b) {
                return Some(BandingSuggestion {
                    kind: SuggestionKind::GateBand,
                    axis: evidence.axis.clone(),
                    target: broader_side,
                    text: format!("{} >= {:.2}", evidence.axis, upper + margin),
                });
            }
        }

        if let Some(lower) = narrower.lower {
            if broader.lower.map_or(true, |b| lower > b) {
                return Some(BandingSuggestion {
                    kind: SuggestionKind::GateBand,
                    axis: evidence.axis.clone(),
                    target: broader_side,
                    text: format!("{} <= {:.2}", evidence.axis, lower - margin),
                });
            }
        }

        // No bound separates the intervals on this axis.
        None
    }
}
