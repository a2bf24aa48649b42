//! Behavioral overlap - empirical pass-rate statistics from sampling.
//!
//! Samples synthetic world-states, evaluates both prototypes' gates and
//! intensities per sample, and accumulates joint/conditional pass rates,
//! intensity correlation and dominance, and illustrative divergence
//! examples. Sampling may be batched behind the generator, so the
//! evaluation surface is async; no partial results are exposed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use expression_model::{
    compute_intensity, gates_pass, parse_gates, ContextBuilder, Prototype, StateGenerator,
};

use crate::error::{require_non_negative, ConfigError};
use crate::implication::ImplicationResult;

/// Empirical gate-overlap rates over the sample population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct GateOverlapRates {
    /// Fraction of samples where at least one prototype fires.
    pub on_either_rate: f64,
    /// Fraction of samples where both fire.
    pub on_both_rate: f64,
    /// Fraction where only the first fires.
    pub p_only_rate: f64,
    /// Fraction where only the second fires.
    pub q_only_rate: f64,
}

/// Intensity relationship over co-passing samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct IntensityStats {
    pub pearson_correlation: f64,
    pub mean_abs_diff: f64,
    /// Fraction of co-passing samples where A exceeds B by more than the
    /// dominance margin.
    pub dominance_p: f64,
    /// Symmetric for B over A.
    pub dominance_q: f64,
}

/// Raw and conditional pass rates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PassRates {
    pub pass_a_rate: f64,
    pub pass_b_rate: f64,
    /// `P(A | B)`; `0.0` when the conditioning count is below guard.
    pub p_a_given_b: f64,
    /// `P(B | A)`; same convention.
    pub p_b_given_a: f64,
    pub co_pass_count: usize,
    pub sample_count: usize,
}

/// One high-divergence co-passing sample kept as evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DivergenceExample {
    /// Axis snapshot of the sample context.
    pub axes: BTreeMap<String, f64>,
    pub intensity_a: f64,
    pub intensity_b: f64,
    pub abs_diff: f64,
}

/// Full Stage-B behavioral metrics for one prototype pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BehaviorMetrics {
    pub pass_rates: PassRates,
    pub gate_overlap: GateOverlapRates,
    pub intensity: IntensityStats,

    /// Deterministic gate implication carried alongside the empirical
    /// metrics, when the upstream filter produced one.
    pub gate_implication: Option<ImplicationResult>,

    /// Whether both gate lists parsed completely.
    pub gate_parse_complete: bool,
}

/// Behavioral evaluation output: metrics plus divergence evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorEvaluation {
    pub metrics: BehaviorMetrics,
    pub divergence_examples: Vec<DivergenceExample>,
}

/// Configuration for behavioral sampling.
#[derive(Debug, Clone, Copy)]
pub struct BehaviorConfig {
    /// Minimum conditioning pass count before a conditional probability
    /// is reported; below it the conditional is `0.0`.
    pub min_pass_samples_for_conditional: usize,

    /// Intensity margin for dominance counting.
    pub dominance_delta: f64,

    /// How many highest-divergence co-passing samples to keep.
    pub divergence_examples_k: usize,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            min_pass_samples_for_conditional: 1,
            dominance_delta: 0.1,
            divergence_examples_k: 3,
        }
    }
}

impl BehaviorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_negative("dominance_delta", self.dominance_delta)
    }
}

/// Samples world-states and computes empirical overlap statistics.
pub struct BehavioralOverlapEvaluator<G: StateGenerator> {
    config: BehaviorConfig,
    generator: G,
    context_builder: ContextBuilder,
}

impl<G: StateGenerator> BehavioralOverlapEvaluator<G> {
    /// Create an evaluator, validating the configuration up front.
    pub fn new(config: BehaviorConfig, generator: G) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            generator,
            context_builder: ContextBuilder::new(),
        })
    }

    /// Default configuration, caller-supplied generator.
    pub fn with_defaults(generator: G) -> Self {
        Self::new(BehaviorConfig::default(), generator).expect("default config is valid")
    }

    /// Evaluate a prototype pair over `sample_count` synthetic states.
    ///
    /// Unparseable gates are skipped with a warning; the remainder of
    /// the gate list still applies. Division-by-zero degeneracies
    /// resolve to `0.0` so no NaN enters classification, while NaN
    /// intensities from corrupted weights flow through visibly.
    pub async fn evaluate(
        &mut self,
        a: &Prototype,
        b: &Prototype,
        sample_count: usize,
    ) -> BehaviorEvaluation {
        let (gates_a, errors_a) = parse_gates(&a.gates);
        let (gates_b, errors_b) = parse_gates(&b.gates);
        for err in errors_a.iter().chain(errors_b.iter()) {
            warn!(prototype_a = %a.id, prototype_b = %b.id, %err, "skipping unparseable gate");
        }
        let gate_parse_complete = errors_a.is_empty() && errors_b.is_empty();

        let mut pass_a_count = 0usize;
        let mut pass_b_count = 0usize;
        let mut co_pass_count = 0usize;
        let mut co_intensities: Vec<(f64, f64)> = Vec::new();
        let mut examples: Vec<DivergenceExample> = Vec::new();

        for _ in 0..sample_count {
            let sample = self.generator.generate();
            let ctx = self.context_builder.build_context(&sample);

            let pass_a = gates_pass(&gates_a, &ctx);
            let pass_b = gates_pass(&gates_b, &ctx);
            if pass_a {
                pass_a_count += 1;
            }
            if pass_b {
                pass_b_count += 1;
            }
            if pass_a && pass_b {
                co_pass_count += 1;
                let intensity_a = compute_intensity(a, &ctx);
                let intensity_b = compute_intensity(b, &ctx);
                co_intensities.push((intensity_a, intensity_b));

                let abs_diff = (intensity_a - intensity_b).abs();
                examples.push(DivergenceExample {
                    axes: ctx.axes.clone(),
                    intensity_a,
                    intensity_b,
                    abs_diff,
                });
            }
        }

        // Keep only the K most divergent co-passing samples.
        examples.sort_by(|x, y| {
            y.abs_diff
                .partial_cmp(&x.abs_diff)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        examples.truncate(self.config.divergence_examples_k);

        let n = sample_count as f64;
        let rate = |count: usize| if sample_count == 0 { 0.0 } else { count as f64 / n };

        let pass_rates = PassRates {
            pass_a_rate: rate(pass_a_count),
            pass_b_rate: rate(pass_b_count),
            p_a_given_b: self.conditional(co_pass_count, pass_b_count),
            p_b_given_a: self.conditional(co_pass_count, pass_a_count),
            co_pass_count,
            sample_count,
        };

        let either = pass_a_count + pass_b_count - co_pass_count;
        let gate_overlap = GateOverlapRates {
            on_either_rate: rate(either),
            on_both_rate: rate(co_pass_count),
            p_only_rate: rate(pass_a_count - co_pass_count),
            q_only_rate: rate(pass_b_count - co_pass_count),
        };

        let intensity = intensity_stats(&co_intensities, self.config.dominance_delta);

        debug!(
            prototype_a = %a.id,
            prototype_b = %b.id,
            sample_count,
            co_pass_count,
            p_a_given_b = pass_rates.p_a_given_b,
            p_b_given_a = pass_rates.p_b_given_a,
            "behavioral overlap evaluated"
        );

        BehaviorEvaluation {
            metrics: BehaviorMetrics {
                pass_rates,
                gate_overlap,
                intensity,
                gate_implication: None,
                gate_parse_complete,
            },
            divergence_examples: examples,
        }
    }

    /// `co / count`, `0.0` when the conditioning count is zero or below
    /// the configured minimum. Always within `[0, 1]`.
    fn conditional(&self, co: usize, count: usize) -> f64 {
        if count == 0 || count < self.config.min_pass_samples_for_conditional {
            0.0
        } else {
            co as f64 / count as f64
        }
    }
}

fn intensity_stats(pairs: &[(f64, f64)], dominance_delta: f64) -> IntensityStats {
    if pairs.is_empty() {
        return IntensityStats::default();
    }
    let n = pairs.len() as f64;

    let mean_a = pairs.iter().map(|(a, _)| a).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|(_, b)| b).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    let mut abs_diff_sum = 0.0;
    let mut dominance_p = 0usize;
    let mut dominance_q = 0usize;

    for (a, b) in pairs {
        let da = a - mean_a;
        let db = b - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
        abs_diff_sum += (a - b).abs();
        if a - b > dominance_delta {
            dominance_p += 1;
        }
        if b - a > dominance_delta {
            dominance_q += 1;
        }
    }

    let denom = (var_a * var_b).sqrt();
    let pearson_correlation = if denom == 0.0 { 0.0 } else { cov / denom };

    IntensityStats {
        pearson_correlation,
        mean_abs_diff: abs_diff_sum / n,
        dominance_p: dominance_p as f64 / n,
        dominance_q: dominance_q as f64 / n,
    }
}
