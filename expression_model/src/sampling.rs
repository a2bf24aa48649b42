//! Sampling primitives - synthetic world-states for behavioral analysis.
//!
//! The behavioral evaluator estimates pass rates empirically: it draws
//! synthetic affect states, flattens each into a sample context, and
//! checks both prototypes' gates and intensities against it.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::gate::Gate;
use crate::prototype::Prototype;

/// One affect snapshot: mood axes plus sexual-response axes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AffectState {
    #[serde(default)]
    pub mood: BTreeMap<String, f64>,

    #[serde(default)]
    pub sexual: BTreeMap<String, f64>,
}

/// A full synthetic world sample: current and previous affect plus
/// slow-moving trait axes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldSample {
    pub current: AffectState,
    pub previous: AffectState,

    #[serde(default)]
    pub affect_traits: BTreeMap<String, f64>,
}

/// Flattened axis -> value view of one sample, the shape gates and
/// intensity formulas evaluate against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleContext {
    pub axes: BTreeMap<String, f64>,
}

impl SampleContext {
    /// Value of an axis; unset axes read as `0.0`.
    pub fn value(&self, axis: &str) -> f64 {
        self.axes.get(axis).copied().unwrap_or(0.0)
    }
}

/// Builds evaluation contexts from world samples.
///
/// Current mood, current sexual axes, and traits are merged into one
/// flat map. Later sources win on axis-name collision (traits shadow
/// mood), matching how the authoring data namespaces its axes.
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder;

impl ContextBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Flatten a world sample into the context gates evaluate against.
    pub fn build_context(&self, sample: &WorldSample) -> SampleContext {
        let mut axes = BTreeMap::new();
        for (axis, value) in &sample.current.mood {
            axes.insert(axis.clone(), *value);
        }
        for (axis, value) in &sample.current.sexual {
            axes.insert(axis.clone(), *value);
        }
        for (axis, value) in &sample.affect_traits {
            axes.insert(axis.clone(), *value);
        }
        SampleContext { axes }
    }
}

/// Source of synthetic world samples.
///
/// The behavioral evaluator calls `generate` exactly once per sample.
pub trait StateGenerator {
    fn generate(&mut self) -> WorldSample;
}

/// Uniform sampler over a fixed axis list, seeded for reproducibility.
#[derive(Debug, Clone)]
pub struct UniformStateGenerator {
    axes: Vec<String>,
    rng: StdRng,
}

impl UniformStateGenerator {
    /// Sample the given axes uniformly in `[0, 1]` from a fixed seed.
    pub fn new(axes: Vec<String>, seed: u64) -> Self {
        Self {
            axes,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn draw(&mut self) -> BTreeMap<String, f64> {
        self.axes
            .iter()
            .map(|axis| (axis.clone(), self.rng.gen::<f64>()))
            .collect()
    }
}

impl StateGenerator for UniformStateGenerator {
    fn generate(&mut self) -> WorldSample {
        let previous = AffectState {
            mood: self.draw(),
            sexual: BTreeMap::new(),
        };
        let current = AffectState {
            mood: self.draw(),
            sexual: BTreeMap::new(),
        };
        WorldSample {
            current,
            previous,
            affect_traits: BTreeMap::new(),
        }
    }
}

/// Whether every gate in the list passes against the context.
///
/// An empty gate list is vacuously passing.
pub fn gates_pass(gates: &[Gate], ctx: &SampleContext) -> bool {
    gates.iter().all(|gate| gate.passes(ctx.value(&gate.axis)))
}

/// Prototype intensity against one sample context.
///
/// Magnitude-normalized weighted sum: `sum(w_i * x_i) / sum(|w_i|)`.
/// An empty weight vector yields `0.0`. NaN context values propagate
/// visibly so corrupted data is detectable downstream.
pub fn compute_intensity(prototype: &Prototype, ctx: &SampleContext) -> f64 {
    let magnitude: f64 = prototype.weights.values().map(|w| w.abs()).sum();
    if magnitude == 0.0 {
        return 0.0;
    }
    let weighted: f64 = prototype
        .weights
        .iter()
        .map(|(axis, weight)| weight * ctx.value(axis))
        .sum();
    weighted / magnitude
}
