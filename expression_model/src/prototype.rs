//! Prototype definitions - the expression templates under diagnosis.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// An emotion/expression prototype: gate conditions plus an axis-weight
/// vector. Immutable once loaded; the diagnostics engine never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prototype {
    /// Stable identifier, owned by the authoring data.
    pub id: String,

    /// Raw gate expressions, e.g. `"threat <= 0.40"`.
    #[serde(default)]
    pub gates: Vec<String>,

    /// Axis weights. Sign carries direction, magnitude carries strength.
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
}

impl Prototype {
    /// Create a prototype with no gates and no weights.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            gates: Vec::new(),
            weights: BTreeMap::new(),
        }
    }

    /// Add a gate expression.
    pub fn with_gate(mut self, gate: impl Into<String>) -> Self {
        self.gates.push(gate.into());
        self
    }

    /// Set an axis weight.
    pub fn with_weight(mut self, axis: impl Into<String>, weight: f64) -> Self {
        self.weights.insert(axis.into(), weight);
        self
    }

    /// Axes whose weight magnitude exceeds `epsilon`.
    pub fn active_axes(&self, epsilon: f64) -> BTreeSet<&str> {
        self.weights
            .iter()
            .filter(|(_, w)| w.abs() > epsilon)
            .map(|(axis, _)| axis.as_str())
            .collect()
    }

    /// Euclidean magnitude of the weight vector.
    pub fn weight_magnitude(&self) -> f64 {
        self.weights.values().map(|w| w * w).sum::<f64>().sqrt()
    }

    /// Cosine similarity between two weight vectors over the union of
    /// their axes. Zero-magnitude vectors yield `0.0`.
    pub fn weight_cosine(&self, other: &Prototype) -> f64 {
        cosine_similarity(&self.weights, &other.weights)
    }
}

/// Cosine similarity of two sparse axis-keyed vectors.
pub fn cosine_similarity(a: &BTreeMap<String, f64>, b: &BTreeMap<String, f64>) -> f64 {
    let dot: f64 = a
        .iter()
        .filter_map(|(axis, wa)| b.get(axis).map(|wb| wa * wb))
        .sum();
    let mag_a = a.values().map(|w| w * w).sum::<f64>().sqrt();
    let mag_b = b.values().map(|w| w * w).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

/// Errors loading a prototype library from authoring data.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("failed to parse prototype library: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("duplicate prototype id `{0}`")]
    DuplicateId(String),
}

/// A named collection of prototypes, loadable from TOML authoring files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrototypeLibrary {
    /// Library name, e.g. `"emotion"` or `"sexual"`.
    #[serde(default)]
    pub family: String,

    #[serde(default)]
    pub prototypes: Vec<Prototype>,
}

impl PrototypeLibrary {
    /// Parse a library from TOML text and reject duplicate ids.
    pub fn from_toml_str(text: &str) -> Result<Self, LibraryError> {
        let library: PrototypeLibrary = toml::from_str(text)?;

        let mut seen = BTreeSet::new();
        for prototype in &library.prototypes {
            if !seen.insert(prototype.id.as_str()) {
                return Err(LibraryError::DuplicateId(prototype.id.clone()));
            }
        }

        Ok(library)
    }

    /// Look up a prototype by id.
    pub fn get(&self, id: &str) -> Option<&Prototype> {
        self.prototypes.iter().find(|p| p.id == id)
    }

    /// Number of prototypes in the library.
    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    /// Whether the library holds no prototypes.
    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }

    /// Union of all axes referenced by any weight vector.
    pub fn all_axes(&self) -> BTreeSet<&str> {
        self.prototypes
            .iter()
            .flat_map(|p| p.weights.keys().map(String::as_str))
            .collect()
    }
}
