//! # Overlap Diagnostics (The Lens)
//!
//! The analytical engine over `expression_model`: compares prototype
//! pairs, classifies their relationship, and mines the whole library
//! for missing axes.
//!
//! ## Core Components
//!
//! - **implication**: Deterministic gate-interval implication algebra
//! - **similarity / behavior / classifier**: The pairwise pipeline, from
//!   static weight metrics through sampled behavior to a classification
//! - **banding / recommendation**: Concrete gate adjustments and the
//!   final per-pair recommendation
//! - **axis_extraction / axis_validation / report**: Library-wide
//!   axis-gap mining and the synthesized report
//!
//! ## Design Philosophy
//!
//! - **Evidence-Driven**: Every verdict carries the intervals, rates, and
//!   examples that produced it
//! - **Degrade, Don't Abort**: One unparseable gate or bad candidate never
//!   fails a whole analysis run
//! - **Deterministic**: Identical inputs yield identical outputs; sampling
//!   is seeded by the caller

pub mod axis_extraction;
pub mod axis_validation;
pub mod banding;
pub mod behavior;
pub mod classifier;
pub mod error;
pub mod implication;
pub mod recommendation;
pub mod report;
pub mod signals;
pub mod similarity;

pub use axis_extraction::*;
pub use axis_validation::*;
pub use banding::*;
pub use behavior::*;
pub use classifier::*;
pub use error::*;
pub use implication::*;
pub use recommendation::*;
pub use report::*;
pub use signals::*;
pub use similarity::*;
