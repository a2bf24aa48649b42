//! # Expression Model
//!
//! The "Expression Bible" crate - prototypes, gate expressions, axis
//! intervals, and sampling primitives. This crate is the single source of
//! truth for the data contracts and does not contain any diagnostics logic.

pub mod constraint;
pub mod gate;
pub mod interval;
pub mod prototype;
pub mod sampling;

pub use constraint::*;
pub use gate::*;
pub use interval::*;
pub use prototype::*;
pub use sampling::*;
