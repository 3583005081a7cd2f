//! Arps decline model implementations.
//!
//! Models are implemented as small, pure functions over a closed `ModelKind`
//! enum so that fitting and forecasting code can stay generic.

pub mod model;

pub use model::*;
