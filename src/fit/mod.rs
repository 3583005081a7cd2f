//! Decline curve fitting.
//!
//! Responsibilities:
//!
//! - generate hyperbolic b start grids
//! - fit a single model with a bounded Levenberg-Marquardt (parallel starts)
//! - select the best model by R² with a simplicity tie-break

pub mod b_grid;
pub mod fitter;
pub mod selection;

pub use b_grid::*;
pub use fitter::*;
pub use selection::*;
