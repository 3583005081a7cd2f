//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - configuration enums (`Stream`, `ModelSpec`, `ModelKind`)
//! - observation points and well records (`TimeSeriesPoint`, `Well`)
//! - fit, diagnostic and forecast outputs (`FitResult`, `Diagnostics`, `ForecastPoint`)

pub mod types;

pub use types::*;
