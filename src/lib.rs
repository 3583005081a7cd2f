//! `decline-curves` library crate.
//!
//! The binary (`dca`) is a thin wrapper around this library so that:
//!
//! - fitting, forecasting and batching are testable without spawning processes
//! - the engine can be embedded by other front-ends

pub mod app;
pub mod batch;
pub mod cli;
pub mod data;
pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod fit;
pub mod forecast;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
