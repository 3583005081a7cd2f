//! Synthetic data sources.

pub mod sample;

pub use sample::{SampleConfig, SyntheticWell, generate_wells};
