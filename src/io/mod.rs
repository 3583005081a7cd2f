//! Input/output helpers.
//!
//! - well ingest (JSON/CSV) and series preparation (`ingest`)
//! - scenario sinks and CSV/JSON exports (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
