//! Reporting: batch aggregates and formatted terminal output.

pub mod format;

pub use format::*;

use crate::app::pipeline::WellOutcome;
use crate::batch::BatchStatus;
use crate::domain::ModelKind;

/// Aggregate numbers for a batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchTotals {
    pub succeeded: usize,
    pub failed: usize,
    pub not_processed: usize,
    /// Sum of per-well EUR over successful wells.
    pub total_eur: f64,
    /// Chosen-model counts in `ModelKind::SELECTION_ORDER`.
    pub by_model: [(ModelKind, usize); 3],
}

pub fn batch_totals(status: &BatchStatus<WellOutcome>) -> BatchTotals {
    let mut by_model = ModelKind::SELECTION_ORDER.map(|k| (k, 0usize));
    let mut total_eur = 0.0;
    for r in &status.results {
        let model = r.data.scenario.results.model;
        if let Some(slot) = by_model.iter_mut().find(|(k, _)| *k == model) {
            slot.1 += 1;
        }
        total_eur += r.data.summary.as_ref().map_or(r.data.series.start_cumulative, |s| s.eur);
    }
    BatchTotals {
        succeeded: status.results.len(),
        failed: status.errors.len(),
        not_processed: status.pending.len(),
        total_eur,
        by_model,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::app::pipeline::{RunConfig, run_batch};
    use crate::data::{SampleConfig, generate_wells};
    use crate::domain::{FitConfig, ForecastConfig, ScenarioConfig, Stream};
    use crate::io::MemorySink;

    #[test]
    fn totals_and_summary_cover_successes_and_failures() {
        let wells = generate_wells(&SampleConfig {
            wells: 3,
            sparse_wells: 1,
            months: 18,
            ..SampleConfig::default()
        })
        .unwrap()
        .into_iter()
        .map(|s| s.well)
        .collect();
        let config = RunConfig {
            project_id: "p".into(),
            scenario: ScenarioConfig {
                stream: Stream::Oil,
                fit: FitConfig::default(),
                forecast: ForecastConfig::default(),
            },
            continue_on_error: true,
        };
        let status = run_batch(wells, &config, Arc::new(MemorySink::new())).unwrap();

        let totals = batch_totals(&status);
        assert_eq!(totals.succeeded, 2);
        assert_eq!(totals.failed, 1);
        assert_eq!(totals.by_model.iter().map(|(_, n)| n).sum::<usize>(), 2);
        assert!(totals.total_eur > 0.0);

        let text = format_batch_summary(&status);
        assert!(text.contains("succeeded 2 | failed 1"));
        assert!(text.contains("W-003: task 'W-003' failed: insufficient data"));

        let single = format_fit_summary(&status.results[0].data);
        assert!(single.contains("Well: Synthetic W-001 (W-001)"));
        assert!(single.contains("EUR="));
    }
}
