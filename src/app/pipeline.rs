//! Shared per-well pipeline used by both `dca fit` and `dca batch`.
//!
//! series prep -> fit/selection -> diagnostics -> forecast -> scenario
//!
//! The batch command wraps the same function in orchestrator tasks, so a
//! single well and a whole project go through identical steps.

use std::sync::Arc;

use crate::batch::{BatchOrchestrator, BatchStatus, Task};
use crate::diagnostics::calculate_diagnostics;
use crate::domain::{Scenario, ScenarioConfig, TimeSeriesPoint, Well, usable_points};
use crate::error::DeclineError;
use crate::fit::{FitOptions, FitSelection, fit_configured};
use crate::forecast::{ForecastSummary, generate_forecast, summarize};
use crate::io::{ScenarioSink, WellSeries, prepare_series};

/// Everything needed to process a set of wells.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub project_id: String,
    pub scenario: ScenarioConfig,
    /// When false, the first failing well halts the batch.
    pub continue_on_error: bool,
}

/// All computed outputs for one well.
#[derive(Debug, Clone)]
pub struct WellOutcome {
    pub well_name: String,
    pub series: WellSeries,
    pub selection: FitSelection,
    pub summary: Option<ForecastSummary>,
    pub scenario: Scenario,
}

impl WellOutcome {
    pub fn well_id(&self) -> &str {
        &self.scenario.well_id
    }
}

/// Fit, diagnose and forecast one well.
pub fn run_well(well: &Well, config: &ScenarioConfig, opts: &FitOptions) -> Result<WellOutcome, DeclineError> {
    config.forecast.validate()?;

    let series = prepare_series(well, config.stream, &config.fit);
    let points: Vec<TimeSeriesPoint> = usable_points(&series.points);
    tracing::debug!(
        well = %well.id,
        stream = config.stream.display_name(),
        records = series.points.len(),
        usable = points.len(),
        "series prepared"
    );

    let selection = fit_configured(&points, &config.fit, opts)?;
    let best = &selection.best;
    let diagnostics = calculate_diagnostics(&points, best.model, &best.params);

    let forecast = generate_forecast(
        &best.params,
        best.model,
        series.start_cumulative,
        series.start_t,
        &config.forecast,
    )?;
    let summary = summarize(&forecast, series.start_cumulative, &config.forecast);

    tracing::info!(
        well = %well.id,
        model = %best.model,
        r2 = best.r2,
        eur = summary.as_ref().map_or(series.start_cumulative, |s| s.eur),
        "well fitted"
    );

    let scenario = Scenario {
        name: format!("{} {} {}", well.name, config.stream.display_name(), best.model.display_name()),
        well_id: well.id.clone(),
        results: best.clone(),
        diagnostics,
        forecast,
        config: config.clone(),
    };

    Ok(WellOutcome {
        well_name: well.name.clone(),
        series,
        selection,
        summary,
        scenario,
    })
}

/// One orchestrator task per well; each successful task also hands its
/// scenario to `sink`.
pub fn build_well_tasks(
    wells: Vec<Well>,
    config: &RunConfig,
    sink: Arc<dyn ScenarioSink>,
) -> Vec<Task<WellOutcome>> {
    wells
        .into_iter()
        .map(|well| {
            let scenario_config = config.scenario.clone();
            let project_id = config.project_id.clone();
            let sink = Arc::clone(&sink);
            let description = format!("Fitting {} ({})", well.name, well.id);
            Task::new(well.id.clone(), description, move || {
                let outcome = run_well(&well, &scenario_config, &FitOptions::default())?;
                sink.add_scenario(&project_id, outcome.scenario.clone())?;
                Ok(outcome)
            })
            .with_continue_on_error(config.continue_on_error)
        })
        .collect()
}

/// Run every well through the orchestrator on the calling thread.
///
/// A `tracing` subscriber reports progress as tasks finish.
pub fn run_batch(
    wells: Vec<Well>,
    config: &RunConfig,
    sink: Arc<dyn ScenarioSink>,
) -> Result<BatchStatus<WellOutcome>, DeclineError> {
    let orchestrator = BatchOrchestrator::new();
    orchestrator.subscribe(log_progress());
    orchestrator.add_to_queue(build_well_tasks(wells, config, sink))?;
    orchestrator.start()
}

fn log_progress() -> impl Fn(&BatchStatus<WellOutcome>) + Send + Sync + 'static {
    let last = std::sync::atomic::AtomicUsize::new(0);
    move |status| {
        let seen = last.swap(status.processed, std::sync::atomic::Ordering::Relaxed);
        if status.processed > seen {
            tracing::info!(
                processed = status.processed,
                total = status.total,
                failed = status.errors.len(),
                "progress {:.0}%",
                status.progress
            );
        } else if !status.current_task.is_empty() {
            tracing::debug!(task = %status.current_task, "starting");
        }
    }
}
