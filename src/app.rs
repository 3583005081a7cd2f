//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the real entry point that:
//! - loads `.env` and initialises logging
//! - parses CLI arguments
//! - runs the per-well pipeline or the batch orchestrator
//! - prints reports and writes optional exports

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::cli::{BatchArgs, Command, FitArgs, ModelArgs, SampleArgs};
use crate::data::{SampleConfig, generate_wells};
use crate::domain::{DAYS_PER_YEAR, FitConfig, ForecastConfig, ScenarioConfig, Well};
use crate::error::{AppError, DeclineError};
use crate::fit::FitOptions;
use crate::io::{JsonDirSink, MemorySink, ScenarioSink, load_wells, write_forecast_csv, write_scenario_json};

pub mod pipeline;

use pipeline::RunConfig;

/// Default log filter when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "decline_curves=info";

/// Entry point for the `dca` binary.
pub fn run() -> Result<(), AppError> {
    // A missing .env is normal.
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = crate::cli::Cli::parse();
    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Batch(args) => handle_batch(args),
        Command::Sample(args) => handle_sample(args),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    // Logs go to stderr; stdout carries reports and sample JSON.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = scenario_config_from_args(&args.model)?;
    let wells = load_wells(&args.input)?;
    let well = select_well(&wells, args.well.as_deref())?;

    let outcome = pipeline::run_well(well, &config, &FitOptions::default())?;

    println!("{}", crate::report::format_fit_summary(&outcome));
    println!(
        "{}",
        crate::report::format_forecast_table(&outcome.scenario.forecast, outcome.series.first_date, args.rows)
    );

    if args.residuals {
        let points = crate::domain::usable_points(&outcome.series.points);
        let best = &outcome.selection.best;
        let rows = crate::diagnostics::residuals(&points, best.model, &best.params);
        println!("{}", crate::report::format_residuals(&rows));
    }

    if let Some(path) = &args.export_forecast {
        write_forecast_csv(path, &outcome.scenario.forecast, outcome.series.first_date)?;
        tracing::info!(path = %path.display(), "forecast exported");
    }
    if let Some(path) = &args.export_scenario {
        write_scenario_json(path, &outcome.scenario)?;
        tracing::info!(path = %path.display(), "scenario exported");
    }

    Ok(())
}

fn handle_batch(args: BatchArgs) -> Result<(), AppError> {
    let config = run_config_from_args(&args)?;
    let wells = load_wells(&args.input)?;
    if wells.is_empty() {
        return Err(AppError::new(3, format!("No wells found in '{}'.", args.input.display())));
    }

    let sink: Arc<dyn ScenarioSink> = match &args.out_dir {
        Some(dir) => Arc::new(JsonDirSink::new(dir)),
        None => Arc::new(MemorySink::new()),
    };

    let status = pipeline::run_batch(wells, &config, sink)?;
    println!("{}", crate::report::format_batch_summary(&status));

    if status.errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::new(
            5,
            format!("{} of {} well(s) failed.", status.errors.len(), status.total),
        ))
    }
}

fn handle_sample(args: SampleArgs) -> Result<(), AppError> {
    let config = sample_config_from_args(&args);
    let wells: Vec<Well> = generate_wells(&config)?.into_iter().map(|s| s.well).collect();

    match &args.output {
        Some(path) => {
            write_wells_json(path, &wells)?;
            tracing::info!(wells = wells.len(), path = %path.display(), "sample written");
        }
        None => {
            let json = serde_json::to_string_pretty(&wells)
                .map_err(|e| AppError::new(2, format!("Failed to serialize wells: {e}")))?;
            println!("{json}");
        }
    }
    Ok(())
}

fn select_well<'a>(wells: &'a [Well], id: Option<&str>) -> Result<&'a Well, AppError> {
    match id {
        Some(id) => wells
            .iter()
            .find(|w| w.id == id)
            .ok_or_else(|| AppError::new(2, format!("Well '{id}' not found."))),
        None => wells
            .first()
            .ok_or_else(|| AppError::new(3, "Input contains no wells.")),
    }
}

fn write_wells_json(path: &Path, wells: &[Well]) -> Result<(), DeclineError> {
    let file = std::fs::File::create(path)
        .map_err(|e| DeclineError::data_access(format!("failed to create '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, wells)
        .map_err(|e| DeclineError::data_access(format!("failed to write wells JSON: {e}")))
}

pub fn fit_config_from_args(args: &ModelArgs) -> FitConfig {
    FitConfig {
        model: args.model,
        min_b: args.min_b,
        max_b: args.max_b,
        start_date: args.start_date,
        end_date: args.end_date,
    }
}

pub fn forecast_config_from_args(args: &ModelArgs) -> ForecastConfig {
    ForecastConfig {
        stop_at_limit: !args.ignore_limit,
        economic_limit: args.economic_limit,
        max_duration: args.horizon_years * DAYS_PER_YEAR,
        step_days: args.step_days,
    }
}

/// Fit + forecast config, validated up front so bad flags fail before any I/O.
pub fn scenario_config_from_args(args: &ModelArgs) -> Result<ScenarioConfig, DeclineError> {
    let config = ScenarioConfig {
        stream: args.stream,
        fit: fit_config_from_args(args),
        forecast: forecast_config_from_args(args),
    };
    config.fit.validate()?;
    config.forecast.validate()?;
    Ok(config)
}

pub fn run_config_from_args(args: &BatchArgs) -> Result<RunConfig, DeclineError> {
    Ok(RunConfig {
        project_id: args.project.clone(),
        scenario: scenario_config_from_args(&args.model)?,
        continue_on_error: !args.halt_on_error,
    })
}

pub fn sample_config_from_args(args: &SampleArgs) -> SampleConfig {
    SampleConfig {
        wells: args.wells,
        months: args.months,
        seed: args.seed,
        noise_sigma: args.noise,
        start_date: args.start_date,
        sparse_wells: args.sparse,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::domain::{ModelSpec, Stream};

    fn parse(args: &[&str]) -> Command {
        Cli::try_parse_from(args).unwrap().command
    }

    #[test]
    fn model_args_map_to_configs() {
        let Command::Fit(args) = parse(&[
            "dca",
            "fit",
            "-i",
            "w.json",
            "--stream",
            "water",
            "--model",
            "exponential",
            "--economic-limit",
            "2.5",
            "--horizon-years",
            "10",
            "--ignore-limit",
        ]) else {
            panic!("expected fit");
        };
        let config = scenario_config_from_args(&args.model).unwrap();
        assert_eq!(config.stream, Stream::Water);
        assert_eq!(config.fit.model, ModelSpec::Exponential);
        assert!(!config.forecast.stop_at_limit);
        assert_eq!(config.forecast.economic_limit, 2.5);
        assert!((config.forecast.max_duration - 3652.5).abs() < 1e-9);
    }

    #[test]
    fn invalid_b_bounds_are_rejected_before_io() {
        let Command::Batch(args) = parse(&["dca", "batch", "-i", "missing.json", "--min-b", "0.9", "--max-b", "0.1"])
        else {
            panic!("expected batch");
        };
        let err = run_config_from_args(&args).unwrap_err();
        assert!(matches!(err, DeclineError::InvalidConfig(_)));
        assert_eq!(AppError::from(err).exit_code(), 2);
    }

    #[test]
    fn batch_args_map_to_run_config() {
        let Command::Batch(args) = parse(&["dca", "batch", "-i", "w.json", "--project", "p9", "--halt-on-error"])
        else {
            panic!("expected batch");
        };
        let config = run_config_from_args(&args).unwrap();
        assert_eq!(config.project_id, "p9");
        assert!(!config.continue_on_error);
    }

    #[test]
    fn select_well_by_id_or_first() {
        let wells = vec![
            Well {
                id: "a".into(),
                name: "A".into(),
                data: Vec::new(),
            },
            Well {
                id: "b".into(),
                name: "B".into(),
                data: Vec::new(),
            },
        ];
        assert_eq!(select_well(&wells, None).unwrap().id, "a");
        assert_eq!(select_well(&wells, Some("b")).unwrap().id, "b");
        assert_eq!(select_well(&wells, Some("z")).unwrap_err().exit_code(), 2);
        assert_eq!(select_well(&[], None).unwrap_err().exit_code(), 3);
    }

    #[test]
    fn sample_command_round_trips_through_ingest() {
        let Command::Sample(args) = parse(&["dca", "sample", "-n", "2", "--months", "12", "--seed", "3"]) else {
            panic!("expected sample");
        };
        let wells: Vec<Well> = generate_wells(&sample_config_from_args(&args))
            .unwrap()
            .into_iter()
            .map(|s| s.well)
            .collect();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wells.json");
        write_wells_json(&path, &wells).unwrap();
        let back = load_wells(&path).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0].id, wells[0].id);
        assert_eq!(back[0].data.len(), 12);
    }
}
