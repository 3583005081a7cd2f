//! Command-line parsing for the decline-curve tool.
//!
//! Argument parsing and command dispatch stay separate from the fitting and
//! forecasting code. Every flag has a `DCA_*` environment fallback, so
//! defaults can live in a `.env` file.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::domain::{ModelSpec, Stream};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "dca", version, about = "Arps decline-curve fitting and forecasting")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit one well, print diagnostics and a forecast summary, optionally export.
    Fit(FitArgs),
    /// Fit and forecast every well in a file through the batch orchestrator.
    Batch(BatchArgs),
    /// Generate synthetic wells as JSON.
    Sample(SampleArgs),
}

/// Model and forecast options shared by `fit` and `batch`.
#[derive(Debug, Args, Clone)]
pub struct ModelArgs {
    /// Production stream to analyse.
    #[arg(long, value_enum, default_value_t = Stream::Oil, env = "DCA_STREAM")]
    pub stream: Stream,

    /// Which model(s) to fit.
    #[arg(long, value_enum, default_value_t = ModelSpec::Auto, env = "DCA_MODEL")]
    pub model: ModelSpec,

    /// Lower bound of the hyperbolic b-factor.
    #[arg(long, default_value_t = 0.0, env = "DCA_MIN_B")]
    pub min_b: f64,

    /// Upper bound of the hyperbolic b-factor.
    #[arg(long, default_value_t = 1.0, env = "DCA_MAX_B")]
    pub max_b: f64,

    /// First date of the fit window (YYYY-MM-DD).
    #[arg(long, env = "DCA_START_DATE")]
    pub start_date: Option<NaiveDate>,

    /// Last date of the fit window (YYYY-MM-DD).
    #[arg(long, env = "DCA_END_DATE")]
    pub end_date: Option<NaiveDate>,

    /// Rate below which the forecast stops.
    #[arg(long, default_value_t = 5.0, env = "DCA_ECONOMIC_LIMIT")]
    pub economic_limit: f64,

    /// Keep forecasting past the economic limit until the horizon.
    #[arg(long)]
    pub ignore_limit: bool,

    /// Forecast horizon in years.
    #[arg(long, default_value_t = 30.0, env = "DCA_HORIZON_YEARS")]
    pub horizon_years: f64,

    /// Days between forecast points.
    #[arg(long, default_value_t = 30.0, env = "DCA_STEP_DAYS")]
    pub step_days: f64,
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Wells JSON (array) or single-well CSV.
    #[arg(short, long, value_name = "PATH", env = "DCA_INPUT")]
    pub input: PathBuf,

    /// Well id to fit (defaults to the first well in the file).
    #[arg(short, long)]
    pub well: Option<String>,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Print observed vs fitted rates.
    #[arg(long)]
    pub residuals: bool,

    /// Forecast rows to print.
    #[arg(long, default_value_t = 12)]
    pub rows: usize,

    /// Export the forecast to CSV.
    #[arg(long)]
    pub export_forecast: Option<PathBuf>,

    /// Export the scenario (fit, diagnostics, forecast, config) to JSON.
    #[arg(long)]
    pub export_scenario: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct BatchArgs {
    /// Wells JSON (array) or single-well CSV.
    #[arg(short, long, value_name = "PATH", env = "DCA_INPUT")]
    pub input: PathBuf,

    /// Project the scenarios belong to.
    #[arg(long, default_value = "default", env = "DCA_PROJECT")]
    pub project: String,

    /// Directory to write one scenario JSON per well into.
    #[arg(long, value_name = "DIR", env = "DCA_OUT_DIR")]
    pub out_dir: Option<PathBuf>,

    /// Stop the batch at the first failing well.
    #[arg(long)]
    pub halt_on_error: bool,

    #[command(flatten)]
    pub model: ModelArgs,
}

#[derive(Debug, Args, Clone)]
pub struct SampleArgs {
    /// Number of wells.
    #[arg(short = 'n', long, default_value_t = 5)]
    pub wells: usize,

    /// Monthly records per well.
    #[arg(long, default_value_t = 36)]
    pub months: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42, env = "DCA_SEED")]
    pub seed: u64,

    /// Log-normal noise standard deviation.
    #[arg(long, default_value_t = 0.05)]
    pub noise: f64,

    /// Trailing wells given too few records to fit.
    #[arg(long, default_value_t = 0)]
    pub sparse: usize,

    /// Date of the first record.
    #[arg(long, default_value = "2020-01-01")]
    pub start_date: NaiveDate,

    /// Output file (stdout when omitted).
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fit_with_model_flags() {
        let cli = Cli::try_parse_from([
            "dca",
            "fit",
            "-i",
            "wells.json",
            "--well",
            "A-1",
            "--stream",
            "gas",
            "--model",
            "hyperbolic",
            "--max-b",
            "1.5",
            "--start-date",
            "2023-02-01",
        ])
        .unwrap();
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.well.as_deref(), Some("A-1"));
        assert_eq!(args.model.stream, Stream::Gas);
        assert_eq!(args.model.model, ModelSpec::Hyperbolic);
        assert_eq!(args.model.max_b, 1.5);
        assert_eq!(args.model.start_date, NaiveDate::from_ymd_opt(2023, 2, 1));
    }

    #[test]
    fn parses_batch_flags() {
        let cli = Cli::try_parse_from([
            "dca",
            "batch",
            "--input",
            "wells.json",
            "--project",
            "north",
            "--halt-on-error",
            "--ignore-limit",
        ])
        .unwrap();
        let Command::Batch(args) = cli.command else {
            panic!("expected batch");
        };
        assert_eq!(args.project, "north");
        assert!(args.halt_on_error);
        assert!(args.model.ignore_limit);
        assert_eq!(args.model.step_days, 30.0);
    }
}
