//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting and forecasting
//! - exported to JSON/CSV as scenarios
//! - handed to an external scenario store unchanged

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::DeclineError;

/// Days per year used to convert between daily and annual nominal decline.
pub const DAYS_PER_YEAR: f64 = 365.25;

/// Minimum number of usable points required for a fit.
pub const MIN_FIT_POINTS: usize = 5;

/// Which production stream to analyse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    Oil,
    Gas,
    Water,
}

impl Stream {
    pub fn display_name(self) -> &'static str {
        match self {
            Stream::Oil => "oil",
            Stream::Gas => "gas",
            Stream::Water => "water",
        }
    }
}

/// Which model(s) to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelSpec {
    Auto,
    Exponential,
    Hyperbolic,
    Harmonic,
}

impl ModelSpec {
    /// The concrete model, or `None` for automatic selection.
    pub fn to_kind(self) -> Option<ModelKind> {
        match self {
            ModelSpec::Auto => None,
            ModelSpec::Exponential => Some(ModelKind::Exponential),
            ModelSpec::Hyperbolic => Some(ModelKind::Hyperbolic),
            ModelSpec::Harmonic => Some(ModelKind::Harmonic),
        }
    }
}

/// Concrete Arps decline model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Exponential,
    Hyperbolic,
    Harmonic,
}

impl ModelKind {
    /// Preference order when two fits are equally good (simplest first).
    pub const SELECTION_ORDER: [ModelKind; 3] =
        [ModelKind::Exponential, ModelKind::Harmonic, ModelKind::Hyperbolic];

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Exponential => "Exponential",
            ModelKind::Hyperbolic => "Hyperbolic",
            ModelKind::Harmonic => "Harmonic",
        }
    }

    /// Number of free parameters estimated by the regression.
    pub fn param_count(self) -> usize {
        match self {
            ModelKind::Exponential | ModelKind::Harmonic => 2,
            ModelKind::Hyperbolic => 3,
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A single rate observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    /// Days since the first sample of the fit window.
    pub t: f64,
    /// Production rate.
    pub q: f64,
}

impl TimeSeriesPoint {
    pub fn new(t: f64, q: f64) -> Self {
        Self { t, q }
    }

    /// Usable for fitting: finite, non-negative time and strictly positive rate.
    pub fn is_usable(&self) -> bool {
        self.t.is_finite() && self.t >= 0.0 && self.q.is_finite() && self.q > 0.0
    }
}

/// Drop unusable points and sort ascending by `t`.
pub fn usable_points(points: &[TimeSeriesPoint]) -> Vec<TimeSeriesPoint> {
    let mut out: Vec<TimeSeriesPoint> = points.iter().copied().filter(|p| p.is_usable()).collect();
    out.sort_by(|a, b| a.t.partial_cmp(&b.t).unwrap_or(std::cmp::Ordering::Equal));
    out
}

/// Regression configuration for one fit invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitConfig {
    pub model: ModelSpec,
    /// Lower bound of the hyperbolic b-factor.
    pub min_b: f64,
    /// Upper bound of the hyperbolic b-factor.
    pub max_b: f64,
    /// Optional fit window start (inclusive).
    pub start_date: Option<NaiveDate>,
    /// Optional fit window end (inclusive).
    pub end_date: Option<NaiveDate>,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            model: ModelSpec::Auto,
            min_b: 0.0,
            max_b: 1.0,
            start_date: None,
            end_date: None,
        }
    }
}

impl FitConfig {
    pub fn validate(&self) -> Result<(), DeclineError> {
        if !(self.min_b.is_finite() && self.max_b.is_finite()) {
            return Err(DeclineError::invalid_config("b bounds must be finite"));
        }
        if self.min_b < 0.0 {
            return Err(DeclineError::invalid_config(format!(
                "min_b must be >= 0 (got {})",
                self.min_b
            )));
        }
        if self.min_b > self.max_b {
            return Err(DeclineError::invalid_config(format!(
                "min_b ({}) must not exceed max_b ({})",
                self.min_b, self.max_b
            )));
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(DeclineError::invalid_config(format!(
                    "start_date {start} is after end_date {end}"
                )));
            }
        }
        Ok(())
    }

    /// True when the b interval admits a genuine hyperbolic fit.
    pub fn has_hyperbolic_range(&self) -> bool {
        self.max_b > self.min_b
    }
}

/// Fitted Arps parameters.
///
/// `di` is the nominal decline rate per day, matching `t` in days.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FittedParams {
    pub qi: f64,
    pub di: f64,
    pub b: f64,
}

impl FittedParams {
    pub fn new(qi: f64, di: f64, b: f64) -> Self {
        Self { qi, di, b }
    }

    /// Build parameters from an annual nominal decline rate.
    pub fn from_annual(qi: f64, di_per_year: f64, b: f64) -> Self {
        Self {
            qi,
            di: di_per_year / DAYS_PER_YEAR,
            b,
        }
    }

    /// Nominal decline rate per year.
    pub fn di_annual(&self) -> f64 {
        self.di * DAYS_PER_YEAR
    }

    pub fn is_finite(&self) -> bool {
        self.qi.is_finite() && self.di.is_finite() && self.b.is_finite()
    }
}

/// Fit output for a single model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub model: ModelKind,
    pub params: FittedParams,
    /// Coefficient of determination on rates; may be negative.
    pub r2: f64,
}

/// Display grade for a fit's R².
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLabel {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl QualityLabel {
    pub fn display_name(self) -> &'static str {
        match self {
            QualityLabel::Excellent => "Excellent",
            QualityLabel::Good => "Good",
            QualityLabel::Fair => "Fair",
            QualityLabel::Poor => "Poor",
        }
    }
}

/// Fit quality diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub r2: f64,
    pub quality: QualityLabel,
    pub sse: f64,
    pub rmse: f64,
    pub n: usize,
}

/// Forecast stopping rules and cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    pub stop_at_limit: bool,
    /// Rate below which production is uneconomic.
    pub economic_limit: f64,
    /// Forecast horizon in days after the start time.
    pub max_duration: f64,
    /// Spacing between forecast points in days.
    pub step_days: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            stop_at_limit: true,
            economic_limit: 5.0,
            max_duration: 30.0 * DAYS_PER_YEAR,
            step_days: 30.0,
        }
    }
}

/// One forecast sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub t: f64,
    pub q: f64,
    pub cumulative: f64,
}

/// One dated production record as delivered by the project data store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionRecord {
    pub date: NaiveDate,
    #[serde(default)]
    pub oil_rate: Option<f64>,
    #[serde(default)]
    pub gas_rate: Option<f64>,
    #[serde(default)]
    pub water_rate: Option<f64>,
    #[serde(default)]
    pub cumulative_oil: Option<f64>,
    #[serde(default)]
    pub cumulative_gas: Option<f64>,
    #[serde(default)]
    pub cumulative_water: Option<f64>,
}

impl ProductionRecord {
    pub fn rate(&self, stream: Stream) -> Option<f64> {
        match stream {
            Stream::Oil => self.oil_rate,
            Stream::Gas => self.gas_rate,
            Stream::Water => self.water_rate,
        }
    }

    pub fn cumulative(&self, stream: Stream) -> Option<f64> {
        match stream {
            Stream::Oil => self.cumulative_oil,
            Stream::Gas => self.cumulative_gas,
            Stream::Water => self.cumulative_water,
        }
    }
}

/// A well with its production history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Well {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub data: Vec<ProductionRecord>,
}

/// Configuration recorded alongside a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub stream: Stream,
    pub fit: FitConfig,
    pub forecast: ForecastConfig,
}

/// A fitted-and-forecast well, ready for the external scenario store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub well_id: String,
    pub results: FitResult,
    pub diagnostics: Diagnostics,
    pub forecast: Vec<ForecastPoint>,
    pub config: ScenarioConfig,
}
