//! Rate and cumulative forecasting from a fitted decline model.
//!
//! The forecast is a finite, freshly computed sequence: every call starts from
//! the given `(start_t, start_cumulative)` state and steps forward at a fixed
//! cadence of `step_days`. Points are emitted at
//! `start_t + k·step_days` for `k = 1, 2, ...`.
//!
//! Cumulative volume uses the closed-form integral of the model
//! (`Np(t) - Np(start_t)`), not a running sum, so long horizons do not drift.
//!
//! Stop rules, checked in this order at every step:
//! 1. `stop_at_limit` and `q < economic_limit`: the point is kept as the
//!    terminal point.
//! 2. `t - start_t > max_duration`: the point is dropped.

use serde::Serialize;

use crate::domain::{FittedParams, ForecastConfig, ForecastPoint, ModelKind};
use crate::error::DeclineError;
use crate::models::{cumulative, rate};

/// Upper bound on emitted points per forecast.
pub const MAX_FORECAST_STEPS: usize = 100_000;

/// Why a forecast ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EconomicLimit,
    MaxDuration,
}

/// Headline numbers for a forecast.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastSummary {
    /// Estimated ultimate recovery: cumulative at the last forecast point.
    pub eur: f64,
    /// Volume produced over the forecast window.
    pub remaining: f64,
    pub end_t: f64,
    pub end_rate: f64,
    pub stop: StopReason,
}

impl ForecastConfig {
    pub fn validate(&self) -> Result<(), DeclineError> {
        if !(self.max_duration.is_finite() && self.max_duration > 0.0) {
            return Err(DeclineError::invalid_config(format!(
                "max_duration must be > 0 (got {})",
                self.max_duration
            )));
        }
        if !(self.step_days.is_finite() && self.step_days > 0.0) {
            return Err(DeclineError::invalid_config(format!(
                "step_days must be > 0 (got {})",
                self.step_days
            )));
        }
        if !(self.economic_limit.is_finite() && self.economic_limit >= 0.0) {
            return Err(DeclineError::invalid_config(format!(
                "economic_limit must be >= 0 (got {})",
                self.economic_limit
            )));
        }
        let steps = (self.max_duration / self.step_days).ceil();
        if steps > MAX_FORECAST_STEPS as f64 {
            return Err(DeclineError::invalid_config(format!(
                "forecast would need {steps} steps (max {MAX_FORECAST_STEPS}); increase step_days"
            )));
        }
        Ok(())
    }
}

/// Project a fitted model forward from `start_t`.
pub fn generate_forecast(
    params: &FittedParams,
    model: ModelKind,
    start_cumulative: f64,
    start_t: f64,
    config: &ForecastConfig,
) -> Result<Vec<ForecastPoint>, DeclineError> {
    config.validate()?;
    if !(params.is_finite() && params.qi > 0.0 && params.di > 0.0) {
        return Err(DeclineError::invalid_config(
            "forecast requires finite parameters with qi > 0 and di > 0",
        ));
    }
    if !(start_t.is_finite() && start_t >= 0.0 && start_cumulative.is_finite()) {
        return Err(DeclineError::invalid_config("forecast start state must be finite with t >= 0"));
    }

    let np_start = cumulative(model, start_t, params);
    let mut out = Vec::new();

    // One step past the horizon is always evaluated so the duration rule can fire.
    for k in 1..=MAX_FORECAST_STEPS + 1 {
        let t = start_t + k as f64 * config.step_days;
        let q = rate(model, t, params);
        let point = ForecastPoint {
            t,
            q,
            cumulative: start_cumulative + cumulative(model, t, params) - np_start,
        };

        if config.stop_at_limit && q < config.economic_limit {
            out.push(point);
            break;
        }
        if t - start_t > config.max_duration {
            break;
        }
        out.push(point);
    }

    Ok(out)
}

/// Summarize a forecast produced by `generate_forecast`.
///
/// Returns `None` for an empty forecast.
pub fn summarize(points: &[ForecastPoint], start_cumulative: f64, config: &ForecastConfig) -> Option<ForecastSummary> {
    let last = points.last()?;
    let stop = if config.stop_at_limit && last.q < config.economic_limit {
        StopReason::EconomicLimit
    } else {
        StopReason::MaxDuration
    };
    Some(ForecastSummary {
        eur: last.cumulative,
        remaining: last.cumulative - start_cumulative,
        end_t: last.t,
        end_rate: last.q,
        stop,
    })
}
