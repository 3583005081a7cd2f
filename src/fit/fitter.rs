//! Low-level fitting routine for a single decline model.
//!
//! Given observations `(t_i, q_i)` we minimize the log-rate residuals
//!
//! ```text
//! Σ (ln q_i - ln q_model(t_i))²
//! ```
//!
//! over `θ = [ln qi, ln Di]` (plus `b` for the hyperbolic model). Working in
//! log space keeps `qi` and `Di` positive by construction and stops the first
//! few high-rate samples from dominating the objective.
//!
//! The optimizer is a projected Levenberg-Marquardt:
//! - each damped Gauss-Newton step is solved as an augmented linear least-squares
//!   problem (SVD, see `math::ols`)
//! - `b` is clamped to `[min_b, max_b]` after every step
//! - the iteration count is capped, so every call terminates
//!
//! The hyperbolic model is started from several `b` values (see `b_grid`); the
//! starts are independent and evaluated in parallel, then reduced in grid order
//! so the result does not depend on scheduling.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use crate::domain::{FitConfig, FitResult, MIN_FIT_POINTS, ModelKind, TimeSeriesPoint, usable_points};
use crate::error::DeclineError;
use crate::fit::b_grid::b_start_grid;
use crate::math::{linear_fit, solve_least_squares};
use crate::models::{fill_log_gradient, log_rate, params_for};

/// Floor for the initial decline guess (per day) when the early data do not decline.
const MIN_INITIAL_DI: f64 = 1e-5;

/// Bounds on `ln Di` during iteration; keeps `exp` finite on wild steps.
const LN_DI_MIN: f64 = -30.0;
const LN_DI_MAX: f64 = 5.0;

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MAX: f64 = 1e12;

/// Cooperative cancellation flag for long-running fits.
///
/// Cloning shares the flag. The optimizer checks it between iterations, never
/// inside one.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Solver knobs.
#[derive(Debug, Clone)]
pub struct FitOptions {
    /// Hard cap on optimizer iterations per start.
    pub max_iterations: usize,
    /// Relative cost improvement below which a start is considered converged.
    pub tolerance: f64,
    /// Number of hyperbolic `b` starts.
    pub b_grid_steps: usize,
    /// Optional cancellation flag checked between iterations.
    pub cancel: Option<CancelToken>,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-12,
            b_grid_steps: 9,
            cancel: None,
        }
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    idx: usize,
    theta: Vec<f64>,
    cost: f64,
}

/// Fit one model with default solver options.
pub fn fit_decline(
    points: &[TimeSeriesPoint],
    model: ModelKind,
    config: &FitConfig,
) -> Result<FitResult, DeclineError> {
    fit_decline_with(points, model, config, &FitOptions::default())
}

/// Fit one model.
pub fn fit_decline_with(
    points: &[TimeSeriesPoint],
    model: ModelKind,
    config: &FitConfig,
    opts: &FitOptions,
) -> Result<FitResult, DeclineError> {
    config.validate()?;
    let pts = usable_points(points);
    if pts.len() < MIN_FIT_POINTS {
        return Err(DeclineError::InsufficientData {
            found: pts.len(),
            required: MIN_FIT_POINTS,
        });
    }

    let ts: Vec<f64> = pts.iter().map(|p| p.t).collect();
    let ys: Vec<f64> = pts.iter().map(|p| p.q.ln()).collect();

    let (qi0, di0) = initial_guess(&ts, &ys);
    let (b_lo, b_hi) = b_bounds(model, config);

    let starts: Vec<Vec<f64>> = match model {
        ModelKind::Exponential | ModelKind::Harmonic => vec![vec![qi0.ln(), di0.ln()]],
        ModelKind::Hyperbolic => b_start_grid(b_lo, b_hi, opts.b_grid_steps)?
            .into_iter()
            .map(|b| vec![qi0.ln(), di0.ln(), b])
            .collect(),
    };

    // Evaluate each start independently (parallel).
    let outcomes: Vec<Result<Candidate, DeclineError>> = starts
        .par_iter()
        .enumerate()
        .map(|(idx, theta0)| {
            levenberg_marquardt(model, &ts, &ys, theta0, (b_lo, b_hi), opts).map(|(theta, cost)| Candidate {
                idx,
                theta,
                cost,
            })
        })
        .collect();

    let mut candidates = Vec::with_capacity(outcomes.len());
    let mut last_err = None;
    for outcome in outcomes {
        match outcome {
            Ok(c) => candidates.push(c),
            Err(DeclineError::Cancelled) => return Err(DeclineError::Cancelled),
            Err(e) => last_err = Some(e),
        }
    }

    // Deterministic selection: pick the minimum cost; break ties by start index.
    let Some(best) = candidates
        .iter()
        .min_by(|a, b| a.cost.total_cmp(&b.cost).then(a.idx.cmp(&b.idx)))
    else {
        return Err(last_err.unwrap_or_else(|| DeclineError::ConvergenceFailure {
            model,
            reason: "no optimizer start produced a finite objective".to_string(),
        }));
    };

    let b = if model == ModelKind::Hyperbolic {
        best.theta[2].clamp(b_lo, b_hi)
    } else {
        0.0
    };
    let params = params_for(model, best.theta[0].exp(), best.theta[1].exp(), b);
    if !(params.is_finite() && params.qi > 0.0 && params.di > 0.0) {
        return Err(DeclineError::ConvergenceFailure {
            model,
            reason: format!(
                "optimizer returned invalid parameters (qi={}, di={}, b={})",
                params.qi, params.di, params.b
            ),
        });
    }

    let r2 = crate::diagnostics::r_squared(&pts, model, &params);
    tracing::debug!(
        model = %model,
        qi = params.qi,
        di_per_year = params.di_annual(),
        b = params.b,
        r2,
        n = pts.len(),
        "fitted decline model"
    );

    Ok(FitResult { model, params, r2 })
}

fn b_bounds(model: ModelKind, config: &FitConfig) -> (f64, f64) {
    match model {
        ModelKind::Exponential => (0.0, 0.0),
        ModelKind::Harmonic => (1.0, 1.0),
        ModelKind::Hyperbolic => (config.min_b, config.max_b),
    }
}

/// Initial `(qi, Di)` from a log-linear regression over the early segment.
///
/// Near `t = 0` every Arps model satisfies `d ln q / dt = -Di`, so the early
/// slope is a reasonable decline estimate for all three.
fn initial_guess(ts: &[f64], ys: &[f64]) -> (f64, f64) {
    let n = ts.len();
    let early = (n / 2).max(MIN_FIT_POINTS).min(n);

    let line = linear_fit(&ts[..early], &ys[..early]).or_else(|| linear_fit(ts, ys));
    let (qi, di) = match line {
        Some((intercept, slope)) => (intercept.exp(), -slope),
        None => (ys[0].exp(), MIN_INITIAL_DI),
    };

    let qi = if qi.is_finite() && qi > 0.0 { qi } else { ys[0].exp() };
    let di = if di.is_finite() && di > MIN_INITIAL_DI { di } else { MIN_INITIAL_DI };
    (qi, di)
}

fn theta_params(model: ModelKind, theta: &DVector<f64>) -> crate::domain::FittedParams {
    let b = if model == ModelKind::Hyperbolic { theta[2] } else { 0.0 };
    params_for(model, theta[0].exp(), theta[1].exp(), b)
}

fn cost(model: ModelKind, ts: &[f64], ys: &[f64], theta: &DVector<f64>) -> f64 {
    let p = theta_params(model, theta);
    ts.iter()
        .zip(ys.iter())
        .map(|(&t, &y)| {
            let r = y - log_rate(model, t, &p);
            r * r
        })
        .sum()
}

fn project(theta: &mut DVector<f64>, b_bounds: (f64, f64)) {
    theta[1] = theta[1].clamp(LN_DI_MIN, LN_DI_MAX);
    if theta.len() > 2 {
        theta[2] = theta[2].clamp(b_bounds.0, b_bounds.1);
    }
}

fn levenberg_marquardt(
    model: ModelKind,
    ts: &[f64],
    ys: &[f64],
    theta0: &[f64],
    b_bounds: (f64, f64),
    opts: &FitOptions,
) -> Result<(Vec<f64>, f64), DeclineError> {
    let n = ts.len();
    let k = model.param_count();

    let mut theta = DVector::from_column_slice(theta0);
    project(&mut theta, b_bounds);
    let mut current = cost(model, ts, ys, &theta);
    if !current.is_finite() {
        return Err(DeclineError::ConvergenceFailure {
            model,
            reason: "non-finite objective at the initial guess".to_string(),
        });
    }

    let mut lambda = LAMBDA_INIT;
    let mut grad = vec![0.0; k];

    for _ in 0..opts.max_iterations {
        if opts.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
            return Err(DeclineError::Cancelled);
        }

        // Jacobian of the model log-rate and current residuals.
        let p = theta_params(model, &theta);
        let mut jac = DMatrix::<f64>::zeros(n, k);
        let mut resid = DVector::<f64>::zeros(n);
        for i in 0..n {
            fill_log_gradient(model, ts[i], &p, &mut grad);
            for j in 0..k {
                jac[(i, j)] = grad[j];
            }
            resid[i] = ys[i] - log_rate(model, ts[i], &p);
        }

        // Marquardt scaling: damp each direction by its own curvature.
        let scale: Vec<f64> = (0..k).map(|j| jac.column(j).norm().max(1e-12)).collect();

        let mut step = None;
        while lambda <= LAMBDA_MAX {
            let mut aug = DMatrix::<f64>::zeros(n + k, k);
            let mut rhs = DVector::<f64>::zeros(n + k);
            aug.rows_mut(0, n).copy_from(&jac);
            rhs.rows_mut(0, n).copy_from(&resid);
            for j in 0..k {
                aug[(n + j, j)] = lambda.sqrt() * scale[j];
            }

            let Some(delta) = solve_least_squares(&aug, &rhs) else {
                lambda *= 10.0;
                continue;
            };

            let mut trial = &theta + &delta;
            project(&mut trial, b_bounds);
            let trial_cost = cost(model, ts, ys, &trial);
            if trial_cost.is_finite() && trial_cost < current {
                step = Some((trial, trial_cost));
                break;
            }
            lambda *= 10.0;
        }

        let Some((trial, trial_cost)) = step else {
            // No damping level improves the objective: we are at a (projected) minimum.
            break;
        };

        let improvement = current - trial_cost;
        let moved = (&trial - &theta).norm();
        theta = trial;
        current = trial_cost;
        lambda = (lambda / 10.0).max(1e-12);

        if improvement <= opts.tolerance * (current + opts.tolerance) || moved < 1e-14 {
            break;
        }
    }

    if !(current.is_finite() && theta.iter().all(|v| v.is_finite())) {
        return Err(DeclineError::ConvergenceFailure {
            model,
            reason: "optimizer produced non-finite parameters".to_string(),
        });
    }

    Ok((theta.iter().copied().collect(), current))
}
