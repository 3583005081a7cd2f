//! Rate and cumulative evaluation for the Arps decline family.
//!
//! The regression and the forecaster rely on a few primitive operations:
//! - `rate(t)` and its logarithm (residuals are taken on log-rate)
//! - the gradient of `ln q(t)` with respect to the fitted parameters
//! - the closed-form cumulative `Np(t) = ∫₀ᵗ q(s) ds`
//!
//! Numerical notes:
//! - `(1 + x)^p` is evaluated as `exp(p · ln_1p(x))` so short times keep precision.
//! - `1 - exp(y)` is computed as `-exp_m1(y)` to avoid cancellation.
//! - A hyperbolic `b` within `B_EPS` of 0 or 1 falls back to the exponential or
//!   harmonic closed form, which are the analytic limits.

use crate::domain::{FittedParams, ModelKind};

/// Distance from 0 (or 1) below which the hyperbolic form is replaced by its limit.
const B_EPS: f64 = 1e-8;

/// Threshold on `x = b·Di·t` below which the b-derivative uses a series expansion.
const SMALL_X: f64 = 1e-4;

/// Normalize parameters to the invariants of `model` (b = 0 / b = 1).
pub fn params_for(model: ModelKind, qi: f64, di: f64, b: f64) -> FittedParams {
    match model {
        ModelKind::Exponential => FittedParams::new(qi, di, 0.0),
        ModelKind::Harmonic => FittedParams::new(qi, di, 1.0),
        ModelKind::Hyperbolic => FittedParams::new(qi, di, b),
    }
}

/// Production rate `q(t)`.
pub fn rate(model: ModelKind, t: f64, p: &FittedParams) -> f64 {
    let t = t.max(0.0);
    match model {
        ModelKind::Exponential => p.qi * (-p.di * t).exp(),
        ModelKind::Harmonic => p.qi / (1.0 + p.di * t),
        ModelKind::Hyperbolic => {
            if p.b < B_EPS {
                return p.qi * (-p.di * t).exp();
            }
            p.qi * (-(p.b * p.di * t).ln_1p() / p.b).exp()
        }
    }
}

/// `ln q(t)`; used for the regression objective.
pub fn log_rate(model: ModelKind, t: f64, p: &FittedParams) -> f64 {
    let t = t.max(0.0);
    let ln_qi = p.qi.ln();
    match model {
        ModelKind::Exponential => ln_qi - p.di * t,
        ModelKind::Harmonic => ln_qi - (p.di * t).ln_1p(),
        ModelKind::Hyperbolic => {
            if p.b < B_EPS {
                return ln_qi - p.di * t;
            }
            ln_qi - (p.b * p.di * t).ln_1p() / p.b
        }
    }
}

/// Cumulative production from 0 to `t`.
pub fn cumulative(model: ModelKind, t: f64, p: &FittedParams) -> f64 {
    let t = t.max(0.0);
    match model {
        ModelKind::Exponential => exponential_cumulative(t, p),
        ModelKind::Harmonic => harmonic_cumulative(t, p),
        ModelKind::Hyperbolic => {
            if p.b < B_EPS {
                return exponential_cumulative(t, p);
            }
            if (1.0 - p.b).abs() < B_EPS {
                return harmonic_cumulative(t, p);
            }
            let expo = (1.0 - 1.0 / p.b) * (p.b * p.di * t).ln_1p();
            p.qi / (p.di * (1.0 - p.b)) * -expo.exp_m1()
        }
    }
}

fn exponential_cumulative(t: f64, p: &FittedParams) -> f64 {
    p.qi * -(-p.di * t).exp_m1() / p.di
}

fn harmonic_cumulative(t: f64, p: &FittedParams) -> f64 {
    p.qi / p.di * (p.di * t).ln_1p()
}

/// Fill the gradient of `ln q(t)` with respect to the regression parameters.
///
/// Parameter order is `[ln qi, ln Di]`, plus `b` for the hyperbolic model.
///
/// # Panics
/// Panics if `out` is shorter than `model.param_count()`.
pub fn fill_log_gradient(model: ModelKind, t: f64, p: &FittedParams, out: &mut [f64]) {
    let t = t.max(0.0);
    let u = p.di * t;
    out[0] = 1.0;
    match model {
        ModelKind::Exponential => {
            out[1] = -u;
        }
        ModelKind::Harmonic => {
            out[1] = -u / (1.0 + u);
        }
        ModelKind::Hyperbolic => {
            let b = p.b.max(0.0);
            let x = b * u;
            out[1] = -u / (1.0 + x);
            out[2] = if x < SMALL_X {
                // [ln(1+x) - x/(1+x)] / b² ≈ u²/2 - 2bu³/3
                u * u / 2.0 - 2.0 * b * u * u * u / 3.0
            } else {
                (x.ln_1p() - x / (1.0 + x)) / (b * b)
            };
        }
    }
}
