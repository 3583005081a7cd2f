//! Model selection (Exponential vs Harmonic vs Hyperbolic) by R².
//!
//! The tool fits each candidate model and keeps the one with the highest R².
//!
//! Selection rules:
//! 1. Hyperbolic is only attempted when `min_b < max_b`.
//! 2. A model whose optimizer fails to converge is skipped, not fatal.
//! 3. Fits whose R² is within `R2_TIE_EPS` of the best resolve to the simpler
//!    model, in the order Exponential, Harmonic, Hyperbolic.

use crate::domain::{FitConfig, FitResult, MIN_FIT_POINTS, ModelKind, TimeSeriesPoint, usable_points};
use crate::error::DeclineError;
use crate::fit::fitter::{FitOptions, fit_decline_with};

/// R² differences at or below this are treated as ties.
pub const R2_TIE_EPS: f64 = 1e-6;

/// Output of fitting + selection.
#[derive(Debug, Clone)]
pub struct FitSelection {
    pub best: FitResult,
    /// Fits for all attempted models.
    pub fits: Vec<FitResult>,
    /// Any models that were skipped and why (for diagnostics).
    pub skipped: Vec<(ModelKind, String)>,
}

/// Fit every candidate model and return the best one.
pub fn auto_fit(points: &[TimeSeriesPoint], config: &FitConfig) -> Result<FitResult, DeclineError> {
    fit_and_select(points, config, &FitOptions::default()).map(|s| s.best)
}

/// Fit according to `config.model`: a single model, or all of them for `Auto`.
pub fn fit_configured(
    points: &[TimeSeriesPoint],
    config: &FitConfig,
    opts: &FitOptions,
) -> Result<FitSelection, DeclineError> {
    match config.model.to_kind() {
        Some(kind) => {
            let fit = fit_decline_with(points, kind, config, opts)?;
            Ok(FitSelection {
                best: fit.clone(),
                fits: vec![fit],
                skipped: Vec::new(),
            })
        }
        None => fit_and_select(points, config, opts),
    }
}

/// Fit Exponential, Harmonic and (when the b interval allows) Hyperbolic.
pub fn fit_and_select(
    points: &[TimeSeriesPoint],
    config: &FitConfig,
    opts: &FitOptions,
) -> Result<FitSelection, DeclineError> {
    config.validate()?;
    let usable = usable_points(points).len();
    if usable < MIN_FIT_POINTS {
        return Err(DeclineError::InsufficientData {
            found: usable,
            required: MIN_FIT_POINTS,
        });
    }

    let mut fits = Vec::new();
    let mut skipped = Vec::new();
    let mut last_err = None;

    for kind in ModelKind::SELECTION_ORDER {
        if kind == ModelKind::Hyperbolic && !config.has_hyperbolic_range() {
            skipped.push((
                kind,
                format!("Degenerate b interval: min_b={} max_b={}", config.min_b, config.max_b),
            ));
            continue;
        }

        match fit_decline_with(points, kind, config, opts) {
            Ok(fit) => fits.push(fit),
            Err(e @ DeclineError::ConvergenceFailure { .. }) => {
                tracing::warn!(model = %kind, error = %e, "skipping model");
                skipped.push((kind, e.to_string()));
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    if fits.is_empty() {
        return Err(last_err.unwrap_or_else(|| DeclineError::ConvergenceFailure {
            model: ModelKind::Exponential,
            reason: "no model could be fitted".to_string(),
        }));
    }

    let best = select_by_r2(&fits);
    Ok(FitSelection { best, fits, skipped })
}

fn select_by_r2(fits: &[FitResult]) -> FitResult {
    let mut best = &fits[0];
    for f in &fits[1..] {
        if f.r2 > best.r2 {
            best = f;
        }
    }

    let best_r2 = best.r2;

    // Prefer simplicity if within the tie epsilon.
    //
    // We iterate in order of increasing complexity and pick the first fit that
    // is "close enough" to the best.
    for kind in ModelKind::SELECTION_ORDER {
        if let Some(f) = fits.iter().find(|f| f.model == kind) {
            if f.r2 >= best_r2 - R2_TIE_EPS {
                return f.clone();
            }
        }
    }

    best.clone()
}
