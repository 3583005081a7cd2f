//! Fit-quality diagnostics.
//!
//! All functions here are pure: they evaluate a fitted model at the observed
//! times and summarize the rate residuals.

use serde::Serialize;

use crate::domain::{Diagnostics, FittedParams, ModelKind, QualityLabel, TimeSeriesPoint};
use crate::models::rate;

/// Per-observation fitted value and residual.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResidualRow {
    pub t: f64,
    pub q_obs: f64,
    pub q_fit: f64,
    pub residual: f64,
}

/// Fitted values and residuals (`observed - fitted`) at each point.
pub fn residuals(points: &[TimeSeriesPoint], model: ModelKind, params: &FittedParams) -> Vec<ResidualRow> {
    points
        .iter()
        .map(|p| {
            let q_fit = rate(model, p.t, params);
            ResidualRow {
                t: p.t,
                q_obs: p.q,
                q_fit,
                residual: p.q - q_fit,
            }
        })
        .collect()
}

/// `R² = 1 - SS_res / SS_tot` on rates; `0` when `SS_tot = 0` or no points.
pub fn r_squared(points: &[TimeSeriesPoint], model: ModelKind, params: &FittedParams) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    let n = points.len() as f64;
    let mean = points.iter().map(|p| p.q).sum::<f64>() / n;

    let mut ss_tot = 0.0;
    let mut ss_res = 0.0;
    for p in points {
        let d = p.q - mean;
        ss_tot += d * d;
        let r = p.q - rate(model, p.t, params);
        ss_res += r * r;
    }

    if ss_tot == 0.0 {
        return 0.0;
    }
    1.0 - ss_res / ss_tot
}

/// Grade an R² value for display.
pub fn fit_quality_label(r2: f64) -> QualityLabel {
    if r2 >= 0.95 {
        QualityLabel::Excellent
    } else if r2 >= 0.85 {
        QualityLabel::Good
    } else if r2 >= 0.70 {
        QualityLabel::Fair
    } else {
        QualityLabel::Poor
    }
}

/// Full diagnostics for a fitted model against its observations.
///
/// Empty input yields neutral diagnostics rather than an error.
pub fn calculate_diagnostics(points: &[TimeSeriesPoint], model: ModelKind, params: &FittedParams) -> Diagnostics {
    if points.is_empty() {
        return Diagnostics {
            r2: 0.0,
            quality: QualityLabel::Poor,
            sse: 0.0,
            rmse: 0.0,
            n: 0,
        };
    }

    let sse: f64 = residuals(points, model, params)
        .iter()
        .map(|r| r.residual * r.residual)
        .sum();
    let r2 = r_squared(points, model, params);

    Diagnostics {
        r2,
        quality: fit_quality_label(r2),
        sse,
        rmse: (sse / points.len() as f64).sqrt(),
        n: points.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_label_thresholds() {
        assert_eq!(fit_quality_label(0.99), QualityLabel::Excellent);
        assert_eq!(fit_quality_label(0.95), QualityLabel::Excellent);
        assert_eq!(fit_quality_label(0.9), QualityLabel::Good);
        assert_eq!(fit_quality_label(0.85), QualityLabel::Good);
        assert_eq!(fit_quality_label(0.7), QualityLabel::Fair);
        assert_eq!(fit_quality_label(0.69), QualityLabel::Poor);
        assert_eq!(fit_quality_label(-3.0), QualityLabel::Poor);
    }

    #[test]
    fn perfect_fit_has_unit_r2() {
        let p = FittedParams::new(100.0, 0.01, 0.0);
        let points: Vec<TimeSeriesPoint> = (0..10)
            .map(|i| {
                let t = i as f64 * 10.0;
                TimeSeriesPoint::new(t, rate(ModelKind::Exponential, t, &p))
            })
            .collect();
        let d = calculate_diagnostics(&points, ModelKind::Exponential, &p);
        assert!((d.r2 - 1.0).abs() < 1e-12);
        assert!(d.sse < 1e-18);
        assert_eq!(d.quality, QualityLabel::Excellent);
        assert_eq!(d.n, 10);
    }

    #[test]
    fn poor_fit_can_have_negative_r2() {
        // Model far above the data.
        let p = FittedParams::new(1000.0, 0.0001, 0.0);
        let points = vec![
            TimeSeriesPoint::new(0.0, 10.0),
            TimeSeriesPoint::new(30.0, 9.0),
            TimeSeriesPoint::new(60.0, 8.0),
        ];
        let d = calculate_diagnostics(&points, ModelKind::Exponential, &p);
        assert!(d.r2 < 0.0);
        assert_eq!(d.quality, QualityLabel::Poor);
    }

    #[test]
    fn constant_data_guards_zero_total_variance() {
        let p = FittedParams::new(50.0, 0.01, 0.0);
        let points: Vec<TimeSeriesPoint> = (0..5).map(|i| TimeSeriesPoint::new(i as f64, 50.0)).collect();
        assert_eq!(r_squared(&points, ModelKind::Exponential, &p), 0.0);
    }

    #[test]
    fn empty_points_give_neutral_diagnostics() {
        let p = FittedParams::new(50.0, 0.01, 0.0);
        let d = calculate_diagnostics(&[], ModelKind::Harmonic, &p);
        assert_eq!(d.n, 0);
        assert_eq!(d.r2, 0.0);
        assert_eq!(d.quality, QualityLabel::Poor);
    }

    #[test]
    fn residuals_are_observed_minus_fitted() {
        let p = FittedParams::new(100.0, 0.01, 1.0);
        let points = vec![TimeSeriesPoint::new(0.0, 110.0), TimeSeriesPoint::new(100.0, 45.0)];
        let rows = residuals(&points, ModelKind::Harmonic, &p);
        assert!((rows[0].residual - 10.0).abs() < 1e-12);
        assert!((rows[1].q_fit - 50.0).abs() < 1e-12);
        assert!((rows[1].residual + 5.0).abs() < 1e-12);
    }
}
