//! Linear least squares helpers.
//!
//! Two kinds of small linear problems show up in decline fitting:
//!
//! ```text
//! minimize ‖A δ - r‖²            (one damped Gauss-Newton step, 2-3 columns)
//! minimize Σ (y_i - a - s·t_i)²  (log-linear initial guess)
//! ```
//!
//! Implementation choices:
//! - We use SVD so tall systems (more rows than columns) solve robustly.
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices.)
//! - The parameter dimension is tiny, so SVD cost is negligible next to the
//!   model evaluations.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Ordinary least squares line `y ≈ intercept + slope·x`.
///
/// Returns `(intercept, slope)`, or `None` with fewer than two points or when
/// all `x` coincide.
pub fn linear_fit(xs: &[f64], ys: &[f64]) -> Option<(f64, f64)> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let x_min = xs[..n].iter().copied().fold(f64::INFINITY, f64::min);
    let x_max = xs[..n].iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(x_max - x_min > 0.0) {
        return None;
    }

    let mut design = DMatrix::<f64>::zeros(n, 2);
    let mut rhs = DVector::<f64>::zeros(n);
    for i in 0..n {
        design[(i, 0)] = 1.0;
        design[(i, 1)] = xs[i];
        rhs[i] = ys[i];
    }

    let beta = solve_least_squares(&design, &rhs)?;
    Some((beta[0], beta[1]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn linear_fit_recovers_log_decline() {
        let ts = [0.0, 30.0, 60.0, 90.0, 120.0];
        let ys: Vec<f64> = ts.iter().map(|t| 1000f64.ln() - 0.002 * t).collect();
        let (a, s) = linear_fit(&ts, &ys).unwrap();
        assert!((a.exp() - 1000.0).abs() < 1e-6);
        assert!((s + 0.002).abs() < 1e-12);
    }

    #[test]
    fn linear_fit_rejects_degenerate_x() {
        assert!(linear_fit(&[5.0, 5.0, 5.0], &[1.0, 2.0, 3.0]).is_none());
        assert!(linear_fit(&[1.0], &[1.0]).is_none());
    }
}
