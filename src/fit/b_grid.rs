//! Starting-point grid for the hyperbolic b-factor.
//!
//! The hyperbolic objective is not convex in `b`; a single start can settle in
//! a poor basin when the data are noisy. We therefore run the optimizer from a
//! small, deterministic set of evenly spaced `b` values and keep the best.

use crate::error::DeclineError;

/// Generate `steps` evenly spaced points between `min` and `max` (inclusive).
///
/// A degenerate interval (`min == max`) yields a single point.
pub fn lin_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, DeclineError> {
    if !(min.is_finite() && max.is_finite() && max >= min) {
        return Err(DeclineError::invalid_config(format!(
            "Invalid b range: min={min}, max={max} (must be finite and max>=min)."
        )));
    }
    if max == min {
        return Ok(vec![min]);
    }
    if steps < 2 {
        return Err(DeclineError::invalid_config("b grid steps must be >= 2."));
    }

    let step = (max - min) / (steps as f64 - 1.0);
    let mut out = Vec::with_capacity(steps);
    for i in 0..steps {
        out.push(min + step * i as f64);
    }
    // Pin the last value so the upper bound is hit exactly.
    if let Some(last) = out.last_mut() {
        *last = max;
    }
    Ok(out)
}

/// Hyperbolic start grid inside `[min_b, max_b]`.
///
/// The interval ends are pulled slightly inwards: a start exactly on a bound
/// has a one-sided projected step and tends to stay there.
pub fn b_start_grid(min_b: f64, max_b: f64, steps: usize) -> Result<Vec<f64>, DeclineError> {
    let width = max_b - min_b;
    if width <= 0.0 {
        return lin_space(min_b, max_b, steps);
    }
    let inset = width * 0.05;
    lin_space(min_b + inset, max_b - inset, steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lin_space_includes_endpoints() {
        let v = lin_space(0.1, 0.9, 5).unwrap();
        assert_eq!(v.len(), 5);
        assert!((v[0] - 0.1).abs() < 1e-12);
        assert_eq!(v[4], 0.9);
    }

    #[test]
    fn degenerate_interval_is_single_start() {
        assert_eq!(lin_space(0.5, 0.5, 7).unwrap(), vec![0.5]);
        assert_eq!(b_start_grid(0.5, 0.5, 7).unwrap(), vec![0.5]);
    }

    #[test]
    fn start_grid_stays_strictly_inside_bounds() {
        let grid = b_start_grid(0.0, 1.0, 9).unwrap();
        assert_eq!(grid.len(), 9);
        assert!(grid.iter().all(|&b| b > 0.0 && b < 1.0));
    }

    #[test]
    fn inverted_range_is_rejected() {
        assert!(lin_space(1.0, 0.0, 3).is_err());
    }
}
