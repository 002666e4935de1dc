//! Least squares helpers.
//!
//! The only regression this project needs is a straight line through the
//! pre-slip stress/normal-displacement segment (the apparatus normal
//! stiffness). We solve it as a tiny tall least-squares problem with SVD so
//! the same code path handles nearly collinear data gracefully.
//!
//! (Nalgebra's `QR::solve` is intended for square systems and will panic for
//! non-square matrices.)

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Coefficients of `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

/// One-degree polynomial least-squares fit.
///
/// Returns `None` for fewer than two points, mismatched lengths, non-finite
/// inputs, or a degenerate design (all `x` equal).
pub fn polyfit_linear(x: &[f64], y: &[f64]) -> Option<LinearFit> {
    let n = x.len();
    if n < 2 || y.len() != n {
        return None;
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return None;
    }

    let x_min = x.iter().copied().fold(f64::INFINITY, f64::min);
    let x_max = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if x_max <= x_min {
        return None;
    }

    // Centre x so the slope column is well conditioned for large offsets.
    let x_mean = x.iter().sum::<f64>() / n as f64;

    let mut design = DMatrix::<f64>::zeros(n, 2);
    for (i, &xi) in x.iter().enumerate() {
        design[(i, 0)] = xi - x_mean;
        design[(i, 1)] = 1.0;
    }
    let rhs = DVector::from_column_slice(y);

    let beta = solve_least_squares(&design, &rhs)?;
    let slope = beta[0];
    let intercept = beta[1] - slope * x_mean;
    Some(LinearFit { slope, intercept })
}
