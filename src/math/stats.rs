//! Error metrics.

use crate::error::FitError;

/// Root-mean-square error between two equal-length sequences.
pub fn rmse(a: &[f64], b: &[f64]) -> Result<f64, FitError> {
    if a.len() != b.len() {
        return Err(FitError::ShapeMismatch {
            context: "rmse",
            left: a.len(),
            right: b.len(),
        });
    }
    if a.is_empty() {
        return Err(FitError::EmptySeries { context: "rmse" });
    }

    let sse: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let r = x - y;
            r * r
        })
        .sum();
    Ok((sse / a.len() as f64).sqrt())
}
