//! Objective function: RMSE between modeled and observed aperture.
//!
//! The objective captures the prepared experiment once and is then a pure
//! function of the parameter vector. It holds no interior mutability, so it is
//! `Sync` and the optimizer may evaluate a whole population concurrently.

use crate::domain::{DilationParams, InversionInputs, ParamBounds};
use crate::error::FitError;
use crate::math::rmse;
use crate::models::forward_aperture;

#[derive(Debug, Clone)]
pub struct ApertureObjective {
    inputs: InversionInputs,
    bounds: ParamBounds,
}

impl ApertureObjective {
    /// Validate the captured data and build the objective.
    pub fn new(inputs: InversionInputs, bounds: ParamBounds) -> Result<Self, FitError> {
        let samples = inputs.b_exp.len();
        if samples < 2 {
            return Err(FitError::DegenerateWindow {
                start: inputs.window.start,
                end: inputs.window.end,
                samples,
            });
        }
        if inputs.u_end.len() != samples - 1 {
            return Err(FitError::ShapeMismatch {
                context: "u_end vs observed aperture",
                left: inputs.u_end.len(),
                right: samples - 1,
            });
        }
        if inputs.v.len() != inputs.u_end.len() {
            return Err(FitError::ShapeMismatch {
                context: "velocity vs u_end",
                left: inputs.v.len(),
                right: inputs.u_end.len(),
            });
        }
        if !(inputs.dt_acq.is_finite() && inputs.dt_acq > 0.0) {
            return Err(FitError::InvalidConfig(format!(
                "acquisition interval must be finite and > 0 (got {})",
                inputs.dt_acq
            )));
        }
        let finite = inputs
            .b_exp
            .iter()
            .chain(inputs.u_end.iter())
            .chain(inputs.v.iter())
            .all(|x| x.is_finite())
            && inputs.u0_ini.is_finite()
            && inputs.b_0.is_finite();
        if !finite {
            return Err(FitError::InvalidConfig(
                "inversion inputs contain non-finite values".to_string(),
            ));
        }
        if inputs.v.iter().any(|&v| v < 0.0) {
            return Err(FitError::InvalidConfig(
                "slip velocity must be non-negative".to_string(),
            ));
        }

        Ok(Self { inputs, bounds })
    }

    pub fn inputs(&self) -> &InversionInputs {
        &self.inputs
    }

    pub fn bounds(&self) -> &ParamBounds {
        &self.bounds
    }

    /// Number of compared samples (window length minus the baseline).
    pub fn n_compared(&self) -> usize {
        self.inputs.b_exp.len() - 1
    }

    /// Modeled aperture for `params` (no bound check).
    pub fn model(&self, params: &DilationParams) -> Result<Vec<f64>, FitError> {
        forward_aperture(&self.inputs, params)
    }

    /// RMSE between modeled and observed aperture.
    pub fn evaluate(&self, params: &DilationParams) -> Result<f64, FitError> {
        self.bounds.check(params)?;

        let b_mod = self.model(params)?;
        if b_mod.is_empty() {
            return Err(FitError::DegenerateWindow {
                start: self.inputs.window.start,
                end: self.inputs.window.end,
                samples: self.inputs.b_exp.len(),
            });
        }
        rmse(&b_mod, self.inputs.observed())
    }
}
