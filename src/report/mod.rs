//! Reporting utilities: residuals and formatted terminal output.

pub mod format;

pub use format::*;

use crate::data::PreparedExperiment;
use crate::domain::ApertureResidual;
use crate::error::AppError;
use crate::fit::Inversion;

/// Pair every compared window sample with its modeled aperture.
///
/// Rows start at `window.start + 1`; the baseline sample is not compared.
pub fn compute_residuals(
    prepared: &PreparedExperiment,
    inversion: &Inversion,
) -> Result<Vec<ApertureResidual>, AppError> {
    let inputs = &prepared.inputs;
    let observed = inputs.observed();
    let modeled = &inversion.modeled;
    if modeled.len() != observed.len() || inputs.u_end.len() != observed.len() {
        return Err(AppError::new(
            4,
            format!(
                "Modeled series has {} samples but {} were observed.",
                modeled.len(),
                observed.len()
            ),
        ));
    }

    let mut out = Vec::with_capacity(observed.len());
    for (j, (&b_exp, &b_mod)) in observed.iter().zip(modeled).enumerate() {
        if !b_mod.is_finite() {
            return Err(AppError::new(
                4,
                "Non-finite modeled aperture during residual computation.",
            ));
        }
        out.push(ApertureResidual {
            row: inputs.window.start + 1 + j,
            slip_disp: inputs.u_end[j],
            velocity: inputs.v[j],
            b_exp,
            b_mod,
            residual: b_exp - b_mod,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{PrepOptions, SyntheticSpec, generate_experiment, prepare};
    use crate::domain::{GaConfig, ParamBounds};
    use crate::fit::invert;
    use approx::assert_abs_diff_eq;

    #[test]
    fn residuals_align_with_window_rows() {
        let spec = SyntheticSpec {
            n_rows: 120,
            preslip: crate::domain::AnalysisWindow::new(5, 40),
            window: crate::domain::AnalysisWindow::new(60, 100),
            ..SyntheticSpec::default()
        };
        let exp = generate_experiment(&spec).unwrap();
        let prepared = prepare(
            &exp.table,
            &PrepOptions {
                preslip: exp.preslip,
                window: exp.window,
                b_max: spec.b_max,
                dt_acq: spec.dt_acq,
            },
        )
        .unwrap();
        let ga = GaConfig {
            population_size: 20,
            max_iterations: 5,
            initial_guess: Some(spec.params),
            ..GaConfig::default()
        };
        let inversion = invert(prepared.inputs.clone(), ParamBounds::default(), &ga).unwrap();

        let residuals = compute_residuals(&prepared, &inversion).unwrap();
        assert_eq!(residuals.len(), 40);
        assert_eq!(residuals[0].row, 61);
        assert_eq!(residuals[39].row, 100);
        assert_abs_diff_eq!(residuals[0].slip_disp, prepared.slip_disp[61], epsilon = 1e-12);
        for r in &residuals {
            assert_abs_diff_eq!(r.residual, r.b_exp - r.b_mod, epsilon = 1e-15);
            assert!(r.residual.abs() < 1e-6, "residual={}", r.residual);
        }
    }
}
