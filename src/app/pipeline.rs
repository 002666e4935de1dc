//! Shared "fit pipeline" logic.
//!
//! Keeping this in one place keeps the workflow testable without the CLI:
//! CSV ingest -> preprocessing -> GA inversion -> residuals

use crate::data::{PrepOptions, PreparedExperiment, prepare};
use crate::domain::{ApertureResidual, FitConfig};
use crate::error::AppError;
use crate::fit::{Inversion, invert};
use crate::io::ingest::{IngestedTable, load_shear_table};

/// All computed outputs of a single `dilfit fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ingest: IngestedTable,
    pub prepared: PreparedExperiment,
    pub inversion: Inversion,
    pub residuals: Vec<ApertureResidual>,
}

/// Execute the full inversion pipeline and return the computed outputs.
pub fn run_fit(config: &FitConfig) -> Result<RunOutput, AppError> {
    // 1) Load the raw table.
    let ingest = load_shear_table(&config.input, config.skip_rows)?;

    // 2) Clean and derive the inversion inputs.
    let opts = PrepOptions {
        preslip: config.preslip,
        window: config.window,
        b_max: config.b_max,
        dt_acq: config.dt_acq,
    };
    let prepared = prepare(&ingest.table, &opts)?;

    // 3) Search the parameter box.
    let inversion = invert(prepared.inputs.clone(), config.bounds, &config.ga)?;

    // 4) Per-sample residuals for reports and exports.
    let residuals = crate::report::compute_residuals(&prepared, &inversion)?;

    Ok(RunOutput {
        ingest,
        prepared,
        inversion,
        residuals,
    })
}
