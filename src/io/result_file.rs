//! Read/write inversion result JSON files.
//!
//! A result file is the portable record of one run:
//! - windows, stiffness, and GA settings used
//! - best-fit parameters and the lowest objective value
//! - the aligned observed/modeled series and flagged velocity gaps for plotting
//!
//! The schema is defined by `domain::FitFile`.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use chrono::Utc;

use crate::data::PreparedExperiment;
use crate::domain::{ApertureResidual, FitConfig, FitFile};
use crate::error::AppError;
use crate::fit::Inversion;

/// Number of history entries kept in the file.
const HISTORY_TAIL: usize = 50;

/// Assemble the result record for a finished run.
pub fn build_fit_file(
    config: &FitConfig,
    prepared: &PreparedExperiment,
    inversion: &Inversion,
    series: &[ApertureResidual],
) -> FitFile {
    let history = &inversion.result.history;
    let tail_start = history.len().saturating_sub(HISTORY_TAIL);

    FitFile {
        tool: env!("CARGO_PKG_NAME").to_string(),
        generated_at: Utc::now(),
        input: Some(config.input.clone()),
        preslip: prepared.preslip,
        window: prepared.inputs.window,
        norm_stiff: prepared.norm_stiff,
        dt_acq: prepared.inputs.dt_acq,
        bounds: config.bounds,
        ga: config.ga.clone(),
        params: inversion.result.params,
        score: inversion.result.score,
        evaluations: inversion.result.evaluations,
        iterations: inversion.result.iterations,
        history_tail: history[tail_start..].to_vec(),
        velocity_gaps: prepared.velocity_gaps.clone(),
        series: series.to_vec(),
    }
}

/// Write a result JSON file.
pub fn write_fit_json(path: &Path, fit: &FitFile) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(2, format!("Failed to create result JSON '{}': {e}", path.display()))
    })?;
    serde_json::to_writer_pretty(BufWriter::new(file), fit)
        .map_err(|e| AppError::new(2, format!("Failed to write result JSON: {e}")))?;
    Ok(())
}

/// Read a result JSON file.
pub fn read_fit_json(path: &Path) -> Result<FitFile, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(2, format!("Failed to open result JSON '{}': {e}", path.display()))
    })?;
    let fit: FitFile = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AppError::new(2, format!("Invalid result JSON: {e}")))?;
    if fit.series.is_empty() {
        return Err(AppError::new(3, "Result JSON contains no aperture series."));
    }
    Ok(fit)
}
