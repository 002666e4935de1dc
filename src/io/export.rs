//! CSV exports.
//!
//! - per-sample fit results (observed vs modeled aperture)
//! - full shear-test tables (used for synthetic experiments)
//!
//! Both are meant to be easy to consume in spreadsheets or downstream scripts.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::{ApertureResidual, ShearTestTable};
use crate::error::AppError;

/// Write per-sample fit results to a CSV file.
pub fn write_results_csv(path: &Path, residuals: &[ApertureResidual]) -> Result<(), AppError> {
    let mut file = File::create(path).map_err(|e| {
        AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display()))
    })?;
    write_results(&mut file, residuals)
}

fn write_results<W: Write>(out: &mut W, residuals: &[ApertureResidual]) -> Result<(), AppError> {
    writeln!(out, "row,slip_disp,velocity,b_exp,b_mod,residual")
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    for r in residuals {
        writeln!(
            out,
            "{},{:.10},{:.10},{:.10},{:.10},{:.10}",
            r.row, r.slip_disp, r.velocity, r.b_exp, r.b_mod, r.residual,
        )
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }

    Ok(())
}

/// Write a shear-test table in the laboratory column layout.
///
/// `preamble` (if any) is written as a single line before the header, matching
/// exports that carry a title row.
pub fn write_table_csv(
    path: &Path,
    table: &ShearTestTable,
    preamble: Option<&str>,
) -> Result<(), AppError> {
    let mut file = File::create(path).map_err(|e| {
        AppError::new(2, format!("Failed to create table CSV '{}': {e}", path.display()))
    })?;
    write_table(&mut file, table, preamble)
}

fn write_table<W: Write>(
    out: &mut W,
    table: &ShearTestTable,
    preamble: Option<&str>,
) -> Result<(), AppError> {
    let err = |e: std::io::Error| AppError::new(2, format!("Failed to write table CSV: {e}"));

    if let Some(line) = preamble {
        writeln!(out, "{line}").map_err(err)?;
    }
    writeln!(
        out,
        "Slip displacement (mm),Normal stress (Mpa),Average normal displacement (mm)"
    )
    .map_err(err)?;

    for i in 0..table.len() {
        let nd = table.normal_disp[i]
            .map(|v| v.to_string())
            .unwrap_or_default();
        writeln!(
            out,
            "{},{},{}",
            table.slip_disp[i], table.normal_stress[i], nd
        )
        .map_err(err)?;
    }

    Ok(())
}
