//! CSV ingest for direct-shear test tables.
//!
//! This module is responsible for turning a laboratory export into a
//! `ShearTestTable` whose row indices match the acquisition steps.
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation** with line numbers in every message
//! - **Stable indexing**: rows are never dropped, because analysis windows
//!   refer to row positions; a bad required value fails the whole ingest
//! - **Separation of concerns**: no cleaning or fitting logic here

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use tracing::{debug, info};

use crate::domain::ShearTestTable;
use crate::error::AppError;

/// Accepted header spellings per column (lower-case, trimmed).
const SLIP_DISP_ALIASES: [&str; 3] = ["slip displacement (mm)", "slip_displacement", "slip_disp"];
const NORMAL_STRESS_ALIASES: [&str; 3] = ["normal stress (mpa)", "normal_stress", "normal stress"];
const NORMAL_DISP_ALIASES: [&str; 3] = [
    "average normal displacement (mm)",
    "normal_displacement",
    "normal_disp",
];

/// Maximum number of row errors echoed in the failure message.
const MAX_REPORTED_ROW_ERRORS: usize = 5;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: the table plus bookkeeping for the run summary.
#[derive(Debug, Clone)]
pub struct IngestedTable {
    pub table: ShearTestTable,
    pub rows_read: usize,
    /// Rows whose normal displacement cell was empty.
    pub missing_normal_disp: usize,
}

#[derive(Debug, Clone, Copy)]
struct Columns {
    slip_disp: usize,
    normal_stress: usize,
    normal_disp: usize,
}

/// Load a shear-test CSV file, skipping `skip_rows` preamble lines before the header.
pub fn load_shear_table(path: &Path, skip_rows: usize) -> Result<IngestedTable, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display()))
    })?;
    let ingested = read_shear_table(file, skip_rows)?;
    info!(
        path = %path.display(),
        rows = ingested.rows_read,
        missing_normal_disp = ingested.missing_normal_disp,
        "loaded shear test table"
    );
    Ok(ingested)
}

/// Parse a shear-test table from any reader.
pub fn read_shear_table<R: Read>(reader: R, skip_rows: usize) -> Result<IngestedTable, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = reader.records();

    for skipped in 0..skip_rows {
        match records.next() {
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                return Err(AppError::new(
                    2,
                    format!("Failed to read preamble line {}: {e}", skipped + 1),
                ));
            }
            None => {
                return Err(AppError::new(
                    2,
                    format!("CSV ended inside the {skip_rows}-line preamble."),
                ));
            }
        }
    }

    let headers = match records.next() {
        Some(Ok(h)) => h,
        Some(Err(e)) => return Err(AppError::new(2, format!("Failed to read CSV headers: {e}"))),
        None => return Err(AppError::new(2, "CSV has no header line.")),
    };
    let header_map = build_header_map(&headers);
    let columns = resolve_columns(&header_map)?;
    debug!(?columns, "resolved CSV columns");

    let mut table = ShearTestTable::default();
    let mut row_errors = Vec::new();
    let mut missing_normal_disp = 0usize;

    for result in records {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line: e.position().map_or(0, |p| p.line() as usize),
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };
        // Physical line where the record starts (1-based, quoted multi-line
        // fields included).
        let line = record.position().map_or(0, |p| p.line() as usize);

        match parse_row(&record, columns) {
            Ok((slip, stress, nd)) => {
                if nd.is_none() {
                    missing_normal_disp += 1;
                }
                table.slip_disp.push(slip);
                table.normal_stress.push(stress);
                table.normal_disp.push(nd);
            }
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    if !row_errors.is_empty() {
        let shown: Vec<String> = row_errors
            .iter()
            .take(MAX_REPORTED_ROW_ERRORS)
            .map(|e| format!("line {}: {}", e.line, e.message))
            .collect();
        return Err(AppError::new(
            2,
            format!(
                "{} invalid row(s) in CSV (rows cannot be skipped without shifting windows):\n  {}",
                row_errors.len(),
                shown.join("\n  ")
            ),
        ));
    }

    if table.is_empty() {
        return Err(AppError::new(3, "CSV contains no data rows."));
    }

    Ok(IngestedTable {
        rows_read: table.len(),
        table,
        missing_normal_disp,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Excel and other tools sometimes emit UTF-8 CSVs with a BOM prefix on the
    // first header. If we don't strip it, schema validation will incorrectly
    // report missing columns.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn resolve_columns(header_map: &HashMap<String, usize>) -> Result<Columns, AppError> {
    Ok(Columns {
        slip_disp: find_column(header_map, &SLIP_DISP_ALIASES)?,
        normal_stress: find_column(header_map, &NORMAL_STRESS_ALIASES)?,
        normal_disp: find_column(header_map, &NORMAL_DISP_ALIASES)?,
    })
}

fn find_column(header_map: &HashMap<String, usize>, aliases: &[&str]) -> Result<usize, AppError> {
    aliases
        .iter()
        .find_map(|name| header_map.get(*name).copied())
        .ok_or_else(|| {
            AppError::new(
                2,
                format!(
                    "Missing required column: `{}` (accepted: {})",
                    aliases[0],
                    aliases.join(", ")
                ),
            )
        })
}

fn parse_row(record: &StringRecord, columns: Columns) -> Result<(f64, f64, Option<f64>), String> {
    let slip = parse_required(record, columns.slip_disp, "slip displacement")?;
    let stress = parse_required(record, columns.normal_stress, "normal stress")?;
    let nd = match get_optional(record, columns.normal_disp) {
        None => None,
        Some(s) => Some(parse_f64(s, "normal displacement")?),
    };
    Ok((slip, stress, nd))
}

fn parse_required(record: &StringRecord, idx: usize, name: &str) -> Result<f64, String> {
    let s = get_optional(record, idx).ok_or_else(|| format!("Missing required value: `{name}`"))?;
    parse_f64(s, name)
}

fn get_optional(record: &StringRecord, idx: usize) -> Option<&str> {
    record.get(idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_f64(s: &str, name: &str) -> Result<f64, String> {
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(format!("Invalid `{name}` value '{s}'")),
    }
}
