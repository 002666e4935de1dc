//! Error types.
//!
//! Two layers:
//!
//! - typed errors for the numerical core (`FitError`) and for table cleaning
//!   (`PrepError`), so callers and tests can match on the failure kind
//! - `AppError`, the process-level error carrying a message and an exit code
//!
//! Exit codes: 2 = input/configuration, 3 = no usable data, 4 = fitting failure.

use thiserror::Error;

/// Failures of the physical model, objective, and optimizer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("parameter `{name}` = {value} is outside its bounds [{lower}, {upper}]")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        lower: f64,
        upper: f64,
    },

    #[error(
        "analysis window [{start}, {end}] has {samples} usable sample(s); at least 2 are required"
    )]
    DegenerateWindow {
        start: usize,
        end: usize,
        samples: usize,
    },

    #[error("{context}: length mismatch ({left} vs {right})")]
    ShapeMismatch {
        context: &'static str,
        left: usize,
        right: usize,
    },

    #[error("{context}: empty series")]
    EmptySeries { context: &'static str },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Failures while turning a raw shear-test table into inversion inputs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PrepError {
    #[error("{label} window [{start}, {end}] is invalid for a table of {len} rows")]
    InvalidWindow {
        label: &'static str,
        start: usize,
        end: usize,
        len: usize,
    },

    #[error("row {row}: {column} is undefined inside the {label} window")]
    MissingValue {
        row: usize,
        column: &'static str,
        label: &'static str,
    },

    #[error("row {row}: non-finite {column} value {value}")]
    NonFinite {
        row: usize,
        column: &'static str,
        value: f64,
    },

    #[error("normal stiffness regression failed: {0}")]
    Stiffness(String),

    #[error("acquisition interval must be finite and > 0 (got {0})")]
    InvalidInterval(f64),
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        let code = match err {
            FitError::InvalidConfig(_) => 2,
            FitError::DegenerateWindow { .. } => 3,
            _ => 4,
        };
        AppError::new(code, format!("Inversion failed: {err}"))
    }
}

impl From<PrepError> for AppError {
    fn from(err: PrepError) -> Self {
        let code = match err {
            PrepError::InvalidWindow { .. } | PrepError::InvalidInterval(_) => 2,
            _ => 3,
        };
        AppError::new(code, format!("Preprocessing failed: {err}"))
    }
}
