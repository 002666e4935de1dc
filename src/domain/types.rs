//! Shared domain types.
//!
//! These types are kept small and serializable so they can be:
//!
//! - passed through the inversion core by value (parameters are `Copy`)
//! - exported to JSON/CSV
//! - reloaded later for plotting

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FitError;

/// Number of inverted parameters.
pub const N_DIM: usize = 3;

/// Parameter names in vector order.
pub const PARAM_NAMES: [&str; N_DIM] = ["dil_fact", "d_c", "dil_ang"];

/// Exclusive upper limit for the dilation angle (degrees).
pub const MAX_DIL_ANG: f64 = 90.0;

/// Default maximum aperture (RMS asperity height, mm) of the tested fracture.
pub const DEFAULT_B_MAX: f64 = 1.340498;

/// A candidate parameter vector for the dilation model.
///
/// Created once per candidate and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DilationParams {
    /// Dilation factor (dimensionless).
    pub dil_fact: f64,
    /// Characteristic slip distance (same length unit as slip displacement).
    pub d_c: f64,
    /// Dilation angle in degrees.
    pub dil_ang: f64,
}

impl DilationParams {
    pub fn new(dil_fact: f64, d_c: f64, dil_ang: f64) -> Self {
        Self {
            dil_fact,
            d_c,
            dil_ang,
        }
    }

    pub fn to_array(self) -> [f64; N_DIM] {
        [self.dil_fact, self.d_c, self.dil_ang]
    }

    pub fn from_array(x: [f64; N_DIM]) -> Self {
        Self::new(x[0], x[1], x[2])
    }
}

/// Box constraint `lower <= params <= upper` (componentwise).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamBounds {
    pub lower: [f64; N_DIM],
    pub upper: [f64; N_DIM],
}

impl Default for ParamBounds {
    fn default() -> Self {
        Self {
            lower: [0.0, 1e-5, 0.0],
            upper: [0.5, 2.0, 20.0],
        }
    }
}

impl ParamBounds {
    /// Build bounds, rejecting empty or non-finite intervals.
    pub fn new(lower: [f64; N_DIM], upper: [f64; N_DIM]) -> Result<Self, FitError> {
        for d in 0..N_DIM {
            if !(lower[d].is_finite() && upper[d].is_finite() && lower[d] <= upper[d]) {
                return Err(FitError::InvalidConfig(format!(
                    "bounds for `{}` must be finite with lower <= upper (got [{}, {}])",
                    PARAM_NAMES[d], lower[d], upper[d]
                )));
            }
        }
        if lower[0] < 0.0 {
            return Err(FitError::InvalidConfig(format!(
                "lower bound of `dil_fact` must be >= 0 (got {})",
                lower[0]
            )));
        }
        // A zero characteristic distance makes the relaxation undefined.
        if lower[1] <= 0.0 {
            return Err(FitError::InvalidConfig(format!(
                "lower bound of `d_c` must be > 0 (got {})",
                lower[1]
            )));
        }
        // Roughness climbing needs 0 <= ψ < 90° to stay finite and non-decreasing.
        if lower[2] < 0.0 || upper[2] >= MAX_DIL_ANG {
            return Err(FitError::InvalidConfig(format!(
                "bounds of `dil_ang` must lie in [0, {MAX_DIL_ANG}) degrees (got [{}, {}])",
                lower[2], upper[2]
            )));
        }
        Ok(Self { lower, upper })
    }

    /// Fail with `InvalidParameter` on the first out-of-bound (or NaN) component.
    pub fn check(&self, params: &DilationParams) -> Result<(), FitError> {
        let x = params.to_array();
        for d in 0..N_DIM {
            if !(x[d] >= self.lower[d] && x[d] <= self.upper[d]) {
                return Err(FitError::InvalidParameter {
                    name: PARAM_NAMES[d],
                    value: x[d],
                    lower: self.lower[d],
                    upper: self.upper[d],
                });
            }
        }
        Ok(())
    }

    pub fn contains(&self, params: &DilationParams) -> bool {
        self.check(params).is_ok()
    }

    /// Centre of the box (a convenient reference candidate).
    pub fn midpoint(&self) -> DilationParams {
        let mut x = [0.0; N_DIM];
        for (d, v) in x.iter_mut().enumerate() {
            *v = 0.5 * (self.lower[d] + self.upper[d]);
        }
        DilationParams::from_array(x)
    }
}

/// Inclusive index range `[start, end]` into a shear-test table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    pub start: usize,
    pub end: usize,
}

impl AnalysisWindow {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of samples covered (0 for an inverted range).
    pub fn len(&self) -> usize {
        if self.end < self.start {
            0
        } else {
            self.end - self.start + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `start < end` and `end` inside a table of `n` rows.
    pub fn fits(&self, n: usize) -> bool {
        self.start < self.end && self.end < n
    }
}

/// Raw direct-shear test table (one entry per acquisition step).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShearTestTable {
    pub slip_disp: Vec<f64>,
    pub normal_stress: Vec<f64>,
    /// Normal displacement; `None` where the sensor produced no value.
    pub normal_disp: Vec<Option<f64>>,
}

impl ShearTestTable {
    pub fn len(&self) -> usize {
        self.slip_disp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slip_disp.is_empty()
    }
}

/// Everything the inversion core consumes for one analysis window.
///
/// `u_end`, `v`, and `b_exp[1..]` are aligned; `b_exp[0]` is the baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InversionInputs {
    /// Observed aperture over the whole window (baseline first).
    pub b_exp: Vec<f64>,
    /// Baseline aperture (`b_exp[0]`).
    pub b_0: f64,
    /// Slip displacement at the window start.
    pub u0_ini: f64,
    /// Slip displacement for window samples `1..N`.
    pub u_end: Vec<f64>,
    /// Slip velocity for window samples `1..N`.
    pub v: Vec<f64>,
    /// Acquisition interval.
    pub dt_acq: f64,
    /// Normal stiffness of the apparatus (informational for the core).
    pub norm_stiff: f64,
    /// Source window, for error context.
    pub window: AnalysisWindow,
}

impl InversionInputs {
    /// Assemble inputs from an observed aperture series; `b_0` is taken from `b_exp[0]`.
    pub fn new(
        b_exp: Vec<f64>,
        u0_ini: f64,
        u_end: Vec<f64>,
        v: Vec<f64>,
        dt_acq: f64,
        norm_stiff: f64,
        window: AnalysisWindow,
    ) -> Self {
        let b_0 = b_exp.first().copied().unwrap_or(f64::NAN);
        Self {
            b_exp,
            b_0,
            u0_ini,
            u_end,
            v,
            dt_acq,
            norm_stiff,
            window,
        }
    }

    /// Observed aperture aligned with the model output.
    pub fn observed(&self) -> &[f64] {
        self.b_exp.get(1..).unwrap_or(&[])
    }
}

/// A flagged velocity sample that was not interpolated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VelocityGap {
    /// Table row index.
    pub row: usize,
    pub kind: GapKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapKind {
    /// Zero velocity on the first modeled or the last window sample.
    Boundary,
    /// Zero velocity inside a run of two or more zeros.
    Run,
}

/// Per-sample fitted aperture (used for tables, plots, and exports).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApertureResidual {
    pub row: usize,
    pub slip_disp: f64,
    pub velocity: f64,
    pub b_exp: f64,
    pub b_mod: f64,
    pub residual: f64,
}

/// Genetic-algorithm settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaConfig {
    pub population_size: usize,
    pub max_iterations: usize,
    pub precision: f64,
    pub prob_mutation: f64,
    pub tournament_size: usize,
    pub seed: u64,
    /// Optional warm-start candidate, evaluated before the first generation.
    pub initial_guess: Option<DilationParams>,
    /// Log progress every N iterations (0 disables progress events).
    pub log_every: usize,
}

impl Default for GaConfig {
    fn default() -> Self {
        Self {
            population_size: 200,
            max_iterations: 10_000,
            precision: 1e-7,
            prob_mutation: 0.001,
            tournament_size: 3,
            seed: 42,
            initial_guess: None,
            log_every: 100,
        }
    }
}

impl GaConfig {
    pub fn validate(&self) -> Result<(), FitError> {
        if self.population_size < 2 || self.population_size % 2 != 0 {
            return Err(FitError::InvalidConfig(format!(
                "population size must be even and >= 2 (got {})",
                self.population_size
            )));
        }
        if self.max_iterations == 0 {
            return Err(FitError::InvalidConfig(
                "max iterations must be >= 1".to_string(),
            ));
        }
        if !(self.precision.is_finite() && self.precision > 0.0) {
            return Err(FitError::InvalidConfig(format!(
                "precision must be finite and > 0 (got {})",
                self.precision
            )));
        }
        if !(0.0..=1.0).contains(&self.prob_mutation) {
            return Err(FitError::InvalidConfig(format!(
                "mutation probability must lie in [0, 1] (got {})",
                self.prob_mutation
            )));
        }
        if self.tournament_size == 0 {
            return Err(FitError::InvalidConfig(
                "tournament size must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Best-fit output of one inversion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub params: DilationParams,
    /// Lowest objective value (RMSE, aperture units).
    pub score: f64,
    pub evaluations: usize,
    pub iterations: usize,
    /// Best-so-far score after each iteration (non-increasing).
    pub history: Vec<f64>,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub input: PathBuf,
    /// Rows preceding the header line in the input file.
    pub skip_rows: usize,
    pub preslip: AnalysisWindow,
    pub window: AnalysisWindow,
    pub b_max: f64,
    pub dt_acq: f64,
    pub bounds: ParamBounds,
    pub ga: GaConfig,

    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
    /// Show the per-sample residual table.
    pub table: bool,

    pub export_results: Option<PathBuf>,
    pub export_json: Option<PathBuf>,
}

/// A saved inversion result (JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitFile {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub input: Option<PathBuf>,
    pub preslip: AnalysisWindow,
    pub window: AnalysisWindow,
    pub norm_stiff: f64,
    pub dt_acq: f64,
    pub bounds: ParamBounds,
    pub ga: GaConfig,
    pub params: DilationParams,
    pub score: f64,
    pub evaluations: usize,
    pub iterations: usize,
    /// Last entries of the best-so-far history.
    pub history_tail: Vec<f64>,
    /// Zero-velocity samples flagged during preprocessing.
    #[serde(default)]
    pub velocity_gaps: Vec<VelocityGap>,
    pub series: Vec<ApertureResidual>,
}
