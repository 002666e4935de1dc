//! Command-line parsing for the shear-dilation inverter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/optimization code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::DEFAULT_B_MAX;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "dilfit",
    version,
    about = "Shear-dilation parameter inversion for rock fracture tests"
)]
pub struct Cli {
    /// More log output (repeat for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Invert dilation parameters from a direct-shear test table.
    Fit(FitArgs),
    /// Generate a synthetic test table with known parameters.
    Synth(SynthArgs),
    /// Plot a previously exported result JSON.
    Plot(PlotArgs),
}

/// Options for an inversion run.
#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Shear-test CSV (slip displacement, normal stress, average normal displacement).
    #[arg(short, long, value_name = "CSV", env = "DILFIT_INPUT")]
    pub input: PathBuf,

    /// Preamble lines before the header row.
    #[arg(long, default_value_t = 1, env = "DILFIT_SKIP_ROWS")]
    pub skip_rows: usize,

    /// Pre-slip (elastic loading) segment used for the stiffness regression.
    #[arg(long, num_args = 2, value_names = ["START", "END"], required = true)]
    pub preslip: Vec<usize>,

    /// Analysis window (inclusive row indices).
    #[arg(long, num_args = 2, value_names = ["START", "END"], required = true)]
    pub window: Vec<usize>,

    /// Maximum aperture (RMS asperity height).
    #[arg(long, default_value_t = DEFAULT_B_MAX, env = "DILFIT_B_MAX")]
    pub b_max: f64,

    /// Acquisition interval.
    #[arg(long = "dt", default_value_t = 1.0)]
    pub dt_acq: f64,

    /// GA population size (even).
    #[arg(long, default_value_t = 200, env = "DILFIT_POPULATION")]
    pub population: usize,

    /// GA iterations.
    #[arg(long, default_value_t = 10_000, env = "DILFIT_ITERATIONS")]
    pub iterations: usize,

    /// Encoding precision per parameter.
    #[arg(long, default_value_t = 1e-7)]
    pub precision: f64,

    /// Per-bit mutation probability.
    #[arg(long, default_value_t = 0.001)]
    pub prob_mutation: f64,

    /// Tournament size for parent selection.
    #[arg(long, default_value_t = 3)]
    pub tournament: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42, env = "DILFIT_SEED")]
    pub seed: u64,

    /// Lower bounds: DIL_FACT D_C DIL_ANG.
    #[arg(
        long,
        num_args = 3,
        value_names = ["DIL_FACT", "D_C", "DIL_ANG"],
        allow_negative_numbers = true
    )]
    pub lower: Option<Vec<f64>>,

    /// Upper bounds: DIL_FACT D_C DIL_ANG.
    #[arg(
        long,
        num_args = 3,
        value_names = ["DIL_FACT", "D_C", "DIL_ANG"],
        allow_negative_numbers = true
    )]
    pub upper: Option<Vec<f64>>,

    /// Warm-start candidate evaluated before the first generation.
    #[arg(long, num_args = 3, value_names = ["DIL_FACT", "D_C", "DIL_ANG"])]
    pub initial_guess: Option<Vec<f64>>,

    /// Log GA progress every N iterations (0 = off).
    #[arg(long, default_value_t = 100)]
    pub log_every: usize,

    /// Render an ASCII plot of observed vs modeled aperture.
    #[arg(long)]
    pub plot: bool,

    /// Print the per-sample residual table.
    #[arg(long)]
    pub table: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Export per-sample results to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Export the full result (settings + params + series) to JSON.
    #[arg(long = "export-json", value_name = "JSON")]
    pub export_json: Option<PathBuf>,
}

/// Options for generating a synthetic test.
#[derive(Debug, Parser, Clone)]
pub struct SynthArgs {
    /// Output CSV path.
    #[arg(short, long, value_name = "CSV")]
    pub output: PathBuf,

    #[arg(long, default_value_t = 0.05)]
    pub dil_fact: f64,

    #[arg(long, default_value_t = 0.3)]
    pub d_c: f64,

    /// Dilation angle in degrees.
    #[arg(long, default_value_t = 2.0)]
    pub dil_ang: f64,

    /// Number of table rows.
    #[arg(long, default_value_t = 400)]
    pub rows: usize,

    #[arg(long, num_args = 2, value_names = ["START", "END"], default_values_t = [20usize, 120])]
    pub preslip: Vec<usize>,

    #[arg(long, num_args = 2, value_names = ["START", "END"], default_values_t = [150usize, 350])]
    pub window: Vec<usize>,

    /// Normal stiffness of the apparatus.
    #[arg(long, default_value_t = 120.0)]
    pub stiffness: f64,

    #[arg(long, default_value_t = DEFAULT_B_MAX)]
    pub b_max: f64,

    #[arg(long = "dt", default_value_t = 1.0)]
    pub dt_acq: f64,

    /// Mean slip velocity.
    #[arg(long, default_value_t = 0.01)]
    pub velocity: f64,

    /// Relative velocity jitter (standard deviation).
    #[arg(long, default_value_t = 0.2)]
    pub jitter: f64,

    /// Aperture noise (standard deviation).
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Options for plotting a saved result.
#[derive(Debug, Parser)]
pub struct PlotArgs {
    /// Result JSON produced by `dilfit fit --export-json`.
    #[arg(long, value_name = "JSON")]
    pub result: PathBuf,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_fit_windows_and_bounds() {
        let cli = Cli::try_parse_from([
            "dilfit", "fit", "--input", "t.csv", "--preslip", "11", "375", "--window", "388",
            "694", "--upper", "0.4", "1.5", "15", "-v",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Fit(args) => {
                assert_eq!(args.preslip, vec![11, 375]);
                assert_eq!(args.window, vec![388, 694]);
                assert_eq!(args.upper, Some(vec![0.4, 1.5, 15.0]));
                assert_eq!(args.lower, None);
                assert_eq!(args.population, 200);
                assert_eq!(args.skip_rows, 1);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn synth_has_default_windows() {
        let cli = Cli::try_parse_from(["dilfit", "synth", "--output", "s.csv"]).unwrap();
        match cli.command {
            Command::Synth(args) => {
                assert_eq!(args.preslip, vec![20, 120]);
                assert_eq!(args.window, vec![150, 350]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
