//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - installs the tracing subscriber
//! - runs the inversion pipeline
//! - prints reports/plots
//! - writes optional exports

use clap::Parser;
use tracing::info;

use crate::cli::{Cli, Command, FitArgs, PlotArgs, SynthArgs};
use crate::data::{SyntheticSpec, generate_experiment};
use crate::domain::{AnalysisWindow, DilationParams, FitConfig, GaConfig, ParamBounds};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `dilfit` binary.
pub fn run() -> Result<(), AppError> {
    // A missing .env file is fine; DILFIT_* variables may come from the shell.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    crate::logging::init(cli.verbose, cli.quiet);

    match cli.command {
        Command::Fit(args) => handle_fit(&args),
        Command::Synth(args) => handle_synth(&args),
        Command::Plot(args) => handle_plot(&args),
    }
}

fn handle_fit(args: &FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(args)?;
    let run = pipeline::run_fit(&config)?;

    println!(
        "{}",
        crate::report::format_run_summary(
            &config,
            run.ingest.rows_read,
            &run.prepared,
            &run.inversion.result,
        )
    );

    if config.table {
        println!("{}", crate::report::format_residual_table(&run.residuals));
    }

    if config.plot {
        let plot = crate::plot::render_ascii_plot(
            &run.residuals,
            config.plot_width,
            config.plot_height,
            Some(&run.prepared.velocity_gaps),
        );
        println!("{plot}");
    }

    if let Some(path) = &config.export_results {
        crate::io::write_results_csv(path, &run.residuals)?;
        info!(path = %path.display(), "wrote results CSV");
    }
    if let Some(path) = &config.export_json {
        let file =
            crate::io::build_fit_file(&config, &run.prepared, &run.inversion, &run.residuals);
        crate::io::write_fit_json(path, &file)?;
        info!(path = %path.display(), "wrote result JSON");
    }

    Ok(())
}

fn handle_synth(args: &SynthArgs) -> Result<(), AppError> {
    let spec = synthetic_spec_from_args(args)?;
    let exp = generate_experiment(&spec)?;

    let preamble = format!(
        "Synthetic direct shear test: dil_fact={} d_c={} dil_ang={} seed={}",
        spec.params.dil_fact, spec.params.d_c, spec.params.dil_ang, spec.seed
    );
    crate::io::write_table_csv(&args.output, &exp.table, Some(&preamble))?;
    info!(path = %args.output.display(), rows = exp.table.len(), "wrote synthetic table");

    println!(
        "dilfit fit --input {} --preslip {} {} --window {} {} --b-max {} --dt {}",
        args.output.display(),
        exp.preslip.start,
        exp.preslip.end,
        exp.window.start,
        exp.window.end,
        spec.b_max,
        spec.dt_acq,
    );
    Ok(())
}

fn handle_plot(args: &PlotArgs) -> Result<(), AppError> {
    let fit = crate::io::read_fit_json(&args.result)?;
    println!(
        "Best fit: dil_fact={:.8} d_c={:.8} dil_ang={:.6} | objective={:.6e}",
        fit.params.dil_fact, fit.params.d_c, fit.params.dil_ang, fit.score
    );
    let plot = crate::plot::render_ascii_plot_from_fit_file(&fit, args.width, args.height);
    println!("{plot}");
    Ok(())
}

pub fn fit_config_from_args(args: &FitArgs) -> Result<FitConfig, AppError> {
    let defaults = ParamBounds::default();
    let lower = triple_or(args.lower.as_deref(), defaults.lower, "--lower")?;
    let upper = triple_or(args.upper.as_deref(), defaults.upper, "--upper")?;
    let bounds = ParamBounds::new(lower, upper)?;

    let initial_guess = match args.initial_guess.as_deref() {
        Some(v) => {
            let guess = DilationParams::from_array(triple(v, "--initial-guess")?);
            bounds
                .check(&guess)
                .map_err(|e| AppError::new(2, format!("--initial-guess: {e}")))?;
            Some(guess)
        }
        None => None,
    };

    let ga = GaConfig {
        population_size: args.population,
        max_iterations: args.iterations,
        precision: args.precision,
        prob_mutation: args.prob_mutation,
        tournament_size: args.tournament,
        seed: args.seed,
        initial_guess,
        log_every: args.log_every,
    };
    ga.validate()?;

    Ok(FitConfig {
        input: args.input.clone(),
        skip_rows: args.skip_rows,
        preslip: window_from(&args.preslip, "--preslip")?,
        window: window_from(&args.window, "--window")?,
        b_max: args.b_max,
        dt_acq: args.dt_acq,
        bounds,
        ga,
        plot: args.plot,
        plot_width: args.width,
        plot_height: args.height,
        table: args.table,
        export_results: args.export.clone(),
        export_json: args.export_json.clone(),
    })
}

fn synthetic_spec_from_args(args: &SynthArgs) -> Result<SyntheticSpec, AppError> {
    Ok(SyntheticSpec {
        params: DilationParams::new(args.dil_fact, args.d_c, args.dil_ang),
        n_rows: args.rows,
        preslip: window_from(&args.preslip, "--preslip")?,
        window: window_from(&args.window, "--window")?,
        b_max: args.b_max,
        norm_stiff: args.stiffness,
        dt_acq: args.dt_acq,
        v_mean: args.velocity,
        v_jitter: args.jitter,
        aperture_noise: args.noise,
        seed: args.seed,
        ..SyntheticSpec::default()
    })
}

fn window_from(v: &[usize], flag: &str) -> Result<AnalysisWindow, AppError> {
    match v {
        [start, end] if start < end => Ok(AnalysisWindow::new(*start, *end)),
        [start, end] => Err(AppError::new(
            2,
            format!("{flag} needs START < END (got {start} {end})."),
        )),
        _ => Err(AppError::new(2, format!("{flag} takes exactly two row indices."))),
    }
}

fn triple(v: &[f64], flag: &str) -> Result<[f64; 3], AppError> {
    <[f64; 3]>::try_from(v)
        .map_err(|_| AppError::new(2, format!("{flag} takes exactly three values.")))
}

fn triple_or(v: Option<&[f64]>, default: [f64; 3], flag: &str) -> Result<[f64; 3], AppError> {
    v.map_or(Ok(default), |v| triple(v, flag))
}
