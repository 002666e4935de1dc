//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the model/fitting code stays clean and testable
//! - output changes are localized (covered by snapshot-style tests)

use crate::data::PreparedExperiment;
use crate::domain::{ApertureResidual, FitConfig, FitResult, GapKind, VelocityGap};

/// Format the full run summary (dataset, preprocessing, GA settings, best fit).
pub fn format_run_summary(
    config: &FitConfig,
    rows: usize,
    prepared: &PreparedExperiment,
    result: &FitResult,
) -> String {
    let mut out = String::new();
    let inputs = &prepared.inputs;

    out.push_str("=== dilfit - Shear Dilation Inversion ===\n");
    out.push_str(&format!("Input: {}\n", config.input.display()));
    out.push_str(&format!("Rows: n={rows}\n"));
    out.push_str(&format!(
        "Pre-slip window: [{}, {}] | analysis window: [{}, {}] ({} compared samples)\n",
        prepared.preslip.start,
        prepared.preslip.end,
        inputs.window.start,
        inputs.window.end,
        inputs.observed().len(),
    ));
    out.push_str(&format!(
        "Normal stiffness: {:.6} | initial aperture: {:.6} | b_0: {:.6}\n",
        prepared.norm_stiff, prepared.b_ini, inputs.b_0,
    ));
    out.push_str(&format!(
        "Velocity gaps: {} interpolated, {} flagged\n",
        prepared.interpolated,
        prepared.velocity_gaps.len(),
    ));
    if !prepared.velocity_gaps.is_empty() {
        out.push_str(&format!("  flagged rows: {}\n", fmt_gaps(&prepared.velocity_gaps)));
    }

    let ga = &config.ga;
    out.push_str("\nGenetic algorithm:\n");
    out.push_str(&format!(
        "- population={} iterations={} precision={:e} p_mut={} tournament={} seed={}\n",
        ga.population_size,
        ga.max_iterations,
        ga.precision,
        ga.prob_mutation,
        ga.tournament_size,
        ga.seed,
    ));
    out.push_str(&format!(
        "- lower bounds: {}\n- upper bounds: {}\n",
        fmt_vec(&config.bounds.lower),
        fmt_vec(&config.bounds.upper),
    ));
    out.push_str(&format!(
        "- evaluations={} iterations run={}\n",
        result.evaluations, result.iterations,
    ));

    out.push('\n');
    out.push_str(&format!("Best-fit dilation factor: {:.8}\n", result.params.dil_fact));
    out.push_str(&format!("Best-fit D_c: {:.8}\n", result.params.d_c));
    out.push_str(&format!("Best-fit dilation angle: {:.6} deg\n", result.params.dil_ang));
    out.push_str(&format!("Lowest value of objective function: {:.6e}\n", result.score));
    out.push('\n');

    out
}

/// Format the per-sample residual table.
pub fn format_residual_table(rows: &[ApertureResidual]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:>7} {:>12} {:>12} {:>12} {:>12} {:>12}\n",
        "row", "slip_disp", "velocity", "b_exp", "b_mod", "residual"
    ));
    out.push_str(&format!(
        "{:-<7} {:-<12} {:-<12} {:-<12} {:-<12} {:-<12}\n",
        "", "", "", "", "", ""
    ));
    for r in rows {
        out.push_str(&format!(
            "{:>7} {:>12.6} {:>12.6} {:>12.6} {:>12.6} {:>12.3e}\n",
            r.row, r.slip_disp, r.velocity, r.b_exp, r.b_mod, r.residual,
        ));
    }
    out
}

fn fmt_gaps(gaps: &[VelocityGap]) -> String {
    let parts: Vec<String> = gaps
        .iter()
        .map(|g| match g.kind {
            GapKind::Boundary => format!("{} (boundary)", g.row),
            GapKind::Run => format!("{} (run)", g.row),
        })
        .collect();
    parts.join(", ")
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x}")).collect();
    format!("[{}]", parts.join(", "))
}
