//! Turn a raw direct-shear table into inversion inputs.
//!
//! Every step is a pure transformation returning new vectors; the raw table is
//! never edited in place. Order matters and follows the laboratory workflow:
//!
//! 1. slip velocity from the *raw* displacement (negative values clamped to 0)
//! 2. displacement made non-decreasing (running maximum)
//! 3. isolated zero velocities inside the window replaced by the neighbour mean
//! 4. apparatus normal stiffness from a line fit over the pre-slip segment
//! 5. aperture over the whole test, then corrected for unloading in the window

use tracing::{debug, info, warn};

use crate::domain::{AnalysisWindow, GapKind, InversionInputs, ShearTestTable, VelocityGap};
use crate::error::PrepError;
use crate::math::polyfit_linear;

/// Options for preparing one experiment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrepOptions {
    pub preslip: AnalysisWindow,
    pub window: AnalysisWindow,
    /// Maximum aperture (RMS asperity height).
    pub b_max: f64,
    pub dt_acq: f64,
}

/// Cleaned series plus the inversion inputs derived from them.
#[derive(Debug, Clone)]
pub struct PreparedExperiment {
    pub inputs: InversionInputs,
    pub preslip: AnalysisWindow,
    pub norm_stiff: f64,
    /// Aperture at the onset of the test.
    pub b_ini: f64,
    /// Cleaned (non-decreasing) slip displacement, whole table.
    pub slip_disp: Vec<f64>,
    /// Slip velocity over the analysis window after gap interpolation.
    pub window_velocity: Vec<f64>,
    /// Zero-velocity samples that were flagged rather than interpolated.
    pub velocity_gaps: Vec<VelocityGap>,
    /// Number of isolated zero-velocity samples that were interpolated.
    pub interpolated: usize,
}

/// Forward-difference slip velocity; the first sample and negative values are 0.
pub fn slip_velocity(slip_disp: &[f64], dt_acq: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(slip_disp.len());
    if slip_disp.is_empty() {
        return out;
    }
    out.push(0.0);
    for w in slip_disp.windows(2) {
        out.push(((w[1] - w[0]) / dt_acq).max(0.0));
    }
    out
}

/// Running maximum: a sample below its (cleaned) predecessor takes its value.
pub fn enforce_monotonic(slip_disp: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(slip_disp.len());
    for &u in slip_disp {
        let cleaned = match out.last() {
            Some(&prev) if u < prev => prev,
            _ => u,
        };
        out.push(cleaned);
    }
    out
}

/// Replace isolated zero velocities by the mean of their neighbours.
///
/// Sample 0 is the window baseline: its velocity never enters the model and
/// is neither read nor filled. Zeros on the first modeled sample (1) or the
/// last sample, and zeros inside runs, are left untouched and reported. Other
/// zeros whose two neighbours are non-zero take the neighbour mean.
/// `row_offset` maps local indices back to table rows.
pub fn interpolate_velocity_gaps(
    v: &[f64],
    row_offset: usize,
) -> (Vec<f64>, Vec<VelocityGap>, usize) {
    let mut out = v.to_vec();
    let mut gaps = Vec::new();
    let mut filled = 0usize;
    let n = v.len();

    for i in 1..n {
        if v[i] != 0.0 {
            continue;
        }
        if i == 1 || i + 1 == n {
            gaps.push(VelocityGap {
                row: row_offset + i,
                kind: GapKind::Boundary,
            });
            continue;
        }
        if v[i - 1] == 0.0 || v[i + 1] == 0.0 {
            gaps.push(VelocityGap {
                row: row_offset + i,
                kind: GapKind::Run,
            });
            continue;
        }
        out[i] = 0.5 * (v[i - 1] + v[i + 1]);
        filled += 1;
    }

    (out, gaps, filled)
}

/// Apparatus normal stiffness `1 / slope` of normal displacement vs stress.
pub fn normal_stiffness(stress: &[f64], normal_disp: &[f64]) -> Result<f64, PrepError> {
    let fit = polyfit_linear(stress, normal_disp).ok_or_else(|| {
        PrepError::Stiffness(format!(
            "line fit over {} points is degenerate (constant or non-finite stress)",
            stress.len()
        ))
    })?;
    if !(fit.slope.is_finite() && fit.slope.abs() > 1e-15) {
        return Err(PrepError::Stiffness(format!(
            "fitted slope {} gives no finite stiffness",
            fit.slope
        )));
    }
    Ok(1.0 / fit.slope)
}

/// Prepare inversion inputs from a raw table.
pub fn prepare(
    table: &ShearTestTable,
    opts: &PrepOptions,
) -> Result<PreparedExperiment, PrepError> {
    let n = table.len();
    if !(opts.dt_acq.is_finite() && opts.dt_acq > 0.0) {
        return Err(PrepError::InvalidInterval(opts.dt_acq));
    }
    check_window("pre-slip", opts.preslip, n)?;
    check_window("analysis", opts.window, n)?;
    if table.normal_stress.len() != n || table.normal_disp.len() != n {
        return Err(PrepError::InvalidWindow {
            label: "table",
            start: 0,
            end: n.saturating_sub(1),
            len: table.normal_stress.len().min(table.normal_disp.len()),
        });
    }
    check_finite("slip displacement", &table.slip_disp)?;
    check_finite("normal stress", &table.normal_stress)?;

    let velocity = slip_velocity(&table.slip_disp, opts.dt_acq);
    let slip_disp = enforce_monotonic(&table.slip_disp);

    let w = opts.window;
    let (window_velocity, velocity_gaps, interpolated) =
        interpolate_velocity_gaps(&velocity[w.start..=w.end], w.start);
    if interpolated > 0 {
        debug!(interpolated, "filled isolated zero-velocity samples");
    }
    for gap in &velocity_gaps {
        warn!(row = gap.row, kind = ?gap.kind, "zero slip velocity left unfilled");
    }

    // Normal stiffness from the pre-slip segment.
    let p = opts.preslip;
    let stress_pre = &table.normal_stress[p.start..=p.end];
    let disp_pre = defined_segment(table, p, "pre-slip")?;
    let norm_stiff = normal_stiffness(stress_pre, &disp_pre)?;

    // Aperture over the whole test, relative to the first sample.
    let nd0 = table.normal_disp[0].ok_or(PrepError::MissingValue {
        row: 0,
        column: "normal displacement",
        label: "reference",
    })?;
    let b_ini = opts.b_max - table.normal_stress[0] / norm_stiff;

    let disp_win = defined_segment(table, w, "analysis")?;
    let sigma_w0 = table.normal_stress[w.start];
    let b_exp: Vec<f64> = disp_win
        .iter()
        .zip(&table.normal_stress[w.start..=w.end])
        .map(|(&nd, &sigma)| {
            let aperture = b_ini - (nd - nd0);
            let deform_unload = (sigma - sigma_w0) / norm_stiff;
            aperture + deform_unload
        })
        .collect();

    let inputs = InversionInputs::new(
        b_exp,
        slip_disp[w.start],
        slip_disp[w.start + 1..=w.end].to_vec(),
        window_velocity[1..].to_vec(),
        opts.dt_acq,
        norm_stiff,
        w,
    );

    info!(
        rows = n,
        norm_stiff,
        b_ini,
        window_samples = w.len(),
        flagged_gaps = velocity_gaps.len(),
        "prepared experiment"
    );

    Ok(PreparedExperiment {
        inputs,
        preslip: p,
        norm_stiff,
        b_ini,
        slip_disp,
        window_velocity,
        velocity_gaps,
        interpolated,
    })
}

fn check_window(label: &'static str, w: AnalysisWindow, len: usize) -> Result<(), PrepError> {
    if w.fits(len) {
        Ok(())
    } else {
        Err(PrepError::InvalidWindow {
            label,
            start: w.start,
            end: w.end,
            len,
        })
    }
}

fn check_finite(column: &'static str, values: &[f64]) -> Result<(), PrepError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(row) => Err(PrepError::NonFinite {
            row,
            column,
            value: values[row],
        }),
        None => Ok(()),
    }
}

/// Normal displacement over `w`, failing on the first undefined sample.
fn defined_segment(
    table: &ShearTestTable,
    w: AnalysisWindow,
    label: &'static str,
) -> Result<Vec<f64>, PrepError> {
    (w.start..=w.end)
        .map(|row| match table.normal_disp[row] {
            Some(v) if v.is_finite() => Ok(v),
            Some(v) => Err(PrepError::NonFinite {
                row,
                column: "normal displacement",
                value: v,
            }),
            None => Err(PrepError::MissingValue {
                row,
                column: "normal displacement",
                label,
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn velocity_clamps_negative_steps() {
        let v = slip_velocity(&[0.0, 0.1, 0.3, 0.25, 0.4], 1.0);
        assert_eq!(v.len(), 5);
        assert_eq!(v[0], 0.0);
        assert_abs_diff_eq!(v[1], 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(v[2], 0.2, epsilon = 1e-12);
        assert_eq!(v[3], 0.0);
        assert_abs_diff_eq!(v[4], 0.15, epsilon = 1e-12);
    }

    #[test]
    fn velocity_respects_interval() {
        let v = slip_velocity(&[0.0, 1.0], 0.5);
        assert_eq!(v, vec![0.0, 2.0]);
    }

    #[test]
    fn monotonic_uses_running_maximum() {
        let u = enforce_monotonic(&[0.0, 0.2, 0.1, 0.15, 0.3, 0.29]);
        assert_eq!(u, vec![0.0, 0.2, 0.2, 0.2, 0.3, 0.3]);
    }

    #[test]
    fn isolated_zero_is_interpolated() {
        let (v, gaps, filled) = interpolate_velocity_gaps(&[0.1, 0.2, 0.0, 0.4, 0.3], 100);
        assert_abs_diff_eq!(v[2], 0.3, epsilon = 1e-12);
        assert!(gaps.is_empty());
        assert_eq!(filled, 1);
    }

    #[test]
    fn runs_and_boundary_zeros_are_flagged() {
        let (v, gaps, filled) = interpolate_velocity_gaps(&[0.0, 0.2, 0.0, 0.0, 0.3, 0.0], 10);
        assert_eq!(filled, 0);
        assert_eq!(v, vec![0.0, 0.2, 0.0, 0.0, 0.3, 0.0]);
        assert_eq!(
            gaps,
            vec![
                VelocityGap { row: 12, kind: GapKind::Run },
                VelocityGap { row: 13, kind: GapKind::Run },
                VelocityGap { row: 15, kind: GapKind::Boundary },
            ]
        );
    }

    #[test]
    fn first_modeled_zero_ignores_baseline_velocity() {
        let (v, gaps, filled) = interpolate_velocity_gaps(&[0.3, 0.0, 0.2, 0.2], 40);
        assert_eq!(filled, 0);
        assert_eq!(v, vec![0.3, 0.0, 0.2, 0.2]);
        assert_eq!(
            gaps,
            vec![VelocityGap {
                row: 41,
                kind: GapKind::Boundary
            }]
        );
    }

    #[test]
    fn stiffness_is_inverse_slope() {
        let stress: Vec<f64> = (0..10).map(|i| 1.0 + 0.5 * i as f64).collect();
        let disp: Vec<f64> = stress.iter().map(|s| s / 250.0 + 0.01).collect();
        let k = normal_stiffness(&stress, &disp).unwrap();
        assert_abs_diff_eq!(k, 250.0, epsilon = 1e-6);
    }

    #[test]
    fn constant_stress_has_no_stiffness() {
        assert!(matches!(
            normal_stiffness(&[2.0, 2.0, 2.0], &[0.1, 0.2, 0.3]),
            Err(PrepError::Stiffness(_))
        ));
    }

    fn tiny_table() -> ShearTestTable {
        // rows 0..=3 loading, 4..=9 sliding
        let slip_disp = vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.1, 0.2, 0.18, 0.35, 0.5];
        let normal_stress: Vec<f64> = vec![1.0, 2.0, 3.0, 4.0, 4.0, 3.9, 3.8, 3.7, 3.6, 3.5];
        let normal_disp = normal_stress
            .iter()
            .enumerate()
            .map(|(i, s)| Some(s / 100.0 - if i >= 4 { 0.001 * (i - 4) as f64 } else { 0.0 }))
            .collect();
        ShearTestTable {
            slip_disp,
            normal_stress,
            normal_disp,
        }
    }

    #[test]
    fn prepare_builds_aligned_inputs() {
        let table = tiny_table();
        let opts = PrepOptions {
            preslip: AnalysisWindow::new(0, 3),
            window: AnalysisWindow::new(4, 9),
            b_max: 1.34,
            dt_acq: 1.0,
        };
        let prep = prepare(&table, &opts).unwrap();
        let inputs = &prep.inputs;

        assert_abs_diff_eq!(prep.norm_stiff, 100.0, epsilon = 1e-8);
        assert_abs_diff_eq!(prep.b_ini, 1.34 - 0.01, epsilon = 1e-10);
        assert_eq!(inputs.b_exp.len(), 6);
        assert_eq!(inputs.u_end.len(), 5);
        assert_eq!(inputs.v.len(), 5);
        assert_eq!(inputs.b_0, inputs.b_exp[0]);
        assert_eq!(inputs.u0_ini, 0.0);
        // Row 7 went backwards: displacement held, velocity clamped then interpolated.
        assert_eq!(inputs.u_end[2], 0.2);
        assert_abs_diff_eq!(inputs.v[2], 0.5 * (0.1 + 0.17), epsilon = 1e-12);
        assert_eq!(prep.interpolated, 1);
        assert!(prep.velocity_gaps.is_empty());

        // Unloading is removed: only the opening trend of 0.001/row remains.
        for (j, b) in inputs.b_exp.iter().enumerate() {
            assert_abs_diff_eq!(*b, prep.b_ini - 0.03 + 0.001 * j as f64, epsilon = 1e-10);
        }
    }

    #[test]
    fn prepare_rejects_bad_windows_and_missing_values() {
        let table = tiny_table();
        let opts = PrepOptions {
            preslip: AnalysisWindow::new(0, 3),
            window: AnalysisWindow::new(4, 10),
            b_max: 1.34,
            dt_acq: 1.0,
        };
        assert!(matches!(
            prepare(&table, &opts),
            Err(PrepError::InvalidWindow { label: "analysis", .. })
        ));

        let mut holes = tiny_table();
        holes.normal_disp[6] = None;
        let opts = PrepOptions {
            window: AnalysisWindow::new(4, 9),
            ..opts
        };
        assert_eq!(
            prepare(&holes, &opts).unwrap_err(),
            PrepError::MissingValue {
                row: 6,
                column: "normal displacement",
                label: "analysis"
            }
        );
    }
}
