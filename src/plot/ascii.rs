//! ASCII plotting for terminal output.
//!
//! Fixed-size grid with deterministic output (helpful for golden tests).
//!
//! Plot elements, against slip displacement:
//! - observed aperture: `o`
//! - modeled aperture: `-` line
//! - flagged zero-velocity samples: `x`

use std::collections::HashSet;

use crate::domain::{ApertureResidual, FitFile, VelocityGap};

/// Render observed vs modeled aperture for an in-memory run.
pub fn render_ascii_plot(
    series: &[ApertureResidual],
    width: usize,
    height: usize,
    gaps: Option<&[VelocityGap]>,
) -> String {
    let flagged: HashSet<usize> = gaps
        .map(|g| g.iter().map(|gap| gap.row).collect())
        .unwrap_or_default();
    render_plot(series, width, height, &flagged)
}

/// Render a plot from a saved result file.
pub fn render_ascii_plot_from_fit_file(fit: &FitFile, width: usize, height: usize) -> String {
    render_ascii_plot(&fit.series, width, height, Some(&fit.velocity_gaps))
}

fn render_plot(
    series: &[ApertureResidual],
    width: usize,
    height: usize,
    flagged: &HashSet<usize>,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (u_min, u_max) = slip_range(series).unwrap_or((0.0, 1.0));
    let (b_min, b_max) = aperture_range(series).unwrap_or((0.0, 1.0));
    let (b_min, b_max) = pad_range(b_min, b_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Model first so observations overlay it.
    let curve: Vec<(f64, f64)> = series.iter().map(|r| (r.slip_disp, r.b_mod)).collect();
    draw_curve(&mut grid, &curve, u_min, u_max, b_min, b_max);

    for r in series {
        if !r.b_exp.is_finite() {
            continue;
        }
        let x = map_x(r.slip_disp, u_min, u_max, width);
        let y = map_y(r.b_exp, b_min, b_max, height);
        grid[y][x] = if flagged.contains(&r.row) { 'x' } else { 'o' };
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: slip=[{u_min:.3}, {u_max:.3}] | aperture=[{b_min:.4}, {b_max:.4}]\n"
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out
}

fn slip_range(series: &[ApertureResidual]) -> Option<(f64, f64)> {
    finite_range(series.iter().map(|r| r.slip_disp))
}

fn aperture_range(series: &[ApertureResidual]) -> Option<(f64, f64)> {
    finite_range(series.iter().flat_map(|r| [r.b_exp, r.b_mod]))
}

fn finite_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values.filter(|v| v.is_finite()) {
        min = min.min(v);
        max = max.max(v);
    }
    if min.is_finite() && max.is_finite() && max > min {
        Some((min, max))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(u: f64, u_min: f64, u_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let t = ((u - u_min) / (u_max - u_min)).clamp(0.0, 1.0);
    (t * (width as f64 - 1.0)).round() as usize
}

fn map_y(b: f64, b_min: f64, b_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let t = ((b - b_min) / (b_max - b_min)).clamp(0.0, 1.0);
    // Largest aperture on row 0.
    (height as f64 - 1.0 - (t * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(
    grid: &mut [Vec<char>],
    curve: &[(f64, f64)],
    u_min: f64,
    u_max: f64,
    b_min: f64,
    b_max: f64,
) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(u, b) in curve.iter().filter(|(u, b)| u.is_finite() && b.is_finite()) {
        let x = map_x(u, u_min, u_max, width);
        let y = map_y(b, b_min, b_max, height);
        match prev {
            Some((x0, y0)) => draw_line(grid, x0, y0, x, y, '-'),
            None => grid[y][x] = '-',
        }
        prev = Some((x, y));
    }
}

/// Integer line drawing (Bresenham).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GapKind;

    fn point(row: usize, slip_disp: f64, b_exp: f64, b_mod: f64) -> ApertureResidual {
        ApertureResidual {
            row,
            slip_disp,
            velocity: 0.01,
            b_exp,
            b_mod,
            residual: b_exp - b_mod,
        }
    }

    #[test]
    fn plot_golden_snapshot_small() {
        let series = vec![point(1, 1.0, 1.0, 1.0), point(2, 2.0, 1.2, 1.0)];

        let txt = render_ascii_plot(&series, 10, 5, None);
        let expected = concat!(
            "Plot: slip=[1.000, 2.000] | aperture=[0.9900, 1.2100]\n",
            "         o\n",
            "          \n",
            "          \n",
            "          \n",
            "o---------\n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn flagged_rows_are_marked() {
        let series = vec![point(1, 1.0, 1.0, 1.0), point(2, 2.0, 1.2, 1.0)];
        let gaps = [VelocityGap {
            row: 2,
            kind: GapKind::Boundary,
        }];
        let txt = render_ascii_plot(&series, 10, 5, Some(&gaps));
        let lines: Vec<&str> = txt.lines().collect();
        assert_eq!(lines[1], "         x");
        assert_eq!(lines[5], "o---------");
    }

    #[test]
    fn saved_result_keeps_gap_markers() {
        use crate::domain::{AnalysisWindow, DilationParams, GaConfig, ParamBounds};

        let fit = FitFile {
            tool: "dilation-inversion".to_string(),
            generated_at: chrono::Utc::now(),
            input: None,
            preslip: AnalysisWindow::new(0, 1),
            window: AnalysisWindow::new(0, 2),
            norm_stiff: 100.0,
            dt_acq: 1.0,
            bounds: ParamBounds::default(),
            ga: GaConfig::default(),
            params: DilationParams::new(0.1, 0.5, 5.0),
            score: 0.0,
            evaluations: 0,
            iterations: 0,
            history_tail: Vec::new(),
            velocity_gaps: vec![VelocityGap {
                row: 2,
                kind: GapKind::Run,
            }],
            series: vec![point(1, 1.0, 1.0, 1.0), point(2, 2.0, 1.2, 1.0)],
        };
        let txt = render_ascii_plot_from_fit_file(&fit, 10, 5);
        assert_eq!(txt.lines().nth(1), Some("         x"));
    }

    #[test]
    fn degenerate_series_still_renders() {
        let txt = render_ascii_plot(&[], 12, 6, None);
        assert_eq!(txt.lines().count(), 7);
    }
}
