//! Synthetic direct-shear experiments with known dilation parameters.
//!
//! The generated table runs through the same preprocessing as laboratory
//! data, so it doubles as an end-to-end check: preparing the table must give
//! back the aperture series that was injected here.
//!
//! Layout of a generated test:
//! - rows `0..=preslip.end`: linear normal loading (elastic closure only)
//! - a few rows before the window: sliding starts, aperture still elastic
//! - the analysis window: stress unloads linearly and the aperture follows the
//!   forward model (plus optional Gaussian noise)
//! - after the window: everything holds its last value

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::data::preprocess::slip_velocity;
use crate::domain::{AnalysisWindow, DilationParams, InversionInputs, ShearTestTable};
use crate::error::AppError;
use crate::models::forward_aperture;

/// Rows of sliding before the analysis window starts.
const LEAD_IN_ROWS: usize = 10;

/// Lowest velocity factor, keeps the generated velocity strictly positive.
const MIN_VELOCITY_FACTOR: f64 = 0.05;

#[derive(Debug, Clone)]
pub struct SyntheticSpec {
    pub params: DilationParams,
    pub n_rows: usize,
    pub preslip: AnalysisWindow,
    pub window: AnalysisWindow,
    pub b_max: f64,
    pub norm_stiff: f64,
    pub dt_acq: f64,
    /// Normal stress at the first row.
    pub sigma0: f64,
    /// Normal stress reached at the end of the pre-slip segment.
    pub sigma_peak: f64,
    /// Normal stress drop per row inside the window.
    pub unload_rate: f64,
    /// Normal displacement at the first row.
    pub nd0: f64,
    pub v_mean: f64,
    /// Relative standard deviation of the slip velocity.
    pub v_jitter: f64,
    /// Standard deviation of the aperture noise (length units).
    pub aperture_noise: f64,
    pub seed: u64,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            params: DilationParams::new(0.05, 0.3, 2.0),
            n_rows: 400,
            preslip: AnalysisWindow::new(20, 120),
            window: AnalysisWindow::new(150, 350),
            b_max: crate::domain::DEFAULT_B_MAX,
            norm_stiff: 120.0,
            dt_acq: 1.0,
            sigma0: 0.5,
            sigma_peak: 5.0,
            unload_rate: 0.002,
            nd0: 0.2,
            v_mean: 0.01,
            v_jitter: 0.2,
            aperture_noise: 0.0,
            seed: 42,
        }
    }
}

/// A generated table together with the series that were injected into it.
#[derive(Debug, Clone)]
pub struct SyntheticExperiment {
    pub table: ShearTestTable,
    pub truth: DilationParams,
    pub b_exp: Vec<f64>,
    pub preslip: AnalysisWindow,
    pub window: AnalysisWindow,
}

pub fn generate_experiment(spec: &SyntheticSpec) -> Result<SyntheticExperiment, AppError> {
    validate(spec)?;

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;

    let n = spec.n_rows;
    let p = spec.preslip;
    let w = spec.window;
    let k = spec.norm_stiff;

    // Normal stress.
    let mut stress = Vec::with_capacity(n);
    for i in 0..n {
        let s = if i <= p.end {
            spec.sigma0 + (spec.sigma_peak - spec.sigma0) * i as f64 / p.end as f64
        } else if i <= w.start {
            spec.sigma_peak
        } else {
            let j = i.min(w.end) - w.start;
            spec.sigma_peak - spec.unload_rate * j as f64
        };
        stress.push(s);
    }

    // Slip displacement.
    let slide_start = p.end.max(w.start.saturating_sub(LEAD_IN_ROWS));
    let mut slip = vec![0.0; n];
    for i in 1..n {
        let step = if i > slide_start && i <= w.end {
            let factor = (1.0 + spec.v_jitter * normal.sample(&mut rng)).max(MIN_VELOCITY_FACTOR);
            spec.v_mean * factor * spec.dt_acq
        } else {
            0.0
        };
        slip[i] = slip[i - 1] + step;
    }
    let velocity = slip_velocity(&slip, spec.dt_acq);

    // Elastic aperture before the window.
    let b_ini = spec.b_max - stress[0] / k;
    let mut normal_disp: Vec<f64> = stress
        .iter()
        .map(|s| spec.nd0 + (s - spec.sigma0) / k)
        .collect();

    // Aperture inside the window from the forward model.
    let b_start = b_ini - (normal_disp[w.start] - spec.nd0);
    let scaffold = InversionInputs::new(
        vec![b_start; w.len()],
        slip[w.start],
        slip[w.start + 1..=w.end].to_vec(),
        velocity[w.start + 1..=w.end].to_vec(),
        spec.dt_acq,
        k,
        w,
    );
    let b_mod = forward_aperture(&scaffold, &spec.params)
        .map_err(|e| AppError::new(4, format!("Synthetic forward model failed: {e}")))?;

    let mut b_exp = Vec::with_capacity(w.len());
    b_exp.push(b_start);
    for b in b_mod {
        let noise = if spec.aperture_noise > 0.0 {
            spec.aperture_noise * normal.sample(&mut rng)
        } else {
            0.0
        };
        b_exp.push(b + noise);
    }

    // Invert the preprocessing: b_exp = b_ini - (nd - nd0) + (σ - σ_w0) / k.
    let sigma_w0 = stress[w.start];
    for (j, &b) in b_exp.iter().enumerate() {
        let row = w.start + j;
        let aperture = b - (stress[row] - sigma_w0) / k;
        normal_disp[row] = spec.nd0 + b_ini - aperture;
    }
    let last = normal_disp[w.end];
    for nd in normal_disp.iter_mut().skip(w.end + 1) {
        *nd = last;
    }

    Ok(SyntheticExperiment {
        table: ShearTestTable {
            slip_disp: slip,
            normal_stress: stress,
            normal_disp: normal_disp.into_iter().map(Some).collect(),
        },
        truth: spec.params,
        b_exp,
        preslip: p,
        window: w,
    })
}

fn validate(spec: &SyntheticSpec) -> Result<(), AppError> {
    if !spec.preslip.fits(spec.n_rows) || !spec.window.fits(spec.n_rows) {
        return Err(AppError::new(2, "Synthetic windows must lie inside the table."));
    }
    if spec.preslip.end >= spec.window.start {
        return Err(AppError::new(
            2,
            "Synthetic pre-slip segment must end before the analysis window starts.",
        ));
    }
    let positive = [spec.norm_stiff, spec.dt_acq, spec.v_mean];
    if positive.iter().any(|v| !(v.is_finite() && *v > 0.0)) {
        return Err(AppError::new(
            2,
            "Synthetic stiffness, interval, and mean velocity must be finite and > 0.",
        ));
    }
    if !(spec.sigma_peak.is_finite() && spec.sigma0.is_finite() && spec.sigma_peak != spec.sigma0) {
        return Err(AppError::new(2, "Synthetic loading needs distinct finite stresses."));
    }
    if spec.v_jitter < 0.0 || spec.aperture_noise < 0.0 {
        return Err(AppError::new(2, "Synthetic noise levels must be >= 0."));
    }
    Ok(())
}
