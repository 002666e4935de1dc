//! Forward model of fracture aperture during stable sliding.
//!
//! The modeled aperture is the sum of two contributions:
//!
//! - a displacement-dependent part, `b0 + (u - u0) * tan(ψ)` (roughness
//!   climbing at dilation angle `ψ`)
//! - a rate-and-state dilation part driven by a contact-age state `θ`
//!
//! The state follows the aging law `dθ/dt = 1 - vθ/D_c`. Within one
//! acquisition step the velocity is taken as constant, so the law is
//! integrated exactly:
//!
//! ```text
//! θ ← D_c/v + (θ - D_c/v) · exp(-Δu / D_c)     (v > 0)
//! θ ← θ + dt                                    (v = 0, pure aging)
//! ```
//!
//! with `Δu` the measured slip increment of the step. The state starts at one
//! acquisition interval (`θ₀ = dt`) and the dilation is
//! `Δφ = -ε · ln(θ / dt)`, so it is zero at the window start, positive when the
//! contact population is renewed faster than it ages, and negative (compaction)
//! otherwise.
//!
//! The exact step update stays bounded for `D_c` down to `1e-5`, where
//! `v·dt/D_c` is huge.

use crate::domain::{DilationParams, InversionInputs};
use crate::error::FitError;

/// Displacement-dependent aperture for each sample of `u_end`.
///
/// `dil_ang` is in degrees. Returns `b0` unchanged for `dil_ang = 0`.
pub fn aperture_slip_disp(b0: f64, u_end: &[f64], u0_ini: f64, dil_ang: f64) -> Vec<f64> {
    if dil_ang == 0.0 {
        return vec![b0; u_end.len()];
    }
    let slope = dil_ang.to_radians().tan();
    u_end.iter().map(|&u| b0 + (u - u0_ini) * slope).collect()
}

/// Running contact-age state threaded through a window, one sample at a time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DilationState {
    theta: f64,
    prev_u: Option<f64>,
    dt_acq: f64,
}

impl DilationState {
    /// State at the window start.
    pub fn new(dt_acq: f64) -> Self {
        Self {
            theta: dt_acq,
            prev_u: None,
            dt_acq,
        }
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    /// Advance by one sample with slip displacement `u` and velocity `v`.
    pub fn advance(&mut self, u: f64, v: f64, d_c: f64) {
        let slip = match self.prev_u {
            Some(prev) => (u - prev).max(0.0),
            None => (v * self.dt_acq).max(0.0),
        };
        self.prev_u = Some(u);

        if v > 0.0 {
            let theta_ss = d_c / v;
            self.theta = theta_ss + (self.theta - theta_ss) * (-slip / d_c).exp();
        } else {
            self.theta += self.dt_acq;
        }
    }

    /// Dilation for the current state.
    pub fn dilation(&self, dil_fact: f64) -> f64 {
        -dil_fact * (self.theta / self.dt_acq).ln()
    }
}

/// Dilation state after integrating a whole prefix of the window.
///
/// Self-contained: recomputes from the window start on every call.
pub fn dil_para(
    dil_fact: f64,
    u_prefix: &[f64],
    v_prefix: &[f64],
    d_c: f64,
    dt_acq: f64,
) -> Result<f64, FitError> {
    if u_prefix.len() != v_prefix.len() {
        return Err(FitError::ShapeMismatch {
            context: "dil_para prefix",
            left: u_prefix.len(),
            right: v_prefix.len(),
        });
    }

    let mut state = DilationState::new(dt_acq);
    for (&u, &v) in u_prefix.iter().zip(v_prefix.iter()) {
        state.advance(u, v, d_c);
    }
    Ok(state.dilation(dil_fact))
}

/// Dilation for every prefix length `1..=N` in a single pass.
///
/// Element `i` equals `dil_para(dil_fact, &u[..=i], &v[..=i], d_c, dt_acq)`.
pub fn dilation_trajectory(
    dil_fact: f64,
    u: &[f64],
    v: &[f64],
    d_c: f64,
    dt_acq: f64,
) -> Result<Vec<f64>, FitError> {
    if u.len() != v.len() {
        return Err(FitError::ShapeMismatch {
            context: "dilation trajectory",
            left: u.len(),
            right: v.len(),
        });
    }

    let mut state = DilationState::new(dt_acq);
    let mut out = Vec::with_capacity(u.len());
    for (&ui, &vi) in u.iter().zip(v.iter()) {
        state.advance(ui, vi, d_c);
        out.push(state.dilation(dil_fact));
    }
    Ok(out)
}

/// Combine displacement-dependent aperture with the per-prefix dilation.
pub fn aperture_shear_dil(b_slip: &[f64], d_phi: &[f64]) -> Result<Vec<f64>, FitError> {
    if b_slip.len() != d_phi.len() {
        return Err(FitError::ShapeMismatch {
            context: "aperture_shear_dil",
            left: b_slip.len(),
            right: d_phi.len(),
        });
    }
    Ok(b_slip.iter().zip(d_phi.iter()).map(|(b, p)| b + p).collect())
}

/// Modeled aperture over the window (baseline sample excluded).
pub fn forward_aperture(
    inputs: &InversionInputs,
    params: &DilationParams,
) -> Result<Vec<f64>, FitError> {
    let b_slip = aperture_slip_disp(inputs.b_0, &inputs.u_end, inputs.u0_ini, params.dil_ang);
    let d_phi = dilation_trajectory(
        params.dil_fact,
        &inputs.u_end,
        &inputs.v,
        params.d_c,
        inputs.dt_acq,
    )?;
    aperture_shear_dil(&b_slip, &d_phi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AnalysisWindow;
    use approx::assert_abs_diff_eq;

    fn synthetic_inputs(b_exp: Vec<f64>) -> InversionInputs {
        InversionInputs::new(
            b_exp,
            0.0,
            vec![0.1, 0.2, 0.3, 0.4],
            vec![0.1, 0.1, 0.1, 0.1],
            1.0,
            1.0,
            AnalysisWindow::new(0, 4),
        )
    }

    #[test]
    fn zero_angle_keeps_baseline() {
        let u = [0.0, 0.5, 1.0, 3.0, 3.0];
        let b = aperture_slip_disp(1.3, &u, 0.0, 0.0);
        assert_eq!(b.len(), u.len());
        assert!(b.iter().all(|&x| x == 1.3));
    }

    #[test]
    fn positive_angle_is_monotone_in_slip() {
        let u: Vec<f64> = (0..50).map(|i| 0.2 + 0.01 * i as f64 + 0.001 * (i % 3) as f64).collect();
        for &ang in &[0.5, 5.0, 20.0] {
            let b = aperture_slip_disp(1.0, &u, 0.2, ang);
            for w in b.windows(2) {
                assert!(w[1] >= w[0]);
            }
        }
    }

    #[test]
    fn slip_aperture_uses_tangent_of_degrees() {
        let b = aperture_slip_disp(1.0, &[1.0], 0.0, 45.0);
        assert_abs_diff_eq!(b[0], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn empty_prefix_has_no_dilation() {
        assert_eq!(dil_para(0.3, &[], &[], 0.5, 1.0).unwrap(), 0.0);
    }

    #[test]
    fn trajectory_matches_independent_prefixes() {
        let u = [0.05, 0.12, 0.12, 0.30, 0.41, 0.55];
        let v = [0.05, 0.07, 0.0, 0.18, 0.11, 0.14];
        for &d_c in &[1e-5, 0.01, 0.5, 2.0] {
            let traj = dilation_trajectory(0.2, &u, &v, d_c, 1.0).unwrap();
            assert_eq!(traj.len(), u.len());
            for i in 0..u.len() {
                let single = dil_para(0.2, &u[..=i], &v[..=i], d_c, 1.0).unwrap();
                assert_eq!(traj[i], single, "prefix {i}, d_c={d_c}");
            }
        }
    }

    #[test]
    fn steady_sliding_relaxes_to_rate_dependent_level() {
        // After many characteristic distances θ → D_c / v.
        let n = 400;
        let v = vec![0.1; n];
        let u: Vec<f64> = (1..=n).map(|i| 0.1 * i as f64).collect();
        let d_c = 0.05;
        let phi = dil_para(0.1, &u, &v, d_c, 1.0).unwrap();
        let expected = -0.1 * (d_c / 0.1_f64).ln();
        assert_abs_diff_eq!(phi, expected, epsilon = 1e-12);
        assert!(phi > 0.0);
    }

    #[test]
    fn zero_velocity_ages_the_contact() {
        let mut s = DilationState::new(1.0);
        s.advance(0.0, 0.0, 0.5);
        s.advance(0.0, 0.0, 0.5);
        assert_abs_diff_eq!(s.theta(), 3.0, epsilon = 1e-15);
        assert!(s.dilation(0.1) < 0.0);
    }

    #[test]
    fn tiny_dc_stays_finite() {
        let traj = dilation_trajectory(0.5, &[0.1, 0.2, 0.3], &[0.1, 0.1, 0.1], 1e-5, 1.0).unwrap();
        assert!(traj.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn mismatched_prefixes_are_rejected() {
        assert!(matches!(
            dil_para(0.1, &[0.1, 0.2], &[0.1], 0.5, 1.0),
            Err(FitError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            aperture_shear_dil(&[1.0, 2.0], &[0.0]),
            Err(FitError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn synthetic_window_produces_four_samples() {
        let params = DilationParams::new(0.1, 0.5, 5.0);
        let inputs = synthetic_inputs(vec![1.3, 0.0, 0.0, 0.0, 0.0]);
        let b_mod = forward_aperture(&inputs, &params).unwrap();
        assert_eq!(b_mod.len(), 4);
        assert!(b_mod.iter().all(|x| x.is_finite()));

        // First step: θ = 5 + (1 - 5)·e^{-0.2}
        let theta1 = 5.0 - 4.0 * (-0.2_f64).exp();
        let expected = 1.3 + 0.1 * 5.0_f64.to_radians().tan() - 0.1 * theta1.ln();
        assert_abs_diff_eq!(b_mod[0], expected, epsilon = 1e-12);
    }

    #[test]
    fn single_sample_window_gives_empty_model() {
        let inputs = InversionInputs::new(
            vec![1.3],
            0.0,
            vec![],
            vec![],
            1.0,
            1.0,
            AnalysisWindow::new(0, 0),
        );
        let b_mod = forward_aperture(&inputs, &DilationParams::new(0.1, 0.5, 5.0)).unwrap();
        assert!(b_mod.is_empty());
    }
}
