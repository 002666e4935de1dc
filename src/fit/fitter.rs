//! Inversion orchestration for a single analysis window.
//!
//! Given prepared inputs, we:
//! - build the RMSE objective (validating the captured data once)
//! - run a bounded search strategy over the parameter box
//! - recompute the modeled aperture at the best candidate for reporting

use tracing::info;

use crate::domain::{FitResult, GaConfig, InversionInputs, ParamBounds};
use crate::error::FitError;
use crate::fit::ga::{GeneticAlgorithm, SearchStrategy};
use crate::fit::objective::ApertureObjective;

/// Everything produced by one inversion.
#[derive(Debug, Clone)]
pub struct Inversion {
    pub objective: ApertureObjective,
    pub result: FitResult,
    /// Modeled aperture at the best parameters (aligned with `b_exp[1..]`).
    pub modeled: Vec<f64>,
}

/// Invert with the genetic algorithm configured by `ga`.
pub fn invert(
    inputs: InversionInputs,
    bounds: ParamBounds,
    ga: &GaConfig,
) -> Result<Inversion, FitError> {
    let strategy = GeneticAlgorithm::new(ga.clone())?;
    invert_with(inputs, bounds, &strategy)
}

/// Invert with any bounded search strategy.
pub fn invert_with<S: SearchStrategy>(
    inputs: InversionInputs,
    bounds: ParamBounds,
    strategy: &S,
) -> Result<Inversion, FitError> {
    // Degenerate windows must fail here, before any search work is done.
    let objective = ApertureObjective::new(inputs, bounds)?;

    info!(
        window_start = objective.inputs().window.start,
        window_end = objective.inputs().window.end,
        samples = objective.n_compared(),
        "running inversion"
    );

    let outcome = strategy.minimize(|p| objective.evaluate(p), objective.bounds())?;

    // Guard the optimizer contract explicitly.
    objective.bounds().check(&outcome.best_params)?;

    let modeled = objective.model(&outcome.best_params)?;
    let result = FitResult {
        params: outcome.best_params,
        score: outcome.best_score,
        evaluations: outcome.evaluations,
        iterations: outcome.history.len(),
        history: outcome.history,
    };

    info!(
        dil_fact = result.params.dil_fact,
        d_c = result.params.d_c,
        dil_ang = result.params.dil_ang,
        rmse = result.score,
        "inversion finished"
    );

    Ok(Inversion {
        objective,
        result,
        modeled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AnalysisWindow, DilationParams};
    use crate::fit::ga::SearchOutcome;
    use crate::models::forward_aperture;

    fn synthetic_inputs(truth: DilationParams) -> InversionInputs {
        let n = 25;
        let v: Vec<f64> = (0..n).map(|i| 0.04 + 0.002 * i as f64).collect();
        let mut u = Vec::with_capacity(n);
        let mut acc = 2.0;
        for &vi in &v {
            acc += vi;
            u.push(acc);
        }
        let mut inputs = InversionInputs::new(
            vec![1.25; n + 1],
            2.0,
            u,
            v,
            1.0,
            150.0,
            AnalysisWindow::new(100, 100 + n),
        );
        let b_mod = forward_aperture(&inputs, &truth).unwrap();
        inputs.b_exp[1..].copy_from_slice(&b_mod);
        inputs
    }

    /// Strategy that returns a fixed candidate (for contract checks).
    struct Fixed(DilationParams);

    impl SearchStrategy for Fixed {
        fn minimize<F>(&self, objective: F, _: &ParamBounds) -> Result<SearchOutcome, FitError>
        where
            F: Fn(&DilationParams) -> Result<f64, FitError> + Sync,
        {
            let score = objective(&self.0)?;
            Ok(SearchOutcome {
                best_params: self.0,
                best_score: score,
                evaluations: 1,
                history: vec![score],
            })
        }
    }

    #[test]
    fn invert_reports_model_at_best_candidate() {
        let truth = DilationParams::new(0.08, 0.4, 3.0);
        let inputs = synthetic_inputs(truth);
        let inv = invert_with(inputs, ParamBounds::default(), &Fixed(truth)).unwrap();
        assert_eq!(inv.modeled.len(), 25);
        assert!(inv.result.score.abs() < 1e-12);
        assert_eq!(inv.result.iterations, 1);
    }

    #[test]
    fn ga_inversion_stays_in_bounds_and_improves_on_midpoint() {
        let truth = DilationParams::new(0.08, 0.4, 3.0);
        let inputs = synthetic_inputs(truth);
        let ga = GaConfig {
            population_size: 30,
            max_iterations: 50,
            seed: 5,
            log_every: 0,
            ..GaConfig::default()
        };
        let inv = invert(inputs, ParamBounds::default(), &ga).unwrap();
        let mid = inv.objective.evaluate(&ParamBounds::default().midpoint()).unwrap();
        assert!(ParamBounds::default().contains(&inv.result.params));
        assert!(inv.result.score <= mid);
        assert_eq!(inv.result.evaluations, 30 * 50);
    }

    #[test]
    fn degenerate_window_fails_before_search() {
        let inputs = InversionInputs::new(
            vec![1.3],
            0.0,
            vec![],
            vec![],
            1.0,
            1.0,
            AnalysisWindow::new(3, 3),
        );
        let err = invert(inputs, ParamBounds::default(), &GaConfig::default()).unwrap_err();
        assert!(matches!(err, FitError::DegenerateWindow { samples: 1, .. }));
    }
}
