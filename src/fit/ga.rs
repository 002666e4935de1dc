//! Bounded genetic-algorithm search over the dilation parameters.
//!
//! Representation:
//! - each parameter is a Gray-coded bit string whose length is chosen so that
//!   the decoded grid resolves the box to at least `precision`
//! - a chromosome is the concatenation of the three genes
//!
//! One iteration:
//! - decode and evaluate the whole population (parallel, order preserving)
//! - update the best-ever candidate
//! - tournament selection, two-point crossover on consecutive pairs, bit-flip
//!   mutation
//! - the best-ever chromosome replaces slot 0 of the new generation (elitism)
//!
//! The search is stochastic but fully determined by the seed: the RNG is only
//! touched on the calling thread, and parallel evaluation is collected in
//! population order.

use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::domain::{DilationParams, GaConfig, N_DIM, ParamBounds};
use crate::error::FitError;

/// Upper limit on gene length so decoded integers stay exact in `f64`.
const MAX_GENE_BITS: usize = 52;

/// Outcome of a bounded search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub best_params: DilationParams,
    pub best_score: f64,
    pub evaluations: usize,
    /// Best-so-far score after each iteration.
    pub history: Vec<f64>,
}

/// A bounded, derivative-free minimizer over the parameter box.
pub trait SearchStrategy {
    fn minimize<F>(&self, objective: F, bounds: &ParamBounds) -> Result<SearchOutcome, FitError>
    where
        F: Fn(&DilationParams) -> Result<f64, FitError> + Sync;
}

/// Minimize `objective` over `bounds` with a default-configured GA.
pub fn optimize<F>(
    objective: F,
    bounds: &ParamBounds,
    population_size: usize,
    max_iterations: usize,
    seed: u64,
) -> Result<SearchOutcome, FitError>
where
    F: Fn(&DilationParams) -> Result<f64, FitError> + Sync,
{
    let ga = GeneticAlgorithm::new(GaConfig {
        population_size,
        max_iterations,
        seed,
        ..GaConfig::default()
    })?;
    ga.minimize(objective, bounds)
}

#[derive(Debug, Clone)]
pub struct GeneticAlgorithm {
    config: GaConfig,
}

impl GeneticAlgorithm {
    pub fn new(config: GaConfig) -> Result<Self, FitError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GaConfig {
        &self.config
    }
}

impl SearchStrategy for GeneticAlgorithm {
    fn minimize<F>(&self, objective: F, bounds: &ParamBounds) -> Result<SearchOutcome, FitError>
    where
        F: Fn(&DilationParams) -> Result<f64, FitError> + Sync,
    {
        let cfg = &self.config;
        let encoding = Encoding::new(bounds, cfg.precision);
        let n = cfg.population_size;
        let len = encoding.chrom_len();

        debug!(
            population = n,
            iterations = cfg.max_iterations,
            chrom_bits = len,
            seed = cfg.seed,
            "starting genetic search"
        );

        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let mut population: Vec<Vec<u8>> = (0..n)
            .map(|_| (0..len).map(|_| rng.gen_range(0..=1u8)).collect())
            .collect();

        let mut best: Option<(DilationParams, f64)> = None;
        let mut elite: Option<Vec<u8>> = None;
        let mut evaluations = 0usize;

        if let Some(guess) = cfg.initial_guess {
            let score = objective(&guess)?;
            evaluations += 1;
            best = Some((guess, score));
            population[0] = encoding.encode(&guess);
            elite = Some(population[0].clone());
        }

        let mut history = Vec::with_capacity(cfg.max_iterations);

        for iteration in 0..cfg.max_iterations {
            let candidates: Vec<DilationParams> =
                population.iter().map(|c| encoding.decode(c)).collect();
            let scores = candidates
                .par_iter()
                .map(|p| objective(p))
                .collect::<Result<Vec<f64>, FitError>>()?;
            evaluations += n;

            let gen_idx = argmin(&scores);
            let gen_score = scores[gen_idx];
            let improved = match best {
                None => true,
                Some((_, s)) => rank_key(gen_score) < rank_key(s),
            };
            if improved {
                best = Some((candidates[gen_idx], gen_score));
                elite = Some(population[gen_idx].clone());
            }

            let best_score = best.map(|(_, s)| s).unwrap_or(f64::INFINITY);
            history.push(best_score);

            if cfg.log_every > 0 && (iteration + 1) % cfg.log_every == 0 {
                info!(
                    iteration = iteration + 1,
                    best_score,
                    generation_best = gen_score,
                    "genetic search progress"
                );
            }

            // The last generation is not evaluated again, so skip breeding it.
            if iteration + 1 == cfg.max_iterations {
                break;
            }

            population = select_tournament(&population, &scores, cfg.tournament_size, &mut rng);
            crossover_two_point(&mut population, &mut rng);
            mutate(&mut population, cfg.prob_mutation, &mut rng);
            if let Some(chrom) = &elite {
                population[0].clone_from(chrom);
            }
        }

        let (best_params, best_score) = best.ok_or_else(|| {
            FitError::InvalidConfig("genetic search evaluated no candidates".to_string())
        })?;

        debug!(best_score, evaluations, "genetic search finished");

        Ok(SearchOutcome {
            best_params,
            best_score,
            evaluations,
            history,
        })
    }
}

/// Gray-coded fixed-point mapping between bit strings and the parameter box.
#[derive(Debug, Clone)]
struct Encoding {
    lower: [f64; N_DIM],
    upper: [f64; N_DIM],
    bits: [usize; N_DIM],
}

impl Encoding {
    fn new(bounds: &ParamBounds, precision: f64) -> Self {
        let mut bits = [1usize; N_DIM];
        for (d, b) in bits.iter_mut().enumerate() {
            let span = bounds.upper[d] - bounds.lower[d];
            let needed = (span / precision + 1.0).log2().ceil();
            *b = if needed.is_finite() {
                (needed as usize).clamp(1, MAX_GENE_BITS)
            } else {
                MAX_GENE_BITS
            };
        }
        Self {
            lower: bounds.lower,
            upper: bounds.upper,
            bits,
        }
    }

    fn chrom_len(&self) -> usize {
        self.bits.iter().sum()
    }

    fn max_value(&self, d: usize) -> u64 {
        (1u64 << self.bits[d]) - 1
    }

    fn decode(&self, chrom: &[u8]) -> DilationParams {
        let mut x = [0.0; N_DIM];
        let mut offset = 0;
        for (d, xd) in x.iter_mut().enumerate() {
            let genes = &chrom[offset..offset + self.bits[d]];
            offset += self.bits[d];

            // Gray -> binary: each binary bit is the running XOR of the Gray bits.
            let mut bit = 0u8;
            let mut value = 0u64;
            for &g in genes {
                bit ^= g & 1;
                value = (value << 1) | bit as u64;
            }

            let max = self.max_value(d);
            let (lo, hi) = (self.lower[d], self.upper[d]);
            *xd = if value == max {
                hi
            } else {
                let frac = value as f64 / max as f64;
                (lo + frac * (hi - lo)).clamp(lo, hi)
            };
        }
        DilationParams::from_array(x)
    }

    fn encode(&self, params: &DilationParams) -> Vec<u8> {
        let x = params.to_array();
        let mut out = Vec::with_capacity(self.chrom_len());
        for (d, &xd) in x.iter().enumerate() {
            let span = self.upper[d] - self.lower[d];
            let frac = if span > 0.0 {
                ((xd - self.lower[d]) / span).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let value = (frac * self.max_value(d) as f64).round() as u64;
            let gray = value ^ (value >> 1);
            for k in (0..self.bits[d]).rev() {
                out.push(((gray >> k) & 1) as u8);
            }
        }
        out
    }
}

/// NaN never wins a comparison.
fn rank_key(y: f64) -> f64 {
    if y.is_nan() { f64::INFINITY } else { y }
}

/// Index of the lowest score; ties resolve to the earliest index.
fn argmin(scores: &[f64]) -> usize {
    let mut best = 0;
    for (i, &s) in scores.iter().enumerate().skip(1) {
        if rank_key(s) < rank_key(scores[best]) {
            best = i;
        }
    }
    best
}

fn select_tournament(
    population: &[Vec<u8>],
    scores: &[f64],
    size: usize,
    rng: &mut StdRng,
) -> Vec<Vec<u8>> {
    let n = population.len();
    (0..n)
        .map(|_| {
            let mut winner = rng.gen_range(0..n);
            for _ in 1..size {
                let challenger = rng.gen_range(0..n);
                if rank_key(scores[challenger]) < rank_key(scores[winner]) {
                    winner = challenger;
                }
            }
            population[winner].clone()
        })
        .collect()
}

fn crossover_two_point(population: &mut [Vec<u8>], rng: &mut StdRng) {
    let Some(len) = population.first().map(Vec::len) else {
        return;
    };
    for i in (0..population.len().saturating_sub(1)).step_by(2) {
        let a = rng.gen_range(0..=len);
        let b = rng.gen_range(0..=len);
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let (left, right) = population.split_at_mut(i + 1);
        left[i][lo..hi].swap_with_slice(&mut right[0][lo..hi]);
    }
}

fn mutate(population: &mut [Vec<u8>], prob: f64, rng: &mut StdRng) {
    if prob <= 0.0 {
        return;
    }
    for chrom in population.iter_mut() {
        for gene in chrom.iter_mut() {
            if rng.gen_bool(prob) {
                *gene ^= 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AnalysisWindow, InversionInputs};
    use crate::fit::objective::ApertureObjective;
    use crate::models::forward_aperture;

    fn sphere(p: &DilationParams) -> Result<f64, FitError> {
        let a = p.dil_fact - 0.2;
        let b = p.d_c - 1.0;
        let c = (p.dil_ang - 7.0) / 10.0;
        Ok(a * a + b * b + c * c)
    }

    fn small_config(seed: u64) -> GaConfig {
        GaConfig {
            population_size: 40,
            max_iterations: 80,
            seed,
            log_every: 0,
            ..GaConfig::default()
        }
    }

    /// A 30-sample window with varying velocity, observed aperture generated
    /// by the model itself.
    fn synthetic_objective() -> ApertureObjective {
        let n = 30;
        let v: Vec<f64> = (0..n).map(|i| 0.05 + 0.03 * ((i as f64) * 0.7).sin().abs()).collect();
        let mut u = Vec::with_capacity(n);
        let mut acc = 0.0;
        for &vi in &v {
            acc += vi;
            u.push(acc);
        }
        let mut inputs = InversionInputs::new(
            vec![1.2; n + 1],
            0.0,
            u,
            v,
            1.0,
            1.0,
            AnalysisWindow::new(0, n),
        );
        let truth = DilationParams::new(0.12, 0.3, 4.0);
        let b_mod = forward_aperture(&inputs, &truth).unwrap();
        inputs.b_exp[1..].copy_from_slice(&b_mod);
        ApertureObjective::new(inputs, ParamBounds::default()).unwrap()
    }

    /// 60 samples alternating between slow and fast sliding every 15 samples.
    /// The velocity steps make all three parameters identifiable.
    fn velocity_step_objective(truth: DilationParams) -> ApertureObjective {
        let n = 60;
        let v: Vec<f64> = (0..n)
            .map(|i| if (i / 15) % 2 == 0 { 0.02 } else { 0.2 })
            .collect();
        let mut u = Vec::with_capacity(n);
        let mut acc = 0.0;
        for &vi in &v {
            acc += vi;
            u.push(acc);
        }
        let mut inputs = InversionInputs::new(
            vec![1.2; n + 1],
            0.0,
            u,
            v,
            1.0,
            1.0,
            AnalysisWindow::new(0, n),
        );
        let b_mod = forward_aperture(&inputs, &truth).unwrap();
        inputs.b_exp[1..].copy_from_slice(&b_mod);
        ApertureObjective::new(inputs, ParamBounds::default()).unwrap()
    }

    fn std_dev(x: &[f64]) -> f64 {
        let mean = x.iter().sum::<f64>() / x.len() as f64;
        (x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / x.len() as f64).sqrt()
    }

    #[test]
    fn cold_start_recovers_generating_params() {
        let truth = DilationParams::new(0.12, 0.3, 4.0);
        let obj = velocity_step_objective(truth);
        let scale = std_dev(obj.inputs().observed());

        for seed in [1, 2, 3] {
            let cfg = GaConfig {
                population_size: 80,
                max_iterations: 250,
                prob_mutation: 0.01,
                seed,
                log_every: 0,
                ..GaConfig::default()
            };
            assert!(cfg.initial_guess.is_none());
            let out = GeneticAlgorithm::new(cfg)
                .unwrap()
                .minimize(|p: &DilationParams| obj.evaluate(p), obj.bounds())
                .unwrap();

            assert!(
                out.best_score < 0.01 * scale,
                "seed={seed} best_score={} scale={scale}",
                out.best_score
            );
            let p = out.best_params;
            assert!((p.dil_fact - truth.dil_fact).abs() < 5e-3, "seed={seed} {p:?}");
            assert!((p.d_c - truth.d_c).abs() < 2e-2, "seed={seed} {p:?}");
            assert!((p.dil_ang - truth.dil_ang).abs() < 0.1, "seed={seed} {p:?}");
        }
    }

    #[test]
    fn crossover_can_exchange_the_last_bit() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut swapped = false;
        for _ in 0..50 {
            let mut pop = vec![vec![0u8], vec![1u8]];
            crossover_two_point(&mut pop, &mut rng);
            if pop[0] == [1] && pop[1] == [0] {
                swapped = true;
                break;
            }
        }
        assert!(swapped);
    }

    #[test]
    fn gray_encoding_round_trips_within_precision() {
        let bounds = ParamBounds::default();
        let enc = Encoding::new(&bounds, 1e-7);
        assert_eq!(enc.bits, [23, 25, 28]);

        let p = DilationParams::new(0.123456, 0.987654, 13.37);
        let q = enc.decode(&enc.encode(&p));
        assert!((p.dil_fact - q.dil_fact).abs() <= 1e-7);
        assert!((p.d_c - q.d_c).abs() <= 1e-7);
        assert!((p.dil_ang - q.dil_ang).abs() <= 1e-7);
    }

    #[test]
    fn decoded_extremes_hit_bounds() {
        let bounds = ParamBounds::default();
        let enc = Encoding::new(&bounds, 1e-3);
        let lo = enc.decode(&enc.encode(&DilationParams::from_array(bounds.lower)));
        let hi = enc.decode(&enc.encode(&DilationParams::from_array(bounds.upper)));
        assert_eq!(lo.to_array(), bounds.lower);
        assert_eq!(hi.to_array(), bounds.upper);
    }

    #[test]
    fn best_params_stay_within_bounds() {
        let bounds = ParamBounds::default();
        for seed in [1, 2, 3] {
            let out = GeneticAlgorithm::new(small_config(seed))
                .unwrap()
                .minimize(sphere, &bounds)
                .unwrap();
            let x = out.best_params.to_array();
            for d in 0..N_DIM {
                assert!(x[d] >= bounds.lower[d] && x[d] <= bounds.upper[d]);
            }
        }
    }

    #[test]
    fn narrowed_bounds_are_respected() {
        let bounds = ParamBounds::new([0.3, 1.5, 10.0], [0.4, 1.6, 11.0]).unwrap();
        let out = GeneticAlgorithm::new(small_config(9))
            .unwrap()
            .minimize(sphere, &bounds)
            .unwrap();
        assert!(bounds.contains(&out.best_params));
    }

    #[test]
    fn history_is_non_increasing_and_budget_is_fixed() {
        let cfg = small_config(5);
        let out = GeneticAlgorithm::new(cfg.clone())
            .unwrap()
            .minimize(sphere, &ParamBounds::default())
            .unwrap();
        assert_eq!(out.history.len(), cfg.max_iterations);
        assert_eq!(out.evaluations, cfg.max_iterations * cfg.population_size);
        for w in out.history.windows(2) {
            assert!(w[1] <= w[0]);
        }
        assert_eq!(*out.history.last().unwrap(), out.best_score);
    }

    #[test]
    fn search_converges_on_smooth_bowl() {
        let out = GeneticAlgorithm::new(small_config(11))
            .unwrap()
            .minimize(sphere, &ParamBounds::default())
            .unwrap();
        assert!(out.best_score < 5e-2, "best_score={}", out.best_score);
    }

    #[test]
    fn same_seed_reproduces_outcome() {
        let obj = synthetic_objective();
        let run = |seed| {
            GeneticAlgorithm::new(small_config(seed))
                .unwrap()
                .minimize(|p: &DilationParams| obj.evaluate(p), obj.bounds())
                .unwrap()
        };
        let a = run(17);
        let b = run(17);
        assert_eq!(a, b);
        assert_eq!(a.best_score.to_bits(), b.best_score.to_bits());
    }

    #[test]
    fn best_score_never_exceeds_reference_candidate() {
        let obj = synthetic_objective();
        let reference = DilationParams::new(0.1, 0.5, 5.0);
        let reference_score = obj.evaluate(&reference).unwrap();

        for seed in [1, 7, 99, 2024] {
            let cfg = GaConfig {
                initial_guess: Some(reference),
                ..small_config(seed)
            };
            let out = GeneticAlgorithm::new(cfg)
                .unwrap()
                .minimize(|p: &DilationParams| obj.evaluate(p), obj.bounds())
                .unwrap();
            assert!(out.best_score <= reference_score);
            assert!(obj.bounds().contains(&out.best_params));
        }
    }

    #[test]
    fn unseeded_search_beats_box_midpoint() {
        let obj = synthetic_objective();
        let midpoint_score = obj.evaluate(&obj.bounds().midpoint()).unwrap();
        let out = optimize(|p: &DilationParams| obj.evaluate(p), obj.bounds(), 40, 60, 3).unwrap();
        assert!(out.best_score >= 0.0);
        assert!(out.best_score <= midpoint_score);
    }

    #[test]
    fn objective_errors_abort_the_search() {
        let failing = |_: &DilationParams| -> Result<f64, FitError> {
            Err(FitError::ShapeMismatch {
                context: "test",
                left: 1,
                right: 2,
            })
        };
        let err = GeneticAlgorithm::new(small_config(1))
            .unwrap()
            .minimize(failing, &ParamBounds::default())
            .unwrap_err();
        assert!(matches!(err, FitError::ShapeMismatch { .. }));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = GaConfig {
            prob_mutation: 1.5,
            ..GaConfig::default()
        };
        assert!(GeneticAlgorithm::new(cfg).is_err());
    }
}
