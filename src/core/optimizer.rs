use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

pub trait Objective: Sync {
    fn dimension(&self) -> usize;
    fn evaluate(&self, x: &[f64]) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    fn scale(self, unit: f64) -> f64 {
        self.lower + unit * (self.upper - self.lower)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvolutionConfig {
    pub population_multiplier: usize,
    pub max_generations: u32,
    pub tolerance: f64,
    pub absolute_tolerance: f64,
    pub mutation: (f64, f64),
    pub recombination: f64,
    pub seed: Option<u64>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_multiplier: 15,
            max_generations: 1_000,
            tolerance: 0.01,
            absolute_tolerance: 0.0,
            mutation: (0.5, 1.0),
            recombination: 0.7,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimOutcome {
    pub x: Vec<f64>,
    pub fun: f64,
    pub generations: u32,
    pub evaluations: u64,
    pub converged: bool,
}

/// Minimises `objective` over `bounds`. Never fails: when the generation
/// budget runs out the best candidate seen so far is returned with
/// `converged == false`.
///
/// `bounds.len()` must equal `objective.dimension()`; configuration is
/// expected to have been validated by the caller.
pub fn minimize<O: Objective>(
    objective: &O,
    bounds: &[Bounds],
    config: &EvolutionConfig,
) -> OptimOutcome {
    let dim = bounds.len();
    debug_assert_eq!(dim, objective.dimension());
    let pop_size = (config.population_multiplier * dim).max(5);

    let mut rng = match config.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };

    let mut population = latin_hypercube(pop_size, dim, &mut rng);
    let mut energies = evaluate_population(objective, &population, bounds);
    let mut evaluations = pop_size as u64;
    let mut best = index_of_min(&energies);

    let mut generations = 0;
    let mut converged = false;
    for generation in 1..=config.max_generations {
        let scale = if config.mutation.0 < config.mutation.1 {
            rng.gen_range(config.mutation.0..config.mutation.1)
        } else {
            config.mutation.0
        };

        let trials: Vec<Vec<f64>> = (0..pop_size)
            .map(|candidate| {
                best1bin_trial(
                    candidate,
                    best,
                    &population,
                    scale,
                    config.recombination,
                    &mut rng,
                )
            })
            .collect();
        let trial_energies = evaluate_population(objective, &trials, bounds);
        evaluations += pop_size as u64;

        for (candidate, (trial, energy)) in trials.into_iter().zip(trial_energies).enumerate() {
            if energy <= energies[candidate] {
                population[candidate] = trial;
                energies[candidate] = energy;
                if energy < energies[best] {
                    best = candidate;
                }
            }
        }

        generations = generation;
        if has_converged(&energies, config.tolerance, config.absolute_tolerance) {
            converged = true;
            break;
        }
    }

    OptimOutcome {
        x: scale_to_bounds(&population[best], bounds),
        fun: energies[best],
        generations,
        evaluations,
        converged,
    }
}

fn latin_hypercube(pop_size: usize, dim: usize, rng: &mut ChaCha8Rng) -> Vec<Vec<f64>> {
    let segment = 1.0 / pop_size as f64;
    let mut population = vec![vec![0.0; dim]; pop_size];
    let mut order: Vec<usize> = (0..pop_size).collect();
    for param in 0..dim {
        order.shuffle(rng);
        for (member, &stratum) in order.iter().enumerate() {
            population[member][param] = (stratum as f64 + rng.gen_range(0.0..1.0)) * segment;
        }
    }
    population
}

fn best1bin_trial(
    candidate: usize,
    best: usize,
    population: &[Vec<f64>],
    scale: f64,
    recombination: f64,
    rng: &mut ChaCha8Rng,
) -> Vec<f64> {
    let pop_size = population.len();
    let r0 = loop {
        let pick = rng.gen_range(0..pop_size);
        if pick != candidate {
            break pick;
        }
    };
    let r1 = loop {
        let pick = rng.gen_range(0..pop_size);
        if pick != candidate && pick != r0 {
            break pick;
        }
    };

    let mut trial = population[candidate].clone();
    let dim = trial.len();
    let fill_point = rng.gen_range(0..dim);
    for param in 0..dim {
        if param == fill_point || rng.gen_range(0.0..1.0) < recombination {
            trial[param] = population[best][param]
                + scale * (population[r0][param] - population[r1][param]);
        }
    }

    // Out-of-box coordinates are resampled rather than clipped.
    for value in &mut trial {
        if !(0.0..=1.0).contains(&*value) {
            *value = rng.gen_range(0.0..1.0);
        }
    }
    trial
}

fn evaluate_population<O: Objective>(
    objective: &O,
    population: &[Vec<f64>],
    bounds: &[Bounds],
) -> Vec<f64> {
    population
        .par_iter()
        .map(|member| {
            let energy = objective.evaluate(&scale_to_bounds(member, bounds));
            if energy.is_nan() { f64::INFINITY } else { energy }
        })
        .collect()
}

fn scale_to_bounds(unit: &[f64], bounds: &[Bounds]) -> Vec<f64> {
    unit.iter()
        .zip(bounds)
        .map(|(&u, &bound)| bound.scale(u))
        .collect()
}

fn index_of_min(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

fn has_converged(energies: &[f64], tolerance: f64, absolute_tolerance: f64) -> bool {
    if energies.iter().any(|e| !e.is_finite()) {
        return false;
    }
    let n = energies.len() as f64;
    let mean = energies.iter().sum::<f64>() / n;
    if !mean.is_finite() {
        return false;
    }
    let variance = energies.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt() <= absolute_tolerance + tolerance * mean.abs()
}
