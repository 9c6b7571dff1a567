use serde::Serialize;
use tracing::{info, warn};

use super::loss::LossContext;
use super::optimizer::{Bounds, EvolutionConfig, minimize};
use super::types::{Band, BandAmounts, SolveResult};
use crate::error::ConfigurationError;

pub const DEFAULT_UPPER_BOUND: f64 = 1.5e5;
pub const DEFAULT_SANITY_THRESHOLD: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveConfig {
    pub bounds: [Bounds; 4],
    pub evolution: EvolutionConfig,
    pub sanity_threshold: f64,
}

impl SolveConfig {
    pub fn with_upper_bound(upper: f64) -> Self {
        Self {
            bounds: [Bounds::new(0.0, upper); 4],
            ..Self::default()
        }
    }
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self {
            bounds: [Bounds::new(0.0, DEFAULT_UPPER_BOUND); 4],
            evolution: EvolutionConfig::default(),
            sanity_threshold: DEFAULT_SANITY_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EqualSplit {
    pub amount: f64,
    pub loss: f64,
}

pub fn solve(ctx: &LossContext, config: &SolveConfig) -> Result<SolveResult, ConfigurationError> {
    validate_config(config).map_err(ConfigurationError::InvalidSolveConfig)?;

    info!(
        units = ctx.table().len(),
        funding_pool = ctx.funding_pool(),
        population = config.evolution.population_multiplier * config.bounds.len(),
        max_generations = config.evolution.max_generations,
        "searching band amounts"
    );

    let outcome = minimize(ctx, &config.bounds, &config.evolution);
    let searched = [outcome.x[0], outcome.x[1], outcome.x[2], outcome.x[3]];
    let amounts = ctx.expand(&searched);
    let loss = ctx.loss_for_amounts(&amounts);
    let within_sanity_threshold = loss <= config.sanity_threshold;

    info!(
        generations = outcome.generations,
        evaluations = outcome.evaluations,
        converged = outcome.converged,
        loss,
        senior_amount = amounts.senior(),
        "search finished"
    );
    if !within_sanity_threshold {
        warn!(
            loss,
            threshold = config.sanity_threshold,
            "solved loss exceeds the sanity threshold"
        );
    }

    let message = if outcome.converged {
        "Population converged.".to_string()
    } else {
        "Reached max generations before convergence; returning best candidate.".to_string()
    };

    Ok(SolveResult {
        amounts,
        loss,
        generations: outcome.generations,
        evaluations: outcome.evaluations,
        converged: outcome.converged,
        within_sanity_threshold,
        message,
    })
}

pub fn equal_split(ctx: &LossContext) -> EqualSplit {
    let population = ctx.totals().population();
    let amount = if population > 0.0 {
        ctx.funding_pool() / population
    } else {
        0.0
    };
    EqualSplit {
        amount,
        loss: ctx.loss_for_amounts(&BandAmounts::uniform(amount)),
    }
}

fn validate_config(config: &SolveConfig) -> Result<(), String> {
    for (band, bound) in Band::SEARCHED.iter().zip(&config.bounds) {
        if !bound.lower.is_finite() || !bound.upper.is_finite() {
            return Err(format!("{} bounds must be finite", band.key()));
        }
        if bound.upper <= bound.lower {
            return Err(format!(
                "{} upper bound must be greater than its lower bound",
                band.key()
            ));
        }
    }

    let evolution = &config.evolution;
    if evolution.population_multiplier == 0 {
        return Err("population multiplier must be > 0".to_string());
    }
    if evolution.max_generations == 0 {
        return Err("max generations must be > 0".to_string());
    }
    if !evolution.tolerance.is_finite() || evolution.tolerance < 0.0 {
        return Err("tolerance must be >= 0".to_string());
    }
    if !evolution.absolute_tolerance.is_finite() || evolution.absolute_tolerance < 0.0 {
        return Err("absolute tolerance must be >= 0".to_string());
    }
    let (low, high) = evolution.mutation;
    if !(0.0..=2.0).contains(&low) || !(0.0..=2.0).contains(&high) || high < low {
        return Err("mutation range must satisfy 0 <= low <= high <= 2".to_string());
    }
    if !(0.0..=1.0).contains(&evolution.recombination) {
        return Err("recombination must be between 0 and 1".to_string());
    }
    if !config.sanity_threshold.is_finite() || config.sanity_threshold < 0.0 {
        return Err("sanity threshold must be >= 0".to_string());
    }
    Ok(())
}
