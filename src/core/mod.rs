mod budget;
mod loss;
mod optimizer;
mod solver;
mod types;

pub use budget::{BandTotals, funding_pool, solve_senior, total_disbursement};
pub use loss::{DEFAULT_INCOME_FLOOR, LossContext, LossOptions, LossWeighting};
pub use optimizer::{Bounds, EvolutionConfig, Objective, OptimOutcome, minimize};
pub use solver::{
    DEFAULT_SANITY_THRESHOLD, DEFAULT_UPPER_BOUND, EqualSplit, SolveConfig, equal_split, solve,
};
pub use types::{Band, BandAmounts, SolveResult, UnitRecord, UnitTable};
