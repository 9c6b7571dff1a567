use super::budget::{BandTotals, funding_pool, solve_senior};
use super::optimizer::Objective;
use super::types::{Band, BandAmounts, UnitTable};
use crate::error::ConfigurationError;

pub const DEFAULT_INCOME_FLOOR: f64 = 100.0;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LossWeighting {
    Population,
    Unit,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LossOptions {
    pub weighting: LossWeighting,
    pub income_floor: f64,
}

impl Default for LossOptions {
    fn default() -> Self {
        Self {
            weighting: LossWeighting::Population,
            income_floor: DEFAULT_INCOME_FLOOR,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LossContext {
    table: UnitTable,
    funding_pool: f64,
    totals: BandTotals,
    options: LossOptions,
    row_weights: Vec<f64>,
    denominators: Vec<f64>,
    total_weight: f64,
}

impl LossContext {
    pub fn new(table: UnitTable, options: LossOptions) -> Result<Self, ConfigurationError> {
        let pool = funding_pool(&table);
        Self::with_funding_pool(table, pool, options)
    }

    pub fn with_funding_pool(
        table: UnitTable,
        funding_pool: f64,
        options: LossOptions,
    ) -> Result<Self, ConfigurationError> {
        if !funding_pool.is_finite() {
            return Err(ConfigurationError::NonFiniteFunding(funding_pool));
        }
        if !options.income_floor.is_finite() || options.income_floor <= 0.0 {
            return Err(ConfigurationError::InvalidSolveConfig(
                "income floor must be > 0".to_string(),
            ));
        }
        let totals = BandTotals::from_table(&table);
        if totals.get(Band::Senior) <= 0.0 {
            return Err(ConfigurationError::ZeroSeniorPopulation);
        }

        let row_weights: Vec<f64> = table
            .rows()
            .iter()
            .map(|row| match options.weighting {
                LossWeighting::Population => row.weight * row.count_person as f64,
                LossWeighting::Unit => row.weight,
            })
            .collect();
        let denominators = table
            .rows()
            .iter()
            .map(|row| row.baseline_net_income.max(options.income_floor))
            .collect();
        let total_weight = row_weights.iter().sum();

        Ok(Self {
            table,
            funding_pool,
            totals,
            options,
            row_weights,
            denominators,
            total_weight,
        })
    }

    pub fn table(&self) -> &UnitTable {
        &self.table
    }

    pub fn funding_pool(&self) -> f64 {
        self.funding_pool
    }

    pub fn totals(&self) -> &BandTotals {
        &self.totals
    }

    pub fn options(&self) -> LossOptions {
        self.options
    }

    pub fn senior_amount(&self, searched: &[f64; 4]) -> f64 {
        // The senior headcount was checked on construction.
        match solve_senior(searched, self.funding_pool, &self.totals) {
            Ok(senior) => senior,
            Err(_) => f64::NAN,
        }
    }

    pub fn expand(&self, searched: &[f64; 4]) -> BandAmounts {
        BandAmounts::from_searched(*searched, self.senior_amount(searched))
    }

    pub fn mean_percentage_loss(&self, searched: &[f64; 4]) -> f64 {
        self.loss_for_amounts(&self.expand(searched))
    }

    /// Mean percentage loss for an explicit five-band policy. Only units whose
    /// final income falls below baseline contribute.
    pub fn loss_for_amounts(&self, amounts: &BandAmounts) -> f64 {
        if self.total_weight <= 0.0 {
            return 0.0;
        }

        let mut weighted_loss = 0.0;
        for ((row, &weight), &denominator) in self
            .table
            .rows()
            .iter()
            .zip(&self.row_weights)
            .zip(&self.denominators)
        {
            if weight == 0.0 {
                continue;
            }
            let transfers: f64 = Band::ALL
                .iter()
                .map(|&band| amounts.get(band) * row.count(band) as f64)
                .sum();
            let gain = row.funded_net_income + transfers - row.baseline_net_income;
            if gain < 0.0 {
                weighted_loss += weight * (-gain / denominator);
            }
        }
        weighted_loss / self.total_weight
    }
}

impl Objective for LossContext {
    fn dimension(&self) -> usize {
        Band::SEARCHED.len()
    }

    fn evaluate(&self, x: &[f64]) -> f64 {
        let searched = [x[0], x[1], x[2], x[3]];
        let loss = self.mean_percentage_loss(&searched);
        if loss.is_finite() { loss } else { f64::INFINITY }
    }
}
