use super::types::{Band, BandAmounts, UnitTable};
use crate::error::ConfigurationError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandTotals([f64; 5]);

impl BandTotals {
    pub fn from_table(table: &UnitTable) -> Self {
        let mut totals = [0.0; 5];
        for row in table.rows() {
            for band in Band::ALL {
                totals[band.index()] += row.weight * row.count(band) as f64;
            }
        }
        Self(totals)
    }

    pub fn get(&self, band: Band) -> f64 {
        self.0[band.index()]
    }

    pub fn population(&self) -> f64 {
        self.0.iter().sum()
    }
}

pub fn funding_pool(table: &UnitTable) -> f64 {
    table
        .rows()
        .iter()
        .map(|row| (row.baseline_net_income - row.funded_net_income) * row.weight)
        .sum()
}

/// Derives the senior amount that spends exactly `funding_pool` given the
/// other four band amounts. Not clamped: an overcommitted budget yields a
/// negative senior amount.
pub fn solve_senior(
    searched: &[f64; 4],
    funding_pool: f64,
    totals: &BandTotals,
) -> Result<f64, ConfigurationError> {
    let senior_population = totals.get(Band::Senior);
    if senior_population <= 0.0 || !senior_population.is_finite() {
        return Err(ConfigurationError::ZeroSeniorPopulation);
    }
    if !funding_pool.is_finite() {
        return Err(ConfigurationError::NonFiniteFunding(funding_pool));
    }

    let committed: f64 = Band::SEARCHED
        .iter()
        .zip(searched)
        .map(|(&band, amount)| amount * totals.get(band))
        .sum();
    Ok((funding_pool - committed) / senior_population)
}

pub fn total_disbursement(amounts: &BandAmounts, totals: &BandTotals) -> f64 {
    Band::ALL
        .iter()
        .map(|&band| amounts.get(band) * totals.get(band))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::UnitRecord;
    use proptest::prelude::{prop_assert, proptest};

    fn unit(baseline: f64, funded: f64, counts: [u32; 5], weight: f64) -> UnitRecord {
        UnitRecord {
            baseline_net_income: baseline,
            funded_net_income: funded,
            count_young_child: counts[0],
            count_older_child: counts[1],
            count_young_adult: counts[2],
            count_adult: counts[3],
            count_senior: counts[4],
            count_person: counts.iter().sum(),
            weight,
        }
    }

    fn mixed_table() -> UnitTable {
        UnitTable::new(vec![
            unit(40_000.0, 30_000.0, [1, 1, 0, 2, 0], 120.0),
            unit(25_000.0, 22_000.0, [0, 0, 1, 0, 1], 80.0),
            unit(60_000.0, 41_000.0, [0, 2, 0, 2, 0], 45.5),
            unit(18_000.0, 16_500.0, [0, 0, 0, 0, 2], 210.0),
        ])
        .expect("valid table")
    }

    #[test]
    fn funding_pool_is_weighted_income_reduction() {
        let table = mixed_table();
        let expected = 10_000.0 * 120.0 + 3_000.0 * 80.0 + 19_000.0 * 45.5 + 1_500.0 * 210.0;
        assert!((funding_pool(&table) - expected).abs() < 1e-6);
    }

    #[test]
    fn zero_senior_population_is_a_configuration_error() {
        let table = UnitTable::new(vec![unit(1_000.0, 900.0, [0, 0, 0, 1, 0], 1.0)])
            .expect("valid table");
        let totals = BandTotals::from_table(&table);
        let err = solve_senior(&[0.0; 4], 100.0, &totals).expect_err("must fail");
        assert_eq!(err, ConfigurationError::ZeroSeniorPopulation);
    }

    #[test]
    fn overcommitted_budget_gives_negative_senior_amount() {
        let table = mixed_table();
        let totals = BandTotals::from_table(&table);
        let senior = solve_senior(&[1e6; 4], funding_pool(&table), &totals).expect("derivable");
        assert!(senior < 0.0);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_derived_senior_amount_balances_the_budget(
            young_child in 0u32..150_000,
            older_child in 0u32..150_000,
            young_adult in 0u32..150_000,
            adult in 0u32..150_000,
        ) {
            let table = mixed_table();
            let totals = BandTotals::from_table(&table);
            let pool = funding_pool(&table);
            let searched = [
                young_child as f64,
                older_child as f64,
                young_adult as f64,
                adult as f64,
            ];

            let senior = solve_senior(&searched, pool, &totals).expect("derivable");
            let amounts = BandAmounts::from_searched(searched, senior);
            let spent = total_disbursement(&amounts, &totals);
            prop_assert!((spent - pool).abs() <= 1e-6 * pool.abs().max(1.0));
        }
    }
}
