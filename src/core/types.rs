use serde::{Deserialize, Serialize};

use crate::error::DatasetError;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    YoungChild,
    OlderChild,
    YoungAdult,
    Adult,
    Senior,
}

impl Band {
    pub const ALL: [Band; 5] = [
        Band::YoungChild,
        Band::OlderChild,
        Band::YoungAdult,
        Band::Adult,
        Band::Senior,
    ];

    pub const SEARCHED: [Band; 4] = [
        Band::YoungChild,
        Band::OlderChild,
        Band::YoungAdult,
        Band::Adult,
    ];

    pub fn index(self) -> usize {
        match self {
            Band::YoungChild => 0,
            Band::OlderChild => 1,
            Band::YoungAdult => 2,
            Band::Adult => 3,
            Band::Senior => 4,
        }
    }

    pub fn for_age(age: f64) -> Band {
        if age < 6.0 {
            Band::YoungChild
        } else if age < 18.0 {
            Band::OlderChild
        } else if age < 25.0 {
            Band::YoungAdult
        } else if age < 65.0 {
            Band::Adult
        } else {
            Band::Senior
        }
    }

    pub fn age_label(self) -> &'static str {
        match self {
            Band::YoungChild => "0-5",
            Band::OlderChild => "6-17",
            Band::YoungAdult => "18-24",
            Band::Adult => "25-64",
            Band::Senior => "65+",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Band::YoungChild => "young_child",
            Band::OlderChild => "older_child",
            Band::YoungAdult => "young_adult",
            Band::Adult => "adult",
            Band::Senior => "senior",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRecord {
    pub baseline_net_income: f64,
    pub funded_net_income: f64,
    pub count_young_child: u32,
    pub count_older_child: u32,
    pub count_young_adult: u32,
    pub count_adult: u32,
    pub count_senior: u32,
    pub count_person: u32,
    pub weight: f64,
}

impl UnitRecord {
    pub fn count(&self, band: Band) -> u32 {
        match band {
            Band::YoungChild => self.count_young_child,
            Band::OlderChild => self.count_older_child,
            Band::YoungAdult => self.count_young_adult,
            Band::Adult => self.count_adult,
            Band::Senior => self.count_senior,
        }
    }

    fn validate(&self, row: usize) -> Result<(), DatasetError> {
        let invalid = |reason: String| DatasetError::InvalidRow { row, reason };

        let band_total: u32 = Band::ALL.iter().map(|&band| self.count(band)).sum();
        if band_total != self.count_person {
            return Err(invalid(format!(
                "count_person is {} but band counts sum to {band_total}",
                self.count_person
            )));
        }
        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(invalid(format!(
                "weight must be finite and >= 0, got {}",
                self.weight
            )));
        }
        if !self.baseline_net_income.is_finite() || !self.funded_net_income.is_finite() {
            return Err(invalid("net incomes must be finite".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitTable {
    rows: Vec<UnitRecord>,
}

impl UnitTable {
    pub fn new(rows: Vec<UnitRecord>) -> Result<Self, DatasetError> {
        for (row, record) in rows.iter().enumerate() {
            record.validate(row)?;
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[UnitRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn weighted_count(&self, band: Band) -> f64 {
        self.rows
            .iter()
            .map(|row| row.weight * row.count(band) as f64)
            .sum()
    }

    pub fn weighted_population(&self) -> f64 {
        self.rows
            .iter()
            .map(|row| row.weight * row.count_person as f64)
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BandAmounts(pub [f64; 5]);

impl BandAmounts {
    pub fn from_searched(searched: [f64; 4], senior: f64) -> Self {
        Self([searched[0], searched[1], searched[2], searched[3], senior])
    }

    pub fn uniform(amount: f64) -> Self {
        Self([amount; 5])
    }

    pub fn get(&self, band: Band) -> f64 {
        self.0[band.index()]
    }

    pub fn searched(&self) -> [f64; 4] {
        [self.0[0], self.0[1], self.0[2], self.0[3]]
    }

    pub fn senior(&self) -> f64 {
        self.0[Band::Senior.index()]
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveResult {
    pub amounts: BandAmounts,
    pub loss: f64,
    pub generations: u32,
    pub evaluations: u64,
    pub converged: bool,
    pub within_sanity_threshold: bool,
    pub message: String,
}
