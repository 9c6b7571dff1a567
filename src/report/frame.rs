use tracing::warn;

use super::budget::{BudgetImpact, budget_impact};
use crate::error::SimulationError;
use crate::simulation::{Entity, Microsimulation, unit_size_by_person};

const NET_INCOME: &str = "spm_unit_net_income";
const PERSON_WEIGHT: &str = "person_weight";
const AGE: &str = "age";
const STATE: &str = "state_code";
const IN_POVERTY: &str = "spm_unit_is_in_spm_poverty";

pub const PROGRAMS: [(&str, &str); 5] = [
    ("ssi", "SSI"),
    ("snap", "SNAP"),
    ("wic", "WIC"),
    ("tanf", "TANF"),
    ("spm_unit_capped_housing_subsidy", "Housing subsidies"),
];

#[derive(Debug, Clone, PartialEq)]
pub struct ProgramRecipients {
    pub label: String,
    pub receives: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImpactFrame {
    pub age: Vec<f64>,
    pub weight: Vec<f64>,
    pub unit_size: Vec<f64>,
    pub state: Vec<String>,
    pub baseline_income: Vec<f64>,
    pub reform_income: Vec<f64>,
    pub baseline_poverty: Vec<bool>,
    pub reform_poverty: Vec<bool>,
    pub programs: Vec<ProgramRecipients>,
    pub budget: Option<BudgetImpact>,
}

impl ImpactFrame {
    pub fn from_simulations<B, R>(baseline: &B, reformed: &R) -> Result<Self, SimulationError>
    where
        B: Microsimulation + ?Sized,
        R: Microsimulation + ?Sized,
    {
        let persons = baseline.person_count();
        if reformed.person_count() != persons {
            return Err(SimulationError::LengthMismatch {
                what: "reformed simulation persons".to_string(),
                expected: persons,
                actual: reformed.person_count(),
            });
        }

        let mut programs = Vec::with_capacity(PROGRAMS.len());
        for (variable, label) in PROGRAMS {
            match baseline.calc(variable, Entity::Person) {
                Ok(values) => programs.push(ProgramRecipients {
                    label: label.to_string(),
                    receives: values.iter().map(|v| *v > 0.0).collect(),
                }),
                Err(SimulationError::MissingVariable(_)) => {
                    warn!(variable, "program not in baseline export, skipping");
                }
                Err(err) => return Err(err),
            }
        }

        let frame = Self {
            age: baseline.calc(AGE, Entity::Person)?,
            weight: baseline.calc(PERSON_WEIGHT, Entity::Person)?,
            unit_size: unit_size_by_person(baseline.person_units(), baseline.unit_count()),
            state: baseline.calc_labels(STATE)?,
            baseline_income: baseline.calc(NET_INCOME, Entity::Person)?,
            reform_income: reformed.calc(NET_INCOME, Entity::Person)?,
            baseline_poverty: flags(baseline.calc(IN_POVERTY, Entity::Person)?),
            reform_poverty: flags(reformed.calc(IN_POVERTY, Entity::Person)?),
            programs,
            budget: budget_impact(baseline, reformed)?,
        };
        frame.check_lengths()?;
        Ok(frame)
    }

    pub fn len(&self) -> usize {
        self.weight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weight.is_empty()
    }

    pub fn gain(&self, person: usize) -> f64 {
        self.reform_income[person] - self.baseline_income[person]
    }

    pub fn relative_gain(&self, person: usize) -> f64 {
        self.gain(person) / self.baseline_income[person].max(1.0)
    }

    pub fn gain_share(&self, person: usize) -> f64 {
        self.gain(person) / self.unit_size[person].max(1.0)
    }

    pub fn equivalised_baseline(&self) -> Vec<f64> {
        equivalise(&self.baseline_income, &self.unit_size)
    }

    pub fn equivalised_reform(&self) -> Vec<f64> {
        equivalise(&self.reform_income, &self.unit_size)
    }

    fn check_lengths(&self) -> Result<(), SimulationError> {
        let expected = self.weight.len();
        let columns = [
            (AGE, self.age.len()),
            ("unit size", self.unit_size.len()),
            (STATE, self.state.len()),
            (NET_INCOME, self.baseline_income.len()),
            ("reformed spm_unit_net_income", self.reform_income.len()),
            (IN_POVERTY, self.baseline_poverty.len()),
            ("reformed spm_unit_is_in_spm_poverty", self.reform_poverty.len()),
        ];
        let programs = self
            .programs
            .iter()
            .map(|program| (program.label.as_str(), program.receives.len()));
        for (what, actual) in columns.into_iter().chain(programs) {
            if actual != expected {
                return Err(SimulationError::LengthMismatch {
                    what: what.to_string(),
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }
}

fn flags(values: Vec<f64>) -> Vec<bool> {
    values.into_iter().map(|v| v != 0.0).collect()
}

pub fn equivalise(income: &[f64], unit_size: &[f64]) -> Vec<f64> {
    income
        .iter()
        .zip(unit_size)
        .map(|(income, size)| income / size.max(1.0).sqrt())
        .collect()
}
