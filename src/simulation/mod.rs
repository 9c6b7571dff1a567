use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::error::SimulationError;

pub const PERSON_FILE: &str = "person.csv";
pub const UNIT_FILE: &str = "spm_unit.csv";
pub const UNIT_ID: &str = "spm_unit_id";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Entity {
    Person,
    SpmUnit,
}

pub trait Microsimulation {
    fn unit_count(&self) -> usize;

    fn person_units(&self) -> &[usize];

    /// Numeric variable at `entity`. Values defined at the other entity are
    /// summed into units or broadcast to persons.
    fn calc(&self, variable: &str, entity: Entity) -> Result<Vec<f64>, SimulationError>;

    fn calc_labels(&self, variable: &str) -> Result<Vec<String>, SimulationError>;

    fn person_count(&self) -> usize {
        self.person_units().len()
    }
}

pub fn map_to_unit(values: &[f64], person_units: &[usize], unit_count: usize) -> Vec<f64> {
    let mut totals = vec![0.0; unit_count];
    for (value, &unit) in values.iter().zip(person_units) {
        totals[unit] += value;
    }
    totals
}

pub fn map_to_person(values: &[f64], person_units: &[usize]) -> Vec<f64> {
    person_units.iter().map(|&unit| values[unit]).collect()
}

pub fn unit_size_by_person(person_units: &[usize], unit_count: usize) -> Vec<f64> {
    let ones = vec![1.0; person_units.len()];
    map_to_person(&map_to_unit(&ones, person_units, unit_count), person_units)
}

#[derive(Debug)]
struct Frame {
    path: PathBuf,
    columns: HashMap<String, Vec<String>>,
    rows: usize,
}

impl Frame {
    fn read(path: &Path) -> Result<Self, SimulationError> {
        let csv_err = |source| SimulationError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(|source| SimulationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = csv::Reader::from_reader(BufReader::new(file));

        let headers: Vec<String> = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let mut columns: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        let mut rows = 0;
        for record in reader.records() {
            let record = record.map_err(csv_err)?;
            for (column, field) in columns.iter_mut().zip(record.iter()) {
                column.push(field.trim().to_string());
            }
            rows += 1;
        }

        Ok(Self {
            path: path.to_path_buf(),
            columns: headers.into_iter().zip(columns).collect(),
            rows,
        })
    }

    fn text(&self, variable: &str) -> Option<&[String]> {
        self.columns.get(variable).map(Vec::as_slice)
    }

    fn numeric(&self, variable: &str) -> Option<Result<Vec<f64>, SimulationError>> {
        let column = self.text(variable)?;
        Some(
            column
                .iter()
                .enumerate()
                .map(|(row, value)| {
                    parse_value(value).ok_or_else(|| SimulationError::Parse {
                        variable: variable.to_string(),
                        row,
                        value: value.clone(),
                    })
                })
                .collect(),
        )
    }
}

fn parse_value(value: &str) -> Option<f64> {
    match value {
        "True" | "true" => Some(1.0),
        "False" | "false" => Some(0.0),
        _ => value.parse::<f64>().ok(),
    }
}

#[derive(Debug)]
pub struct ExportedSimulation {
    person: Frame,
    unit: Frame,
    person_units: Vec<usize>,
}

impl ExportedSimulation {
    pub fn open(dir: &Path) -> Result<Self, SimulationError> {
        let person = Frame::read(&dir.join(PERSON_FILE))?;
        let unit = Frame::read(&dir.join(UNIT_FILE))?;

        let unit_ids = unit
            .text(UNIT_ID)
            .ok_or_else(|| SimulationError::MissingVariable(UNIT_ID.to_string()))?;
        let index: HashMap<&str, usize> = unit_ids
            .iter()
            .enumerate()
            .map(|(row, id)| (id.as_str(), row))
            .collect();

        let person_ids = person
            .text(UNIT_ID)
            .ok_or_else(|| SimulationError::MissingVariable(UNIT_ID.to_string()))?;
        let person_units = person_ids
            .iter()
            .enumerate()
            .map(|(row, id)| {
                index
                    .get(id.as_str())
                    .copied()
                    .ok_or_else(|| SimulationError::UnknownUnit {
                        row,
                        id: id.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            person_file = %person.path.display(),
            persons = person.rows,
            units = unit.rows,
            "loaded simulation export"
        );

        Ok(Self {
            person,
            unit,
            person_units,
        })
    }
}

impl Microsimulation for ExportedSimulation {
    fn unit_count(&self) -> usize {
        self.unit.rows
    }

    fn person_units(&self) -> &[usize] {
        &self.person_units
    }

    fn calc(&self, variable: &str, entity: Entity) -> Result<Vec<f64>, SimulationError> {
        let missing = || SimulationError::MissingVariable(variable.to_string());
        match entity {
            Entity::Person => {
                if let Some(values) = self.person.numeric(variable) {
                    return values;
                }
                let unit_values = self.unit.numeric(variable).ok_or_else(missing)??;
                Ok(map_to_person(&unit_values, &self.person_units))
            }
            Entity::SpmUnit => {
                if let Some(values) = self.unit.numeric(variable) {
                    return values;
                }
                let person_values = self.person.numeric(variable).ok_or_else(missing)??;
                Ok(map_to_unit(
                    &person_values,
                    &self.person_units,
                    self.unit.rows,
                ))
            }
        }
    }

    fn calc_labels(&self, variable: &str) -> Result<Vec<String>, SimulationError> {
        if let Some(values) = self.person.text(variable) {
            return Ok(values.to_vec());
        }
        let unit_values = self
            .unit
            .text(variable)
            .ok_or_else(|| SimulationError::MissingVariable(variable.to_string()))?;
        Ok(self
            .person_units
            .iter()
            .map(|&unit| unit_values[unit].clone())
            .collect())
    }
}
