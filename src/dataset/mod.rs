use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tracing::{info, warn};

use crate::core::{Band, UnitRecord, UnitTable};
use crate::error::{DatasetError, SimulationError};
use crate::simulation::{Entity, Microsimulation, map_to_unit};

pub const DEFAULT_DATASET_PATH: &str = "data/blank_slate_df.csv.gz";

const NET_INCOME: &str = "spm_unit_net_income";
const UNIT_WEIGHT: &str = "spm_unit_weight";
const AGE: &str = "age";

const CACHE_COLUMNS: [&str; 9] = [
    "baseline_net_income",
    "funded_net_income",
    "count_young_child",
    "count_older_child",
    "count_young_adult",
    "count_adult",
    "count_senior",
    "count_person",
    "weight",
];

/// Builds the unit table from a baseline run and a run with only the funding
/// reform applied. Both runs must describe the same persons and units.
pub fn aggregate_units<B, F>(baseline: &B, funded: &F) -> Result<UnitTable, DatasetError>
where
    B: Microsimulation + ?Sized,
    F: Microsimulation + ?Sized,
{
    let units = baseline.unit_count();
    let person_units = baseline.person_units();
    if funded.unit_count() != units {
        return Err(SimulationError::LengthMismatch {
            what: "funded simulation units".to_string(),
            expected: units,
            actual: funded.unit_count(),
        }
        .into());
    }

    let age = baseline.calc(AGE, Entity::Person)?;
    let baseline_net_income = baseline.calc(NET_INCOME, Entity::SpmUnit)?;
    let funded_net_income = funded.calc(NET_INCOME, Entity::SpmUnit)?;
    let weight = baseline.calc(UNIT_WEIGHT, Entity::SpmUnit)?;
    check_len("age", person_units.len(), age.len())?;
    check_len(NET_INCOME, units, baseline_net_income.len())?;
    check_len("funded spm_unit_net_income", units, funded_net_income.len())?;
    check_len(UNIT_WEIGHT, units, weight.len())?;

    let mut counts = [(); 5].map(|_| vec![0u32; units]);
    for (&person_age, &unit) in age.iter().zip(person_units) {
        counts[Band::for_age(person_age).index()][unit] += 1;
    }
    let members = map_to_unit(&vec![1.0; person_units.len()], person_units, units);

    let rows = (0..units)
        .map(|unit| UnitRecord {
            baseline_net_income: baseline_net_income[unit],
            funded_net_income: funded_net_income[unit],
            count_young_child: counts[Band::YoungChild.index()][unit],
            count_older_child: counts[Band::OlderChild.index()][unit],
            count_young_adult: counts[Band::YoungAdult.index()][unit],
            count_adult: counts[Band::Adult.index()][unit],
            count_senior: counts[Band::Senior.index()][unit],
            count_person: members[unit] as u32,
            weight: weight[unit],
        })
        .collect();
    UnitTable::new(rows)
}

fn check_len(what: &str, expected: usize, actual: usize) -> Result<(), DatasetError> {
    if expected != actual {
        return Err(SimulationError::LengthMismatch {
            what: what.to_string(),
            expected,
            actual,
        }
        .into());
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DatasetCache {
    path: PathBuf,
}

impl DatasetCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_or_generate<G>(&self, generate: G) -> Result<UnitTable, DatasetError>
    where
        G: FnOnce() -> Result<UnitTable, DatasetError>,
    {
        if self.path.exists() {
            match self.load() {
                Ok(table) => {
                    info!(path = %self.path.display(), units = table.len(), "loaded cached dataset");
                    return Ok(table);
                }
                Err(err) => {
                    warn!(path = %self.path.display(), error = %err, "cached dataset unusable, regenerating");
                }
            }
        } else {
            info!(path = %self.path.display(), "did not find cached dataset, generating");
        }

        let table = generate()?;
        self.store(&table)?;
        info!(path = %self.path.display(), units = table.len(), "completed dataset generation");
        Ok(table)
    }

    pub fn load(&self) -> Result<UnitTable, DatasetError> {
        let file = File::open(&self.path).map_err(|source| self.io_error(source))?;
        let mut reader = csv::Reader::from_reader(GzDecoder::new(BufReader::new(file)));
        let headers = reader.headers().map_err(|source| self.csv_error(source))?;
        if headers.iter().ne(CACHE_COLUMNS) {
            return Err(self.malformed(format!(
                "expected columns {}, found {}",
                CACHE_COLUMNS.join(","),
                headers.iter().collect::<Vec<_>>().join(",")
            )));
        }
        let rows = reader
            .deserialize::<UnitRecord>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| self.csv_error(source))?;
        if rows.is_empty() {
            return Err(self.malformed("no unit rows".to_string()));
        }
        UnitTable::new(rows)
    }

    pub fn store(&self, table: &UnitTable) -> Result<(), DatasetError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
            }
        }
        let file = File::create(&self.path).map_err(|source| self.io_error(source))?;
        let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        let mut writer = csv::Writer::from_writer(encoder);
        for row in table.rows() {
            writer
                .serialize(row)
                .map_err(|source| self.csv_error(source))?;
        }
        let encoder = writer
            .into_inner()
            .map_err(|err| self.io_error(err.into_error()))?;
        let mut inner = encoder.finish().map_err(|source| self.io_error(source))?;
        inner.flush().map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: std::io::Error) -> DatasetError {
        DatasetError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn csv_error(&self, source: csv::Error) -> DatasetError {
        DatasetError::Csv {
            path: self.path.clone(),
            source,
        }
    }

    fn malformed(&self, reason: String) -> DatasetError {
        DatasetError::Malformed {
            path: self.path.clone(),
            reason,
        }
    }
}
