use std::path::PathBuf;

use thiserror::Error;

// Fatal setup problems, never retried.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("weighted senior population is zero; the senior amount cannot be derived")]
    ZeroSeniorPopulation,
    #[error("funding pool must be finite, got {0}")]
    NonFiniteFunding(f64),
    #[error("invalid solve configuration: {0}")]
    InvalidSolveConfig(String),
    #[error("invalid flat tax sweep: {0}")]
    InvalidSweep(String),
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("failed to read simulation export {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed simulation export {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("variable `{0}` is not present in the simulation export")]
    MissingVariable(String),
    #[error("variable `{variable}` row {row}: cannot parse `{value}` as a number")]
    Parse {
        variable: String,
        row: usize,
        value: String,
    },
    #[error("person row {row} references unknown spm_unit_id `{id}`")]
    UnknownUnit { row: usize, id: String },
    #[error("{what}: expected {expected} values, got {actual}")]
    LengthMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("dataset cache {path} is malformed: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("dataset cache {path} is malformed: {reason}")]
    Malformed { path: PathBuf, reason: String },
    #[error("unit row {row} is invalid: {reason}")]
    InvalidRow { row: usize, reason: String },
    #[error("dataset cache {0} is missing and no microdata was supplied to regenerate it")]
    Missing(PathBuf),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
}

#[derive(Debug, Error)]
pub enum PolicyFileError {
    #[error("policy file I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("policy file {path} is malformed: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    #[error(transparent)]
    Policy(#[from] PolicyFileError),
    #[error("failed to write report {path}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write sweep table {path}: {source}")]
    SweepTable {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("server error: {0}")]
    Server(#[source] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
