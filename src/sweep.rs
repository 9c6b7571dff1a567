use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::core::{LossContext, LossOptions, SolveConfig, equal_split, solve};
use crate::dataset::aggregate_units;
use crate::error::{ConfigurationError, Error};
use crate::policy::{FundingReform, PolicyFile};
use crate::report::{ImpactFrame, headline_metrics};
use crate::simulation::ExportedSimulation;

pub const DEFAULT_SWEEP_PATH: &str = "flat_tax_sweep.csv";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateRange {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl Default for RateRange {
    fn default() -> Self {
        Self {
            start: 0.0,
            end: 0.5,
            step: 0.01,
        }
    }
}

impl RateRange {
    pub fn rates(&self) -> Result<Vec<f64>, ConfigurationError> {
        validate_range(self).map_err(ConfigurationError::InvalidSweep)?;
        let steps = ((self.end - self.start) / self.step + 1e-9).floor() as usize;
        Ok((0..=steps)
            .map(|i| round_rate(self.start + i as f64 * self.step))
            .collect())
    }
}

fn round_rate(rate: f64) -> f64 {
    (rate * 1e6).round() / 1e6
}

fn validate_range(range: &RateRange) -> Result<(), String> {
    if !range.start.is_finite() || !range.end.is_finite() {
        return Err("flat tax rates must be finite".to_string());
    }
    if range.start < 0.0 || range.end > 1.0 {
        return Err("flat tax rates must lie in [0, 1]".to_string());
    }
    if range.end < range.start {
        return Err("end rate must be >= start rate".to_string());
    }
    if !range.step.is_finite() || range.step <= 0.0 {
        return Err("rate step must be > 0".to_string());
    }
    Ok(())
}

pub fn rate_dir(root: &Path, rate: f64) -> PathBuf {
    root.join(format!("flat_tax_{rate:.2}"))
}

fn rate_policy_path(dir: &Path, rate: f64) -> PathBuf {
    dir.join(format!("flat_tax_{rate:.2}.yaml"))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepRow {
    pub flat_tax: f64,
    pub equal_loss: f64,
    pub optimal_loss: f64,
    pub poverty_rate_change: Option<f64>,
    pub gini_change: Option<f64>,
}

/// Solves the band amounts once per flat tax rate. Each rate needs its own
/// funding-only export; reformed exports are optional and add the headline
/// poverty and inequality changes.
#[derive(Debug, Clone)]
pub struct Sweep {
    pub baseline_dir: PathBuf,
    pub funded_root: PathBuf,
    pub reform_root: Option<PathBuf>,
    pub policy_dir: Option<PathBuf>,
    pub range: RateRange,
    pub options: LossOptions,
    pub config: SolveConfig,
}

impl Sweep {
    pub fn run(&self) -> Result<Vec<SweepRow>, Error> {
        let rates = self.range.rates()?;
        let baseline = ExportedSimulation::open(&self.baseline_dir)?;

        let mut rows = Vec::with_capacity(rates.len());
        for rate in rates {
            let funded_dir = rate_dir(&self.funded_root, rate);
            if !funded_dir.is_dir() {
                warn!(rate, dir = %funded_dir.display(), "no funded export for rate, skipping");
                continue;
            }
            let funded = ExportedSimulation::open(&funded_dir)?;
            rows.push(self.sweep_rate(&baseline, &funded, rate)?);
        }

        if rows.is_empty() {
            return Err(ConfigurationError::InvalidSweep(format!(
                "no funded exports found under {}",
                self.funded_root.display()
            ))
            .into());
        }
        Ok(rows)
    }

    fn sweep_rate(
        &self,
        baseline: &ExportedSimulation,
        funded: &ExportedSimulation,
        rate: f64,
    ) -> Result<SweepRow, Error> {
        let table = aggregate_units(baseline, funded)?;
        let ctx = LossContext::new(table, self.options)?;
        let equal = equal_split(&ctx);
        let result = solve(&ctx, &self.config)?;

        if let Some(dir) = &self.policy_dir {
            let funding = FundingReform {
                flat_tax: rate,
                ..FundingReform::default()
            };
            PolicyFile::new(&result.amounts, funding).save(&rate_policy_path(dir, rate))?;
        }

        let (poverty_rate_change, gini_change) = match self.metrics(baseline, rate)? {
            Some((poverty, gini)) => (Some(poverty), Some(gini)),
            None => (None, None),
        };

        info!(
            flat_tax = rate,
            equal_loss = equal.loss,
            optimal_loss = result.loss,
            "swept flat tax rate"
        );
        Ok(SweepRow {
            flat_tax: rate,
            equal_loss: equal.loss,
            optimal_loss: result.loss,
            poverty_rate_change,
            gini_change,
        })
    }

    fn metrics(
        &self,
        baseline: &ExportedSimulation,
        rate: f64,
    ) -> Result<Option<(f64, f64)>, Error> {
        let Some(root) = &self.reform_root else {
            return Ok(None);
        };
        let reform_dir = rate_dir(root, rate);
        if !reform_dir.is_dir() {
            warn!(rate, dir = %reform_dir.display(), "no reformed export for rate, metrics left blank");
            return Ok(None);
        }
        let reformed = ExportedSimulation::open(&reform_dir)?;
        let metrics = headline_metrics(&ImpactFrame::from_simulations(baseline, &reformed)?);
        Ok(Some((metrics.poverty_rate_change, metrics.gini_change)))
    }
}

pub fn write_sweep(path: &Path, rows: &[SweepRow]) -> Result<(), Error> {
    let table_err = |source: csv::Error| Error::SweepTable {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| Error::Report {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    let mut writer = csv::Writer::from_path(path).map_err(table_err)?;
    for row in rows {
        writer.serialize(row).map_err(table_err)?;
    }
    writer.flush().map_err(|source| Error::Report {
        path: path.to_path_buf(),
        source,
    })
}
