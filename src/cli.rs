use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;

use crate::api::{ApiState, DEFAULT_PORT, run_http_server};
use crate::core::{
    Band, BandAmounts, Bounds, DEFAULT_INCOME_FLOOR, DEFAULT_SANITY_THRESHOLD,
    DEFAULT_UPPER_BOUND, EqualSplit, EvolutionConfig, LossContext, LossOptions, LossWeighting,
    SolveConfig, SolveResult, UnitTable, equal_split, solve,
};
use crate::dataset::{DEFAULT_DATASET_PATH, DatasetCache, aggregate_units};
use crate::error::{DatasetError, Error};
use crate::policy::{DEFAULT_POLICY_PATH, FundingReform, PolicyFile};
use crate::report::{ImpactFrame, currency, percent, write_report};
use crate::simulation::ExportedSimulation;
use crate::sweep::{DEFAULT_SWEEP_PATH, RateRange, Sweep, SweepRow, write_sweep};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliWeighting {
    Population,
    Unit,
}

impl From<CliWeighting> for LossWeighting {
    fn from(value: CliWeighting) -> Self {
        match value {
            CliWeighting::Population => LossWeighting::Population,
            CliWeighting::Unit => LossWeighting::Unit,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "blank-slate-ubi",
    about = "Search age-banded basic income amounts funded by a blank slate tax-benefit reform"
)]
pub struct Cli {
    #[command(flatten)]
    pub data: DataArgs,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(about = "Search for the amounts that minimize mean percentage loss and save them")]
    Solve {
        #[command(flatten)]
        search: SearchArgs,
        #[arg(long, default_value = DEFAULT_POLICY_PATH, help = "Where to write the solved policy")]
        policy: PathBuf,
    },
    #[command(about = "Loss of an explicit set of amounts, with the senior amount derived")]
    Evaluate {
        #[arg(long, help = "Annual amount for ages 0-5")]
        young_child: f64,
        #[arg(long, help = "Annual amount for ages 6-17")]
        older_child: f64,
        #[arg(long, help = "Annual amount for ages 18-24")]
        young_adult: f64,
        #[arg(long, help = "Annual amount for ages 25-64")]
        adult: f64,
    },
    #[command(about = "Equal per-capita split against the optimized policy")]
    Compare {
        #[command(flatten)]
        search: SearchArgs,
        #[arg(
            long,
            default_value = DEFAULT_POLICY_PATH,
            help = "Saved policy to compare; solved afresh when the file does not exist"
        )]
        policy: PathBuf,
    },
    #[command(about = "Print the saved policy as a full reform specification")]
    ShowPolicy {
        #[arg(long, default_value = DEFAULT_POLICY_PATH)]
        policy: PathBuf,
    },
    #[command(about = "Build impact charts from a baseline and a reformed microsimulation export")]
    Charts {
        #[arg(long, help = "Baseline export directory")]
        baseline_dir: PathBuf,
        #[arg(long, help = "Reformed export directory")]
        reform_dir: PathBuf,
        #[arg(long, default_value = "charts", help = "Output directory for chart JSON")]
        out: PathBuf,
    },
    #[command(about = "Equal-split and optimal loss for each flat tax rate, written as CSV")]
    Sweep {
        #[command(flatten)]
        search: SearchArgs,
        #[command(flatten)]
        sweep: SweepArgs,
    },
    #[command(about = "Serve the loss and solved policy over HTTP")]
    Serve {
        #[command(flatten)]
        search: SearchArgs,
        #[arg(long, default_value_t = DEFAULT_PORT, help = "Port to listen on")]
        port: u16,
    },
}

#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    #[arg(
        long,
        global = true,
        default_value = DEFAULT_DATASET_PATH,
        help = "Cached unit table (gzip CSV)"
    )]
    pub dataset: PathBuf,
    #[arg(
        long,
        global = true,
        help = "Baseline microsimulation export, used when the cache must be rebuilt"
    )]
    pub baseline_microdata: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        help = "Funding-only microsimulation export, used when the cache must be rebuilt"
    )]
    pub funded_microdata: Option<PathBuf>,
    #[arg(long, global = true, value_enum, default_value_t = CliWeighting::Population)]
    pub weighting: CliWeighting,
    #[arg(
        long,
        global = true,
        default_value_t = DEFAULT_INCOME_FLOOR,
        help = "Lower bound on baseline income in the loss denominator"
    )]
    pub income_floor: f64,
}

impl DataArgs {
    pub fn loss_options(&self) -> LossOptions {
        LossOptions {
            weighting: self.weighting.into(),
            income_floor: self.income_floor,
        }
    }

    pub fn load_table(&self) -> Result<UnitTable, DatasetError> {
        let cache = DatasetCache::new(&self.dataset);
        cache.load_or_generate(|| match (&self.baseline_microdata, &self.funded_microdata) {
            (Some(baseline), Some(funded)) => {
                let baseline = ExportedSimulation::open(baseline)?;
                let funded = ExportedSimulation::open(funded)?;
                aggregate_units(&baseline, &funded)
            }
            _ => Err(DatasetError::Missing(cache.path().to_path_buf())),
        })
    }

    pub fn loss_context(&self) -> Result<LossContext, Error> {
        let table = self.load_table()?;
        Ok(LossContext::new(table, self.loss_options())?)
    }
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    #[arg(long, default_value_t = DEFAULT_UPPER_BOUND, help = "Upper bound on each searched amount")]
    pub upper_bound: f64,
    #[arg(long, default_value_t = 1000, help = "Maximum generations")]
    pub max_generations: u32,
    #[arg(long, default_value_t = 15, help = "Population size per searched dimension")]
    pub population_multiplier: usize,
    #[arg(long, default_value_t = 0.01, help = "Relative convergence tolerance")]
    pub tolerance: f64,
    #[arg(long, default_value_t = 0.0, help = "Absolute convergence tolerance")]
    pub absolute_tolerance: f64,
    #[arg(long, default_value_t = 0.5, help = "Lower end of the dithered mutation factor")]
    pub mutation_min: f64,
    #[arg(long, default_value_t = 1.0, help = "Upper end of the dithered mutation factor")]
    pub mutation_max: f64,
    #[arg(long, default_value_t = 0.7, help = "Crossover probability")]
    pub recombination: f64,
    #[arg(long, help = "Seed for a reproducible search")]
    pub seed: Option<u64>,
    #[arg(
        long,
        default_value_t = DEFAULT_SANITY_THRESHOLD,
        help = "Warn when the solved loss exceeds this value"
    )]
    pub sanity_threshold: f64,
}

impl SearchArgs {
    pub fn solve_config(&self) -> SolveConfig {
        SolveConfig {
            bounds: [Bounds::new(0.0, self.upper_bound); 4],
            evolution: EvolutionConfig {
                population_multiplier: self.population_multiplier,
                max_generations: self.max_generations,
                tolerance: self.tolerance,
                absolute_tolerance: self.absolute_tolerance,
                mutation: (self.mutation_min, self.mutation_max),
                recombination: self.recombination,
                seed: self.seed,
            },
            sanity_threshold: self.sanity_threshold,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct SweepArgs {
    #[arg(long, help = "Baseline export directory")]
    pub baseline_dir: PathBuf,
    #[arg(
        long,
        help = "Directory of funding-only exports, one flat_tax_<rate> subdirectory per rate"
    )]
    pub funded_root: PathBuf,
    #[arg(
        long,
        help = "Directory of reformed exports per rate, adds poverty and Gini changes"
    )]
    pub reform_root: Option<PathBuf>,
    #[arg(long, help = "Write each rate's solved policy into this directory")]
    pub policy_dir: Option<PathBuf>,
    #[arg(long, default_value_t = 0.0, help = "First flat tax rate")]
    pub start_rate: f64,
    #[arg(long, default_value_t = 0.5, help = "Last flat tax rate")]
    pub end_rate: f64,
    #[arg(long, default_value_t = 0.01, help = "Step between rates")]
    pub rate_step: f64,
    #[arg(long, default_value = DEFAULT_SWEEP_PATH, help = "Output CSV")]
    pub out: PathBuf,
}

impl SweepArgs {
    pub fn to_sweep(&self, options: LossOptions, config: SolveConfig) -> Sweep {
        Sweep {
            baseline_dir: self.baseline_dir.clone(),
            funded_root: self.funded_root.clone(),
            reform_root: self.reform_root.clone(),
            policy_dir: self.policy_dir.clone(),
            range: RateRange {
                start: self.start_rate,
                end: self.end_rate,
                step: self.rate_step,
            },
            options,
            config,
        }
    }
}

pub async fn run(cli: Cli) -> Result<(), Error> {
    match cli.command {
        Command::Solve { search, policy } => {
            let ctx = cli.data.loss_context()?;
            let result = solve(&ctx, &search.solve_config())?;
            print!("{}", format_solution(&result));
            PolicyFile::new(&result.amounts, FundingReform::default()).save(&policy)?;
            info!(path = %policy.display(), "saved policy");
        }
        Command::Evaluate {
            young_child,
            older_child,
            young_adult,
            adult,
        } => {
            let ctx = cli.data.loss_context()?;
            let amounts = ctx.expand(&[young_child, older_child, young_adult, adult]);
            let loss = ctx.loss_for_amounts(&amounts);
            print!("{}", format_amounts(&amounts, loss));
        }
        Command::Compare { search, policy } => {
            let ctx = cli.data.loss_context()?;
            let optimal = optimal_amounts(&ctx, &search, &policy)?;
            let optimal_loss = ctx.loss_for_amounts(&optimal);
            print!(
                "{}",
                format_comparison(&equal_split(&ctx), &optimal, optimal_loss)
            );
        }
        Command::ShowPolicy { policy } => {
            let file = PolicyFile::load(&policy)?;
            println!("{}", serde_json::to_string_pretty(&file.reform())?);
        }
        Command::Charts {
            baseline_dir,
            reform_dir,
            out,
        } => {
            let baseline = ExportedSimulation::open(&baseline_dir)?;
            let reformed = ExportedSimulation::open(&reform_dir)?;
            let frame = ImpactFrame::from_simulations(&baseline, &reformed)?;
            for file in write_report(&out, &frame)? {
                println!("{}", out.join(file).display());
            }
        }
        Command::Sweep { search, sweep } => {
            let rows = sweep
                .to_sweep(cli.data.loss_options(), search.solve_config())
                .run()?;
            for row in &rows {
                println!("{}", format_sweep_row(row));
            }
            write_sweep(&sweep.out, &rows)?;
            info!(path = %sweep.out.display(), rates = rows.len(), "wrote flat tax sweep");
        }
        Command::Serve { search, port } => {
            let ctx = cli.data.loss_context()?;
            let state = Arc::new(ApiState::new(ctx, search.solve_config()));
            run_http_server(port, state).await.map_err(Error::Server)?;
        }
    }
    Ok(())
}

fn optimal_amounts(
    ctx: &LossContext,
    search: &SearchArgs,
    policy: &Path,
) -> Result<BandAmounts, Error> {
    if policy.exists() {
        info!(path = %policy.display(), "comparing against saved policy");
        return Ok(PolicyFile::load(policy)?.policy.to_amounts());
    }
    info!(path = %policy.display(), "no saved policy, solving");
    Ok(solve(ctx, &search.solve_config())?.amounts)
}

pub fn format_amounts(amounts: &BandAmounts, loss: f64) -> String {
    let mut out = String::new();
    for band in Band::ALL {
        let _ = writeln!(
            out,
            "  {}: {} per year",
            band.age_label(),
            currency(amounts.get(band))
        );
    }
    let _ = writeln!(out, "Mean percentage loss: {}", percent(loss, 3));
    out
}

pub fn format_solution(result: &SolveResult) -> String {
    let mut out = String::from("Optimal UBI levels:\n");
    out.push_str(&format_amounts(&result.amounts, result.loss));
    let _ = writeln!(
        out,
        "{} ({} generations, {} evaluations)",
        result.message, result.generations, result.evaluations
    );
    out
}

pub fn format_comparison(equal: &EqualSplit, optimal: &BandAmounts, optimal_loss: f64) -> String {
    let mut out = format!(
        "Equal split: {} per person per year\nEqual split mean percentage loss: {}\n",
        currency(equal.amount),
        percent(equal.loss, 3)
    );
    out.push_str("Optimal UBI levels:\n");
    out.push_str(&format_amounts(optimal, optimal_loss));
    let _ = writeln!(
        out,
        "Loss reduction from optimizing: {}",
        percent(equal.loss - optimal_loss, 3)
    );
    out
}

pub fn format_sweep_row(row: &SweepRow) -> String {
    let mut out = format!(
        "Flat tax: {}, equal loss: {}, optimal loss: {}",
        percent(row.flat_tax, 0),
        percent(row.equal_loss, 2),
        percent(row.optimal_loss, 2)
    );
    if let (Some(poverty), Some(gini)) = (row.poverty_rate_change, row.gini_change) {
        let _ = write!(
            out,
            ", poverty rate change: {}, gini change: {}",
            percent(poverty, 2),
            percent(gini, 2)
        );
    }
    out
}
