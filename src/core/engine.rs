use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use tracing::debug;

use super::error::{EngineError, ensure_non_negative};
use super::projector::advance;
use super::returns::{SeededUniforms, UniformSource, derive_seed, sample_return};
use super::types::{
    AccountCategory, AccountState, ProjectionConfig, ProjectionResult, YearlyStatistic,
};

/// One year of one trial for a single account.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialPoint {
    pub year: i32,
    pub balance: f64,
    pub appreciation: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationTrial {
    pub category: AccountCategory,
    pub points: Vec<TrialPoint>,
}

/// Cross-trial balances, indexed `[year][trial]` per category.
///
/// Shards built on different threads are merged by concatenation before any
/// percentile is taken.
#[derive(Debug, Clone, Default)]
pub struct SimulationMatrix {
    years: usize,
    trials: usize,
    categories: BTreeMap<AccountCategory, Vec<Vec<f64>>>,
    total: Vec<Vec<f64>>,
}

impl SimulationMatrix {
    pub fn new(categories: &[AccountCategory], years: usize) -> Self {
        let make = || (0..years).map(|_| Vec::new()).collect::<Vec<_>>();
        Self {
            years,
            trials: 0,
            categories: categories.iter().map(|&c| (c, make())).collect(),
            total: make(),
        }
    }

    pub fn trials(&self) -> usize {
        self.trials
    }

    pub fn push_trial(&mut self, trial: &[SimulationTrial]) {
        let mut totals = vec![0.0; self.years];
        for account in trial {
            let Some(columns) = self.categories.get_mut(&account.category) else {
                continue;
            };
            for (idx, point) in account.points.iter().take(self.years).enumerate() {
                columns[idx].push(point.balance);
                totals[idx] += point.balance;
            }
        }
        for (column, value) in self.total.iter_mut().zip(totals) {
            column.push(value);
        }
        self.trials += 1;
    }

    pub fn merge(mut self, other: SimulationMatrix) -> Self {
        for (category, columns) in other.categories {
            let into = self
                .categories
                .entry(category)
                .or_insert_with(|| (0..other.years).map(|_| Vec::new()).collect());
            for (dst, src) in into.iter_mut().zip(columns) {
                dst.extend(src);
            }
        }
        for (dst, src) in self.total.iter_mut().zip(other.total) {
            dst.extend(src);
        }
        self.trials += other.trials;
        self
    }

    pub fn into_result(self, start_year: i32, horizon_years: u32) -> ProjectionResult {
        let simulations = self.trials as u32;
        let categories = self
            .categories
            .into_iter()
            .map(|(category, columns)| (category, yearly_statistics(columns, start_year)))
            .collect();
        ProjectionResult {
            simulations,
            horizon_years,
            categories,
            total: yearly_statistics(self.total, start_year),
        }
    }
}

fn yearly_statistics(columns: Vec<Vec<f64>>, start_year: i32) -> Vec<YearlyStatistic> {
    columns
        .into_iter()
        .enumerate()
        .map(|(idx, mut values)| summarize(start_year + idx as i32, &mut values))
        .collect()
}

pub fn summarize(year: i32, values: &mut [f64]) -> YearlyStatistic {
    let q1 = percentile(values, 25.0);
    let median = percentile(values, 50.0);
    let q3 = percentile(values, 75.0);
    // percentile() leaves the slice sorted.
    let min = values.first().copied().unwrap_or(0.0);
    let max = values.last().copied().unwrap_or(0.0);
    YearlyStatistic {
        year,
        min,
        q1,
        median,
        q3,
        max,
    }
}

pub fn validate_projection(config: &ProjectionConfig) -> Result<(), EngineError> {
    if config.simulations == 0 {
        return Err(EngineError::invalid("simulations must be > 0"));
    }
    if config.horizon_years == 0 {
        return Err(EngineError::invalid("horizon must be > 0 years"));
    }
    let last_year = i32::try_from(config.horizon_years - 1)
        .ok()
        .and_then(|offset| config.start_year.checked_add(offset));
    if last_year.is_none() {
        return Err(EngineError::invalid(format!(
            "a {}-year horizon starting in {} runs past the last representable year",
            config.horizon_years, config.start_year
        )));
    }
    if config.accounts.is_empty() {
        return Err(EngineError::invalid("at least one account is required"));
    }
    ensure_non_negative("salary", config.salary)?;
    if !config.annual_raise.is_finite() || config.annual_raise <= -1.0 {
        return Err(EngineError::invalid("annual raise must be > -1"));
    }

    let mut seen = BTreeSet::new();
    for account in &config.accounts {
        if !seen.insert(account.category) {
            return Err(EngineError::invalid(format!(
                "account {} is listed more than once",
                account.category
            )));
        }
        ensure_non_negative("initial balance", account.initial_balance)?;
        ensure_non_negative("return variance", account.return_variance_percent)?;
        if !account.expected_return_percent.is_finite() {
            return Err(EngineError::invalid("expected return must be finite"));
        }
        match (account.category, account.vesting_years) {
            (_, Some(0)) => {
                return Err(EngineError::invalid(format!(
                    "{} vesting years must be > 0",
                    account.category
                )));
            }
            (AccountCategory::Equity, None) => {
                return Err(EngineError::invalid("equity account requires vesting years"));
            }
            _ => {}
        }
    }

    if let Some(budget) = config.max_workload {
        let requested = config.simulations as u64 * config.horizon_years as u64;
        if requested > budget {
            return Err(EngineError::TooLarge { requested, budget });
        }
    }
    Ok(())
}

/// Runs the Monte Carlo projection with seeded randomness.
pub fn run_projection(config: &ProjectionConfig) -> Result<ProjectionResult, EngineError> {
    run_projection_with(config, SeededUniforms::new)
}

/// Runs the projection drawing each trial's uniforms from `make_source(trial_seed)`.
///
/// Trial seeds depend only on the base seed and the trial id, so the result
/// does not depend on how rayon schedules the trials.
pub fn run_projection_with<S, F>(
    config: &ProjectionConfig,
    make_source: F,
) -> Result<ProjectionResult, EngineError>
where
    S: UniformSource,
    F: Fn(u64) -> S + Sync,
{
    validate_projection(config)?;

    let categories = config.accounts.iter().map(|a| a.category).collect::<Vec<_>>();
    let years = config.horizon_years as usize;
    debug!(
        simulations = config.simulations,
        horizon_years = config.horizon_years,
        accounts = categories.len(),
        "running projection"
    );

    let matrix = (0..config.simulations)
        .into_par_iter()
        .try_fold(
            || SimulationMatrix::new(&categories, years),
            |mut shard, trial_id| {
                let mut source = make_source(derive_seed(config.seed, trial_id));
                let trial = simulate_trial(config, &mut source)?;
                shard.push_trial(&trial);
                Ok::<_, EngineError>(shard)
            },
        )
        .try_reduce(
            || SimulationMatrix::new(&categories, years),
            |a, b| Ok(a.merge(b)),
        )?;

    debug!(trials = matrix.trials(), "projection trials merged");
    Ok(matrix.into_result(config.start_year, config.horizon_years))
}

/// Plays one trial across the whole horizon. Each account owns its own
/// state; salary compounds year over year within the trial only.
pub fn simulate_trial<S: UniformSource + ?Sized>(
    config: &ProjectionConfig,
    source: &mut S,
) -> Result<Vec<SimulationTrial>, EngineError> {
    let mut states = config
        .accounts
        .iter()
        .map(|a| AccountState::seeded(a, config.tenure_years))
        .collect::<Vec<_>>();
    let mut trials = config
        .accounts
        .iter()
        .map(|a| SimulationTrial {
            category: a.category,
            points: Vec::with_capacity(config.horizon_years as usize),
        })
        .collect::<Vec<_>>();

    let mut salary = config.salary;
    for year_idx in 0..config.horizon_years {
        let is_first_period = year_idx == 0 && !config.grow_first_period;
        let year = config.start_year + year_idx as i32;

        for ((account, state), trial) in config
            .accounts
            .iter()
            .zip(states.iter_mut())
            .zip(trials.iter_mut())
        {
            let return_rate = sample_return(
                account.expected_return_percent,
                account.return_variance_percent,
                source,
            );
            let (next, record) = advance(state, salary, return_rate, is_first_period)?;
            *state = next;
            trial.points.push(TrialPoint {
                year,
                balance: record.balance,
                appreciation: record.appreciation,
            });
        }

        salary *= 1.0 + config.annual_raise;
    }

    Ok(trials)
}

pub fn percentile(values: &mut [f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    values.sort_by(|a, b| a.total_cmp(b));

    let n = values.len();
    if n == 1 {
        return values[0];
    }

    let rank = (p / 100.0) * (n as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    if lower == upper {
        values[lower]
    } else {
        let w = rank - lower as f64;
        values[lower] * (1.0 - w) + values[upper] * w
    }
}
