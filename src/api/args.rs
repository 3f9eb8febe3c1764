use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::core::{
    AccountCategory, AccountConfig, FilingStatus, IncomeInput, ProjectionConfig, TaxYearConfig,
};

#[derive(Parser, Debug)]
#[command(
    name = "nestegg",
    about = "Tax calculator and Monte Carlo retirement projector (401k + Roth + employer equity)"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the JSON API over HTTP.
    Serve(ServeArgs),
    /// Run a Monte Carlo projection and print per-year statistics.
    Project(ProjectionArgs),
    /// Summarize income, payroll and state taxes for one year.
    Tax(TaxArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long, default_value_t = 8080)]
    pub port: u16,
    #[arg(long, help = "Tax year tables as JSON; defaults to the bundled 2024 tables")]
    pub tax_config: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliFilingStatus {
    Single,
    Married,
}

impl From<CliFilingStatus> for FilingStatus {
    fn from(value: CliFilingStatus) -> Self {
        match value {
            CliFilingStatus::Single => FilingStatus::Single,
            CliFilingStatus::Married => FilingStatus::Married,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ProjectionArgs {
    #[arg(long)]
    pub current_age: u32,
    #[arg(long, default_value_t = 65, help = "Age to project through")]
    pub target_age: u32,
    #[arg(long)]
    pub salary: f64,
    #[arg(long, default_value_t = 3.0, help = "Annual salary raise in percent")]
    pub annual_raise: f64,
    #[arg(long, default_value_t = 0, help = "Years already worked at the employer")]
    pub tenure_years: u32,
    #[arg(long, default_value_t = 1000)]
    pub simulations: u32,
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
    #[arg(long, default_value_t = 2025)]
    pub start_year: i32,
    #[arg(
        long,
        default_value_t = false,
        help = "Contribute and grow during the opening year instead of recording the seed balances"
    )]
    pub grow_first_period: bool,
    #[arg(
        long,
        default_value_t = 10_000_000,
        help = "Largest simulations x years workload accepted"
    )]
    pub max_workload: u64,

    #[arg(long, default_value_t = 0.0)]
    pub deferred_balance: f64,
    #[arg(long, default_value_t = 6.0, help = "401(k) personal contribution in percent of salary")]
    pub deferred_personal_rate: f64,
    #[arg(long, default_value_t = 4.0, help = "401(k) employer match in percent of salary")]
    pub deferred_employer_rate: f64,
    #[arg(long, default_value_t = 7.0, help = "Expected annual 401(k) return in percent")]
    pub deferred_return: f64,
    #[arg(long, default_value_t = 15.0, help = "401(k) return variance in percent")]
    pub deferred_variance: f64,

    #[arg(long, default_value_t = 0.0)]
    pub advantaged_balance: f64,
    #[arg(long, default_value_t = 5.0, help = "Roth contribution in percent of salary")]
    pub advantaged_rate: f64,
    #[arg(long, default_value_t = 7.0)]
    pub advantaged_return: f64,
    #[arg(long, default_value_t = 15.0)]
    pub advantaged_variance: f64,

    #[arg(long, default_value_t = 0.0)]
    pub equity_balance: f64,
    #[arg(long, default_value_t = 0.0, help = "Annual equity grant in percent of salary")]
    pub equity_grant_rate: f64,
    #[arg(long, default_value_t = 4)]
    pub equity_vesting_years: u32,
    #[arg(long, default_value_t = 9.0)]
    pub equity_return: f64,
    #[arg(long, default_value_t = 25.0)]
    pub equity_variance: f64,

    #[arg(long, help = "Tax year tables as JSON; supplies contribution ceilings")]
    pub tax_config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct TaxArgs {
    #[arg(long)]
    pub gross_income: f64,
    #[arg(long, default_value_t = 0.0, help = "Annual 401(k) contribution")]
    pub retirement_contribution: f64,
    #[arg(long, default_value_t = false)]
    pub roth_401k: bool,
    #[arg(long, default_value_t = 0.0, help = "Annual IRA contribution")]
    pub ira_contribution: f64,
    #[arg(long, default_value_t = false)]
    pub roth_ira: bool,
    #[arg(long, value_enum, default_value_t = CliFilingStatus::Single)]
    pub filing_status: CliFilingStatus,
    #[arg(long, default_value = "MI", help = "Two-letter state code")]
    pub region: String,
    #[arg(long)]
    pub tax_config: Option<PathBuf>,
}

pub(crate) fn default_projection_args() -> ProjectionArgs {
    ProjectionArgs {
        current_age: 30,
        target_age: 65,
        salary: 80_000.0,
        annual_raise: 3.0,
        tenure_years: 0,
        simulations: 1_000,
        seed: 42,
        start_year: 2025,
        grow_first_period: false,
        max_workload: 10_000_000,
        deferred_balance: 25_000.0,
        deferred_personal_rate: 6.0,
        deferred_employer_rate: 4.0,
        deferred_return: 7.0,
        deferred_variance: 15.0,
        advantaged_balance: 10_000.0,
        advantaged_rate: 5.0,
        advantaged_return: 7.0,
        advantaged_variance: 15.0,
        equity_balance: 0.0,
        equity_grant_rate: 0.0,
        equity_vesting_years: 4,
        equity_return: 9.0,
        equity_variance: 25.0,
        tax_config: None,
    }
}

pub(crate) fn default_tax_args() -> TaxArgs {
    TaxArgs {
        gross_income: 80_000.0,
        retirement_contribution: 0.0,
        roth_401k: false,
        ira_contribution: 0.0,
        roth_ira: false,
        filing_status: CliFilingStatus::Single,
        region: "MI".to_string(),
        tax_config: None,
    }
}

pub fn build_projection(
    args: &ProjectionArgs,
    config: &TaxYearConfig,
) -> Result<ProjectionConfig, String> {
    if args.target_age <= args.current_age {
        return Err("--target-age must be > --current-age".to_string());
    }
    if args.simulations == 0 {
        return Err("--simulations must be > 0".to_string());
    }
    if !args.salary.is_finite() || args.salary < 0.0 {
        return Err("--salary must be >= 0".to_string());
    }
    if !args.annual_raise.is_finite() || args.annual_raise <= -100.0 {
        return Err("--annual-raise must be > -100".to_string());
    }
    if args.equity_vesting_years == 0 {
        return Err("--equity-vesting-years must be > 0".to_string());
    }
    for (name, rate) in [
        ("--deferred-personal-rate", args.deferred_personal_rate),
        ("--deferred-employer-rate", args.deferred_employer_rate),
        ("--advantaged-rate", args.advantaged_rate),
        ("--equity-grant-rate", args.equity_grant_rate),
    ] {
        if !(0.0..=100.0).contains(&rate) {
            return Err(format!("{name} must be between 0 and 100"));
        }
    }
    for (name, balance) in [
        ("--deferred-balance", args.deferred_balance),
        ("--advantaged-balance", args.advantaged_balance),
        ("--equity-balance", args.equity_balance),
    ] {
        if !balance.is_finite() || balance < 0.0 {
            return Err(format!("{name} must be >= 0"));
        }
    }
    for (name, variance) in [
        ("--deferred-variance", args.deferred_variance),
        ("--advantaged-variance", args.advantaged_variance),
        ("--equity-variance", args.equity_variance),
    ] {
        if !variance.is_finite() || variance < 0.0 {
            return Err(format!("{name} must be >= 0"));
        }
    }

    let accounts = vec![
        AccountConfig {
            category: AccountCategory::TaxDeferred,
            initial_balance: args.deferred_balance,
            personal_rate: args.deferred_personal_rate / 100.0,
            employer_rate: args.deferred_employer_rate / 100.0,
            contribution_ceiling: config.contribution_ceiling(AccountCategory::TaxDeferred),
            vesting_years: None,
            expected_return_percent: args.deferred_return,
            return_variance_percent: args.deferred_variance,
        },
        AccountConfig {
            category: AccountCategory::TaxAdvantaged,
            initial_balance: args.advantaged_balance,
            personal_rate: args.advantaged_rate / 100.0,
            employer_rate: 0.0,
            contribution_ceiling: config.contribution_ceiling(AccountCategory::TaxAdvantaged),
            vesting_years: None,
            expected_return_percent: args.advantaged_return,
            return_variance_percent: args.advantaged_variance,
        },
        AccountConfig {
            category: AccountCategory::Equity,
            initial_balance: args.equity_balance,
            personal_rate: 0.0,
            employer_rate: args.equity_grant_rate / 100.0,
            contribution_ceiling: config.contribution_ceiling(AccountCategory::Equity),
            vesting_years: Some(args.equity_vesting_years),
            expected_return_percent: args.equity_return,
            return_variance_percent: args.equity_variance,
        },
    ];

    Ok(ProjectionConfig {
        accounts,
        salary: args.salary,
        annual_raise: args.annual_raise / 100.0,
        tenure_years: args.tenure_years,
        horizon_years: args.target_age - args.current_age,
        simulations: args.simulations,
        start_year: args.start_year,
        seed: args.seed,
        grow_first_period: args.grow_first_period,
        max_workload: Some(args.max_workload),
    })
}

pub fn build_income(args: &TaxArgs) -> Result<IncomeInput, String> {
    for (name, amount) in [
        ("--gross-income", args.gross_income),
        ("--retirement-contribution", args.retirement_contribution),
        ("--ira-contribution", args.ira_contribution),
    ] {
        if !amount.is_finite() || amount < 0.0 {
            return Err(format!("{name} must be >= 0"));
        }
    }
    if args.region.trim().is_empty() {
        return Err("--region must not be empty".to_string());
    }

    Ok(IncomeInput {
        gross_income: args.gross_income,
        retirement_contribution: args.retirement_contribution,
        retirement_contribution_is_roth: args.roth_401k,
        ira_contribution: args.ira_contribution,
        ira_contribution_is_roth: args.roth_ira,
        filing_status: args.filing_status.into(),
        region: args.region.clone(),
    })
}
