mod brackets;
mod budget;
mod config;
mod engine;
mod error;
mod gains;
mod income;
mod mortgage;
mod net_worth;
mod payroll;
mod projector;
mod pto;
mod returns;
mod savings;
mod types;

pub use brackets::{BracketSlice, bracket_slices, marginal_rate, marginal_tax, stacked_tax};
pub use budget::{
    Budget, BudgetCategory, BudgetEntry, BudgetRecord, BudgetReport, CategoryReport,
    CategoryStatus, HealthLabel,
};
pub use config::{ContributionLimits, PayrollConfig, RegionRate, SurtaxConfig, TaxYearConfig};
pub use engine::{
    SimulationMatrix, SimulationTrial, TrialPoint, percentile, run_projection,
    run_projection_with, simulate_trial, summarize, validate_projection,
};
pub use error::EngineError;
pub use gains::{
    AssetSummary, CapitalGainsResult, CapitalGainsTax, GainTotals, GainsInsight, LossLimitation,
    MonthSummary, TaxSettings, TradeBook, limit_losses, net_capital_gains, summarize_by_asset,
    summarize_by_month, tax_on_totals, validate_trade,
};
pub use income::{IncomeInput, IncomeSummary, compute_tax, summarize_income};
pub use mortgage::{Amortization, AmortizationRow, MAX_TERM_YEARS, amortize, monthly_payment};
pub use net_worth::{
    CategoryTotal, NetWorth, NetWorthAccount, NetWorthCategory, NetWorthRecord, NetWorthSummary,
};
pub use payroll::{TaxBreakdown, compute_payroll_and_state};
pub use projector::{advance, vested_fraction};
pub use pto::{AccrualMode, MAX_PTO_PERIODS, PeriodActivity, PtoRow, PtoSettings, plan_time_off};
pub use returns::{ScriptedUniforms, SeededUniforms, UniformSource, sample_return};
pub use savings::{MAX_PLAN_YEARS, SavingsRow, project_savings};
pub use types::{
    AccountCategory, AccountConfig, AccountState, BracketSchedule, FilingStatus,
    LONG_TERM_HOLDING_DAYS, PeriodRecord, ProjectionConfig, ProjectionResult, ScheduleKind,
    TaxBracket, Trade, YearlyStatistic,
};
