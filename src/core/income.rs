use serde::Serialize;

use super::brackets::{marginal_rate, marginal_tax};
use super::config::TaxYearConfig;
use super::error::{EngineError, ensure_non_negative};
use super::payroll::{TaxBreakdown, compute_payroll_and_state};
use super::types::{FilingStatus, ScheduleKind};

/// Ordinary-income tax on an already-computed taxable amount.
pub fn compute_tax(
    taxable_income: f64,
    filing_status: FilingStatus,
    config: &TaxYearConfig,
) -> Result<f64, EngineError> {
    let schedule = config.schedule(ScheduleKind::Ordinary, filing_status)?;
    marginal_tax(taxable_income, schedule)
}

#[derive(Debug, Clone)]
pub struct IncomeInput {
    pub gross_income: f64,
    pub retirement_contribution: f64,
    pub retirement_contribution_is_roth: bool,
    pub ira_contribution: f64,
    pub ira_contribution_is_roth: bool,
    pub filing_status: FilingStatus,
    pub region: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeSummary {
    pub tax_year: u16,
    pub gross_income: f64,
    pub adjusted_gross_income: f64,
    pub standard_deduction: f64,
    pub taxable_income: f64,
    pub federal_tax: f64,
    pub marginal_rate: f64,
    pub payroll: TaxBreakdown,
    pub total_tax: f64,
    pub retirement_contributions: f64,
    pub net_income: f64,
    pub effective_federal_rate: f64,
    pub effective_total_rate: f64,
}

/// Take-home pay after federal, payroll and state taxes and retirement saving.
pub fn summarize_income(
    input: &IncomeInput,
    config: &TaxYearConfig,
) -> Result<IncomeSummary, EngineError> {
    ensure_non_negative("gross income", input.gross_income)?;
    ensure_non_negative("401(k) contribution", input.retirement_contribution)?;
    ensure_non_negative("IRA contribution", input.ira_contribution)?;

    let status = input.filing_status;
    let standard_deduction = config.standard_deduction(status)?;
    let schedule = config.schedule(ScheduleKind::Ordinary, status)?;
    let state_rate = config.region(&input.region)?.rate;

    let pre_tax = |amount: f64, is_roth: bool| if is_roth { 0.0 } else { amount };
    let deducted = pre_tax(
        input.retirement_contribution,
        input.retirement_contribution_is_roth,
    ) + pre_tax(input.ira_contribution, input.ira_contribution_is_roth);

    let adjusted_gross_income = input.gross_income - deducted;
    let taxable_income = (adjusted_gross_income - standard_deduction).max(0.0);

    let federal_tax = marginal_tax(taxable_income, schedule)?;
    let rate = marginal_rate(taxable_income, schedule)?;
    let payroll =
        compute_payroll_and_state(input.gross_income, taxable_income, status, state_rate, config)?;

    let total_tax = federal_tax + payroll.total();
    let retirement_contributions = input.retirement_contribution + input.ira_contribution;
    let net_income = input.gross_income - retirement_contributions - total_tax;

    let (effective_federal_rate, effective_total_rate) = if input.gross_income > 0.0 {
        (
            federal_tax / input.gross_income,
            total_tax / input.gross_income,
        )
    } else {
        (0.0, 0.0)
    };

    Ok(IncomeSummary {
        tax_year: config.tax_year,
        gross_income: input.gross_income,
        adjusted_gross_income,
        standard_deduction,
        taxable_income,
        federal_tax,
        marginal_rate: rate,
        payroll,
        total_tax,
        retirement_contributions,
        net_income,
        effective_federal_rate,
        effective_total_rate,
    })
}
