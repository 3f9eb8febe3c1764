use serde::Serialize;

use super::config::TaxYearConfig;
use super::error::{EngineError, ensure_fraction, ensure_non_negative};
use super::types::FilingStatus;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxBreakdown {
    pub social_security: f64,
    pub medicare: f64,
    pub additional_medicare: f64,
    pub state: f64,
}

impl TaxBreakdown {
    pub fn total_payroll(&self) -> f64 {
        self.social_security + self.medicare + self.additional_medicare
    }

    pub fn total(&self) -> f64 {
        self.total_payroll() + self.state
    }
}

/// Payroll taxes on `gross_income` and a flat state tax on `taxable_income`.
///
/// The four components are independent of one another.
pub fn compute_payroll_and_state(
    gross_income: f64,
    taxable_income: f64,
    filing_status: FilingStatus,
    state_rate: f64,
    config: &TaxYearConfig,
) -> Result<TaxBreakdown, EngineError> {
    ensure_non_negative("gross income", gross_income)?;
    ensure_non_negative("taxable income", taxable_income)?;
    ensure_fraction("state rate", state_rate)?;

    let payroll = &config.payroll;
    let surtax_threshold = config.additional_medicare_threshold(filing_status)?;

    Ok(TaxBreakdown {
        social_security: gross_income.min(payroll.social_security_wage_cap)
            * payroll.social_security_rate,
        medicare: gross_income * payroll.medicare_rate,
        additional_medicare: (gross_income - surtax_threshold).max(0.0)
            * payroll.additional_medicare_rate,
        state: taxable_income * state_rate,
    })
}
