use serde::Serialize;

use super::error::{EngineError, ensure_non_negative};

/// Longest loan term `amortize` will schedule.
pub const MAX_TERM_YEARS: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmortizationRow {
    pub month: u32,
    pub payment: f64,
    pub principal: f64,
    pub interest: f64,
    pub total_interest: f64,
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Amortization {
    pub monthly_payment: f64,
    pub total_interest: f64,
    pub schedule: Vec<AmortizationRow>,
}

/// Level monthly payment that retires `principal` over `months`.
pub fn monthly_payment(principal: f64, monthly_rate: f64, months: u32) -> f64 {
    if monthly_rate == 0.0 {
        return principal / months as f64;
    }
    let discount = (1.0 + monthly_rate).powf(-f64::from(months));
    principal * monthly_rate / (1.0 - discount)
}

/// Fixed-rate, fully amortizing loan schedule with one row per month.
pub fn amortize(
    principal: f64,
    annual_rate_percent: f64,
    term_years: u32,
) -> Result<Amortization, EngineError> {
    if !principal.is_finite() || principal <= 0.0 {
        return Err(EngineError::invalid("principal must be > 0"));
    }
    if term_years == 0 {
        return Err(EngineError::invalid("loan term must be > 0 years"));
    }
    if term_years > MAX_TERM_YEARS {
        return Err(EngineError::TooLarge {
            requested: u64::from(term_years),
            budget: u64::from(MAX_TERM_YEARS),
        });
    }
    ensure_non_negative("interest rate", annual_rate_percent)?;

    let months = term_years * 12;
    let monthly_rate = annual_rate_percent / 100.0 / 12.0;
    let payment = monthly_payment(principal, monthly_rate, months);

    let mut balance = principal;
    let mut total_interest = 0.0;
    let schedule = (1..=months)
        .map(|month| {
            let interest = balance * monthly_rate;
            let principal_paid = payment - interest;
            total_interest += interest;
            balance -= principal_paid;
            AmortizationRow {
                month,
                payment,
                principal: principal_paid,
                interest,
                total_interest,
                balance: balance.max(0.0),
            }
        })
        .collect();

    Ok(Amortization {
        monthly_payment: payment,
        total_interest,
        schedule,
    })
}
