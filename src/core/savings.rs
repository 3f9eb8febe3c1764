use serde::Serialize;

use super::error::{EngineError, ensure_non_negative};

/// Longest plan `project_savings` will lay out.
pub const MAX_PLAN_YEARS: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsRow {
    /// Zero-based plan year.
    pub year: u32,
    /// 1 through 12.
    pub month: u32,
    pub monthly_savings: f64,
    pub cumulative_savings: f64,
    pub yearly_income: f64,
}

/// Month-by-month savings at a fixed share of an income that rises once a year.
pub fn project_savings(
    starting_income: f64,
    annual_raise_percent: f64,
    savings_rate_percent: f64,
    years: u32,
) -> Result<Vec<SavingsRow>, EngineError> {
    ensure_non_negative("starting income", starting_income)?;
    if !annual_raise_percent.is_finite() || annual_raise_percent <= -100.0 {
        return Err(EngineError::invalid("annual raise must be > -100%"));
    }
    if !(0.0..=100.0).contains(&savings_rate_percent) {
        return Err(EngineError::invalid(format!(
            "savings rate must be between 0 and 100, got {savings_rate_percent}"
        )));
    }

    if years > MAX_PLAN_YEARS {
        return Err(EngineError::TooLarge {
            requested: u64::from(years),
            budget: u64::from(MAX_PLAN_YEARS),
        });
    }

    let mut rows = Vec::with_capacity(years as usize * 12);
    let mut income = starting_income;
    let mut cumulative = 0.0;
    for year in 0..years {
        let monthly_savings = income * savings_rate_percent / 100.0 / 12.0;
        for month in 1..=12 {
            cumulative += monthly_savings;
            rows.push(SavingsRow {
                year,
                month,
                monthly_savings,
                cumulative_savings: cumulative,
                yearly_income: income,
            });
        }
        income *= 1.0 + annual_raise_percent / 100.0;
    }
    Ok(rows)
}
