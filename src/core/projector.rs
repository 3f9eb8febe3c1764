use super::error::{EngineError, ensure_fraction, ensure_non_negative};
use super::types::{AccountCategory, AccountState, PeriodRecord};

#[derive(Debug, Clone, Copy, PartialEq)]
struct ContributionSplit {
    personal: f64,
    employer: f64,
}

impl ContributionSplit {
    fn total(self) -> f64 {
        self.personal + self.employer
    }
}

fn validate_state(state: &AccountState) -> Result<(), EngineError> {
    if state.vesting_years == Some(0) {
        return Err(EngineError::invalid(format!(
            "{} vesting years must be > 0",
            state.category
        )));
    }
    if !state.balance.is_finite() {
        return Err(EngineError::invalid(format!(
            "{} balance must be finite",
            state.category
        )));
    }
    ensure_fraction("personal contribution rate", state.contribution_rate_personal)?;
    ensure_fraction("employer contribution rate", state.contribution_rate_employer)?;
    if let Some(ceiling) = state.contribution_ceiling {
        ensure_non_negative("contribution ceiling", ceiling)?;
    }
    Ok(())
}

/// Personal contribution is capped first; the employer share only fills
/// whatever headroom the ceiling leaves.
fn split_contribution(state: &AccountState, salary: f64) -> ContributionSplit {
    let personal = salary * state.contribution_rate_personal;
    let employer = match state.category {
        AccountCategory::TaxDeferred => {
            salary
                * state
                    .contribution_rate_employer
                    .min(state.contribution_rate_personal)
        }
        AccountCategory::Equity => salary * state.contribution_rate_employer,
        AccountCategory::TaxAdvantaged => 0.0,
    };

    match state.contribution_ceiling {
        Some(ceiling) => {
            let personal = personal.min(ceiling);
            let employer = employer.min((ceiling - personal).max(0.0));
            ContributionSplit { personal, employer }
        }
        None => ContributionSplit { personal, employer },
    }
}

/// Linear vesting; `None` means always fully vested.
pub fn vested_fraction(tenure_years: u32, vesting_years: Option<u32>) -> Result<f64, EngineError> {
    match vesting_years {
        None => Ok(1.0),
        Some(0) => Err(EngineError::invalid("vesting years must be > 0")),
        Some(years) => Ok((tenure_years as f64 / years as f64).min(1.0)),
    }
}

/// Advances one account by one year.
///
/// On the opening period nothing is contributed and the seeded balance does
/// not appreciate. Tenure grows by one year per period.
pub fn advance(
    state: &AccountState,
    salary: f64,
    return_rate: f64,
    is_first_period: bool,
) -> Result<(AccountState, PeriodRecord), EngineError> {
    validate_state(state)?;
    ensure_non_negative("salary", salary)?;
    if !return_rate.is_finite() {
        return Err(EngineError::invalid(format!(
            "return rate must be finite, got {return_rate}"
        )));
    }

    let (split, appreciation) = if is_first_period {
        (
            ContributionSplit {
                personal: 0.0,
                employer: 0.0,
            },
            0.0,
        )
    } else {
        (split_contribution(state, salary), state.balance * return_rate)
    };

    let contribution = split.total();
    let balance = (state.balance + contribution + appreciation).max(0.0);
    let vested = vested_fraction(state.tenure_years, state.vesting_years)?;

    let next = AccountState {
        balance,
        tenure_years: state.tenure_years.saturating_add(1),
        period: state.period + 1,
        ..*state
    };
    let record = PeriodRecord {
        year_index: state.period,
        return_rate,
        personal_contribution: split.personal,
        employer_contribution: split.employer,
        contribution,
        appreciation,
        balance,
        vested_fraction: vested,
        vested_balance: vested * balance,
    };
    Ok((next, record))
}
