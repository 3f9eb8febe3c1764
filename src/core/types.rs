use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::EngineError;

/// Holding period, in days, that a trade must exceed to count as long term.
pub const LONG_TERM_HOLDING_DAYS: i64 = 365;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilingStatus {
    Single,
    #[serde(alias = "married-joint", alias = "marriedJoint")]
    Married,
}

impl fmt::Display for FilingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilingStatus::Single => write!(f, "single"),
            FilingStatus::Married => write!(f, "married"),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScheduleKind {
    Ordinary,
    LongTerm,
}

/// The fixed set of modeled account types.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccountCategory {
    /// 401(k)-style account: personal contribution plus an employer match.
    TaxDeferred,
    /// Roth-style account: personal contribution only.
    TaxAdvantaged,
    /// Employer equity grant, subject to vesting.
    Equity,
}

impl AccountCategory {
    pub const ALL: [AccountCategory; 3] = [
        AccountCategory::TaxDeferred,
        AccountCategory::TaxAdvantaged,
        AccountCategory::Equity,
    ];
}

impl fmt::Display for AccountCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountCategory::TaxDeferred => write!(f, "tax-deferred"),
            AccountCategory::TaxAdvantaged => write!(f, "tax-advantaged"),
            AccountCategory::Equity => write!(f, "equity"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxBracket {
    pub lower_bound: f64,
    /// `None` marks the open-ended top bracket.
    pub upper_bound: Option<f64>,
    pub rate: f64,
}

/// Ordered, gapless brackets covering `[0, inf)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TaxBracket>", into = "Vec<TaxBracket>")]
pub struct BracketSchedule {
    brackets: Vec<TaxBracket>,
}

impl BracketSchedule {
    pub fn new(brackets: Vec<TaxBracket>) -> Result<Self, EngineError> {
        let Some(first) = brackets.first() else {
            return Err(EngineError::invalid("bracket schedule must not be empty"));
        };
        if first.lower_bound != 0.0 {
            return Err(EngineError::invalid(format!(
                "first bracket must start at 0, starts at {}",
                first.lower_bound
            )));
        }

        for (idx, bracket) in brackets.iter().enumerate() {
            if !(0.0..=1.0).contains(&bracket.rate) {
                return Err(EngineError::invalid(format!(
                    "bracket {idx} rate must be between 0 and 1, got {}",
                    bracket.rate
                )));
            }
            let is_last = idx + 1 == brackets.len();
            match (bracket.upper_bound, is_last) {
                (None, true) => {}
                (None, false) => {
                    return Err(EngineError::invalid(format!(
                        "bracket {idx} is unbounded but is not the last bracket"
                    )));
                }
                (Some(_), true) => {
                    return Err(EngineError::invalid(
                        "last bracket must have no upper bound",
                    ));
                }
                (Some(upper), false) => {
                    if upper <= bracket.lower_bound {
                        return Err(EngineError::invalid(format!(
                            "bracket {idx} upper bound {upper} must exceed lower bound {}",
                            bracket.lower_bound
                        )));
                    }
                    let next_lower = brackets[idx + 1].lower_bound;
                    if upper != next_lower {
                        return Err(EngineError::invalid(format!(
                            "bracket {idx} ends at {upper} but bracket {} starts at {next_lower}",
                            idx + 1
                        )));
                    }
                }
            }
        }

        Ok(Self { brackets })
    }

    pub fn brackets(&self) -> &[TaxBracket] {
        &self.brackets
    }
}

impl TryFrom<Vec<TaxBracket>> for BracketSchedule {
    type Error = EngineError;

    fn try_from(value: Vec<TaxBracket>) -> Result<Self, Self::Error> {
        BracketSchedule::new(value)
    }
}

impl From<BracketSchedule> for Vec<TaxBracket> {
    fn from(value: BracketSchedule) -> Self {
        value.brackets
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    #[serde(default)]
    pub id: u64,
    pub asset: String,
    pub purchase_date: NaiveDate,
    pub sale_date: NaiveDate,
    pub purchase_price: f64,
    pub sale_price: f64,
    pub quantity: f64,
    #[serde(default)]
    pub fees: f64,
}

impl Trade {
    pub fn holding_days(&self) -> i64 {
        (self.sale_date - self.purchase_date).num_days()
    }

    pub fn is_long_term(&self) -> bool {
        self.holding_days() > LONG_TERM_HOLDING_DAYS
    }

    pub fn gain_loss(&self) -> f64 {
        self.sale_price * self.quantity - (self.purchase_price * self.quantity + self.fees)
    }
}

/// Seed parameters for one account category. Rates are fractions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountConfig {
    pub category: AccountCategory,
    pub initial_balance: f64,
    pub personal_rate: f64,
    pub employer_rate: f64,
    pub contribution_ceiling: Option<f64>,
    pub vesting_years: Option<u32>,
    pub expected_return_percent: f64,
    pub return_variance_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountState {
    pub category: AccountCategory,
    pub balance: f64,
    pub contribution_rate_personal: f64,
    pub contribution_rate_employer: f64,
    pub contribution_ceiling: Option<f64>,
    /// `None` means the balance is always fully vested.
    pub vesting_years: Option<u32>,
    pub tenure_years: u32,
    /// Periods advanced so far in this trial.
    pub period: u32,
}

impl AccountState {
    pub fn seeded(config: &AccountConfig, tenure_years: u32) -> Self {
        Self {
            category: config.category,
            balance: config.initial_balance,
            contribution_rate_personal: config.personal_rate,
            contribution_rate_employer: config.employer_rate,
            contribution_ceiling: config.contribution_ceiling,
            vesting_years: config.vesting_years,
            tenure_years,
            period: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodRecord {
    pub year_index: u32,
    pub return_rate: f64,
    pub personal_contribution: f64,
    pub employer_contribution: f64,
    pub contribution: f64,
    pub appreciation: f64,
    pub balance: f64,
    pub vested_fraction: f64,
    pub vested_balance: f64,
}

#[derive(Debug, Clone)]
pub struct ProjectionConfig {
    pub accounts: Vec<AccountConfig>,
    pub salary: f64,
    pub annual_raise: f64,
    pub tenure_years: u32,
    pub horizon_years: u32,
    pub simulations: u32,
    pub start_year: i32,
    pub seed: u64,
    /// When false the opening period only records the seeded balances.
    pub grow_first_period: bool,
    pub max_workload: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YearlyStatistic {
    pub year: i32,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionResult {
    pub simulations: u32,
    pub horizon_years: u32,
    pub categories: BTreeMap<AccountCategory, Vec<YearlyStatistic>>,
    pub total: Vec<YearlyStatistic>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bracket(lower: f64, upper: Option<f64>, rate: f64) -> TaxBracket {
        TaxBracket {
            lower_bound: lower,
            upper_bound: upper,
            rate,
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid date")
    }

    #[test]
    fn schedule_rejects_gap_between_brackets() {
        let err = BracketSchedule::new(vec![
            bracket(0.0, Some(10_000.0), 0.1),
            bracket(11_000.0, None, 0.2),
        ])
        .expect_err("gap must be rejected");
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn schedule_rejects_overlap_and_bounded_tail() {
        assert!(
            BracketSchedule::new(vec![
                bracket(0.0, Some(10_000.0), 0.1),
                bracket(9_000.0, None, 0.2),
            ])
            .is_err()
        );
        assert!(BracketSchedule::new(vec![bracket(0.0, Some(10_000.0), 0.1)]).is_err());
        assert!(BracketSchedule::new(vec![bracket(100.0, None, 0.1)]).is_err());
        assert!(BracketSchedule::new(vec![]).is_err());
        assert!(BracketSchedule::new(vec![bracket(0.0, None, 1.5)]).is_err());
    }

    #[test]
    fn schedule_deserializes_through_validation() {
        let json = r#"[
          {"lowerBound": 0, "upperBound": 1000, "rate": 0.1},
          {"lowerBound": 1000, "upperBound": null, "rate": 0.2}
        ]"#;
        let schedule: BracketSchedule = serde_json::from_str(json).expect("valid schedule");
        assert_eq!(schedule.brackets().len(), 2);

        let gapped = r#"[
          {"lowerBound": 0, "upperBound": 1000, "rate": 0.1},
          {"lowerBound": 1500, "upperBound": null, "rate": 0.2}
        ]"#;
        assert!(serde_json::from_str::<BracketSchedule>(gapped).is_err());
    }

    #[test]
    fn trade_derived_fields() {
        let trade = Trade {
            id: 1,
            asset: "VTI".to_string(),
            purchase_date: date("2023-01-01"),
            sale_date: date("2024-01-02"),
            purchase_price: 100.0,
            sale_price: 120.0,
            quantity: 10.0,
            fees: 5.0,
        };
        assert_eq!(trade.holding_days(), 366);
        assert!(trade.is_long_term());
        assert!((trade.gain_loss() - 195.0).abs() < 1e-9);

        let held_one_year = Trade {
            sale_date: date("2024-01-01"),
            ..trade
        };
        assert_eq!(held_one_year.holding_days(), 365);
        assert!(!held_one_year.is_long_term());
    }
}
