use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use super::error::{EngineError, ensure_non_negative};

/// Most pay periods `plan_time_off` will lay out in one call.
pub const MAX_PTO_PERIODS: u32 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccrualMode {
    /// The yearly allowance is spread evenly over every pay period.
    #[default]
    Accrual,
    /// The whole allowance is granted on the first pay date.
    LumpSum,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PtoSettings {
    pub pto_days_per_year: f64,
    pub pay_frequency_days: u32,
    pub most_recent_pay_date: NaiveDate,
    #[serde(default)]
    pub accrual: AccrualMode,
    #[serde(default)]
    pub current_pto_balance: f64,
    #[serde(default)]
    pub comp_time: bool,
    #[serde(default)]
    pub current_comp_balance: f64,
    #[serde(default)]
    pub holiday_banking: bool,
    #[serde(default)]
    pub current_holiday_balance: f64,
}

/// Days earned or taken by hand in one pay period.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PeriodActivity {
    pub pto_spent: f64,
    pub comp_gained: f64,
    pub comp_spent: f64,
    pub holiday_gained: f64,
    pub holiday_spent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PtoRow {
    pub period: u32,
    pub pay_date: NaiveDate,
    pub pto_gained: f64,
    pub pto_spent: f64,
    pub pto_balance: f64,
    /// `None` unless comp time is enabled.
    pub comp_balance: Option<f64>,
    /// `None` unless holiday banking is enabled.
    pub holiday_balance: Option<f64>,
    pub total_balance: f64,
}

impl PtoSettings {
    pub fn periods_per_year(&self) -> u32 {
        365_u32.div_ceil(self.pay_frequency_days)
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.pay_frequency_days == 0 || self.pay_frequency_days > 365 {
            return Err(EngineError::invalid(format!(
                "pay frequency must be between 1 and 365 days, got {}",
                self.pay_frequency_days
            )));
        }
        ensure_non_negative("PTO days per year", self.pto_days_per_year)?;
        if !self.current_pto_balance.is_finite()
            || !self.current_comp_balance.is_finite()
            || !self.current_holiday_balance.is_finite()
        {
            return Err(EngineError::invalid("opening balances must be finite"));
        }
        Ok(())
    }
}

fn validate_activity(period: usize, activity: &PeriodActivity) -> Result<(), EngineError> {
    let fields = [
        ("PTO spent", activity.pto_spent),
        ("comp gained", activity.comp_gained),
        ("comp spent", activity.comp_spent),
        ("holiday gained", activity.holiday_gained),
        ("holiday spent", activity.holiday_spent),
    ];
    for (name, value) in fields {
        ensure_non_negative(&format!("period {period} {name}"), value)?;
    }
    Ok(())
}

/// Pay-date by pay-date running balances of PTO, comp time and banked
/// holidays, starting at the most recent pay date.
///
/// `activity[i]` applies to period `i`; periods past the end of `activity`
/// have nothing spent or banked. Balances may go negative when more is
/// spent than has accrued.
pub fn plan_time_off(
    settings: &PtoSettings,
    activity: &[PeriodActivity],
    periods: u32,
) -> Result<Vec<PtoRow>, EngineError> {
    settings.validate()?;
    if periods > MAX_PTO_PERIODS {
        return Err(EngineError::TooLarge {
            requested: u64::from(periods),
            budget: u64::from(MAX_PTO_PERIODS),
        });
    }
    if activity.len() > periods as usize {
        return Err(EngineError::invalid(format!(
            "activity covers {} periods but only {periods} were requested",
            activity.len()
        )));
    }
    for (idx, a) in activity.iter().enumerate() {
        validate_activity(idx, a)?;
    }

    let per_period = match settings.accrual {
        AccrualMode::Accrual => settings.pto_days_per_year / f64::from(settings.periods_per_year()),
        AccrualMode::LumpSum => 0.0,
    };
    let step = Days::new(u64::from(settings.pay_frequency_days));

    let mut pay_date = settings.most_recent_pay_date;
    let mut pto = settings.current_pto_balance;
    let mut comp = settings.current_comp_balance;
    let mut holiday = settings.current_holiday_balance;
    let mut rows = Vec::with_capacity(periods as usize);

    for period in 0..periods {
        let a = activity.get(period as usize).copied().unwrap_or_default();
        let pto_gained = match settings.accrual {
            AccrualMode::Accrual => per_period,
            AccrualMode::LumpSum if period == 0 => settings.pto_days_per_year,
            AccrualMode::LumpSum => 0.0,
        };
        pto += pto_gained - a.pto_spent;

        let comp_balance = settings.comp_time.then(|| {
            comp += a.comp_gained - a.comp_spent;
            comp
        });
        let holiday_balance = settings.holiday_banking.then(|| {
            holiday += a.holiday_gained - a.holiday_spent;
            holiday
        });

        rows.push(PtoRow {
            period,
            pay_date,
            pto_gained,
            pto_spent: a.pto_spent,
            pto_balance: pto,
            comp_balance,
            holiday_balance,
            total_balance: pto + comp_balance.unwrap_or(0.0) + holiday_balance.unwrap_or(0.0),
        });

        pay_date = pay_date
            .checked_add_days(step)
            .ok_or_else(|| EngineError::invalid("pay dates run past the supported calendar"))?;
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn biweekly(days_per_year: f64) -> PtoSettings {
        PtoSettings {
            pto_days_per_year: days_per_year,
            pay_frequency_days: 14,
            most_recent_pay_date: date("2024-01-05"),
            accrual: AccrualMode::Accrual,
            current_pto_balance: 2.0,
            comp_time: false,
            current_comp_balance: 0.0,
            holiday_banking: false,
            current_holiday_balance: 0.0,
        }
    }

    #[test]
    fn accrual_spreads_allowance_over_pay_periods() {
        let settings = biweekly(27.0);
        assert_eq!(settings.periods_per_year(), 27);

        let rows = plan_time_off(&settings, &[], 3).unwrap();
        assert_eq!(rows.len(), 3);
        assert_approx(rows[0].pto_gained, 1.0);
        assert_approx(rows[0].pto_balance, 3.0);
        assert_approx(rows[2].pto_balance, 5.0);
        assert_eq!(rows[0].pay_date, date("2024-01-05"));
        assert_eq!(rows[2].pay_date, date("2024-02-02"));
        assert_eq!(rows[1].comp_balance, None);
        assert_approx(rows[2].total_balance, 5.0);
    }

    #[test]
    fn lump_sum_lands_on_the_first_pay_date() {
        let mut settings = biweekly(15.0);
        settings.accrual = AccrualMode::LumpSum;
        let rows = plan_time_off(&settings, &[], 4).unwrap();
        assert_approx(rows[0].pto_gained, 15.0);
        assert!(rows[1..].iter().all(|r| r.pto_gained == 0.0));
        assert_approx(rows[3].pto_balance, 17.0);
    }

    #[test]
    fn spending_and_banking_move_each_balance() {
        let mut settings = biweekly(27.0);
        settings.comp_time = true;
        settings.current_comp_balance = 1.0;
        settings.holiday_banking = true;

        let activity = [
            PeriodActivity {
                pto_spent: 2.5,
                comp_gained: 0.5,
                ..PeriodActivity::default()
            },
            PeriodActivity {
                comp_spent: 1.5,
                holiday_gained: 1.0,
                ..PeriodActivity::default()
            },
        ];
        let rows = plan_time_off(&settings, &activity, 3).unwrap();

        assert_approx(rows[0].pto_balance, 0.5);
        assert_eq!(rows[0].comp_balance, Some(1.5));
        assert_eq!(rows[1].comp_balance, Some(0.0));
        assert_eq!(rows[1].holiday_balance, Some(1.0));
        assert_approx(rows[2].pto_balance, 2.5);
        assert_approx(rows[2].total_balance, 2.5 + 0.0 + 1.0);
    }

    #[test]
    fn overspending_goes_negative() {
        let activity = [PeriodActivity {
            pto_spent: 10.0,
            ..PeriodActivity::default()
        }];
        let rows = plan_time_off(&biweekly(27.0), &activity, 1).unwrap();
        assert_approx(rows[0].pto_balance, -7.0);
    }

    #[test]
    fn rejects_bad_settings_and_oversized_plans() {
        let mut settings = biweekly(10.0);
        settings.pay_frequency_days = 0;
        assert!(plan_time_off(&settings, &[], 5).is_err());

        let settings = biweekly(-1.0);
        assert!(plan_time_off(&settings, &[], 5).is_err());

        let activity = [PeriodActivity {
            comp_spent: -1.0,
            ..PeriodActivity::default()
        }];
        let settings = biweekly(10.0);
        assert!(plan_time_off(&settings, &activity, 5).is_err());
        let too_much = [PeriodActivity::default(); 3];
        assert!(plan_time_off(&settings, &too_much, 2).is_err());

        assert_eq!(
            plan_time_off(&settings, &[], MAX_PTO_PERIODS + 1),
            Err(EngineError::TooLarge {
                requested: u64::from(MAX_PTO_PERIODS + 1),
                budget: u64::from(MAX_PTO_PERIODS),
            })
        );
    }

    #[test]
    fn settings_read_camel_case_with_defaults() {
        let body = r#"{"ptoDaysPerYear": 20, "payFrequencyDays": 7,
            "mostRecentPayDate": "2024-03-01", "accrual": "lumpSum"}"#;
        let settings: PtoSettings = serde_json::from_str(body).unwrap();
        assert_eq!(settings.accrual, AccrualMode::LumpSum);
        assert_eq!(settings.periods_per_year(), 53);
        assert!(!settings.comp_time);
    }
}
