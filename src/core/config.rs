use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::{EngineError, ensure_fraction, ensure_non_negative};
use super::types::{AccountCategory, BracketSchedule, FilingStatus, ScheduleKind};

const TAX_YEAR_2024_JSON: &str = include_str!("../../data/tax-year-2024.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollConfig {
    pub social_security_rate: f64,
    pub social_security_wage_cap: f64,
    pub medicare_rate: f64,
    pub additional_medicare_rate: f64,
    pub additional_medicare_threshold: BTreeMap<FilingStatus, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurtaxConfig {
    pub rate: f64,
    pub threshold: BTreeMap<FilingStatus, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionLimits {
    pub tax_deferred: f64,
    pub tax_advantaged: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRate {
    pub name: String,
    pub rate: f64,
}

/// One tax year's worth of rates, thresholds and schedules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxYearConfig {
    pub tax_year: u16,
    pub ordinary: BTreeMap<FilingStatus, BracketSchedule>,
    pub long_term: BTreeMap<FilingStatus, BracketSchedule>,
    pub standard_deduction: BTreeMap<FilingStatus, f64>,
    pub payroll: PayrollConfig,
    pub investment_surtax: SurtaxConfig,
    /// Most negative net capital loss deductible in one year.
    pub capital_loss_floor: f64,
    pub contribution_limits: ContributionLimits,
    pub regions: BTreeMap<String, RegionRate>,
}

impl TaxYearConfig {
    /// The bundled 2024 tables.
    pub fn builtin() -> Result<Self, EngineError> {
        Self::from_json_str(TAX_YEAR_2024_JSON)
    }

    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let config: TaxYearConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, EngineError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    fn validate(&self) -> Result<(), EngineError> {
        if !self.capital_loss_floor.is_finite() || self.capital_loss_floor > 0.0 {
            return Err(EngineError::Config(
                "capitalLossFloor must be <= 0".to_string(),
            ));
        }

        let rates = [
            ("payroll.socialSecurityRate", self.payroll.social_security_rate),
            ("payroll.medicareRate", self.payroll.medicare_rate),
            (
                "payroll.additionalMedicareRate",
                self.payroll.additional_medicare_rate,
            ),
            ("investmentSurtax.rate", self.investment_surtax.rate),
        ];
        for (name, rate) in rates {
            ensure_fraction(name, rate).map_err(into_config_error)?;
        }
        for (code, region) in &self.regions {
            ensure_fraction(&format!("regions.{code}.rate"), region.rate)
                .map_err(into_config_error)?;
        }

        let amounts = [
            (
                "payroll.socialSecurityWageCap",
                self.payroll.social_security_wage_cap,
            ),
            (
                "contributionLimits.taxDeferred",
                self.contribution_limits.tax_deferred,
            ),
            (
                "contributionLimits.taxAdvantaged",
                self.contribution_limits.tax_advantaged,
            ),
        ];
        for (name, amount) in amounts {
            ensure_non_negative(name, amount).map_err(into_config_error)?;
        }
        Ok(())
    }

    pub fn schedule(
        &self,
        kind: ScheduleKind,
        status: FilingStatus,
    ) -> Result<&BracketSchedule, EngineError> {
        let table = match kind {
            ScheduleKind::Ordinary => &self.ordinary,
            ScheduleKind::LongTerm => &self.long_term,
        };
        table.get(&status).ok_or_else(|| {
            EngineError::ConfigurationMissing(format!(
                "no {kind:?} bracket schedule for filing status {status} in tax year {}",
                self.tax_year
            ))
        })
    }

    pub fn standard_deduction(&self, status: FilingStatus) -> Result<f64, EngineError> {
        lookup_threshold(&self.standard_deduction, status, "standard deduction", self.tax_year)
    }

    pub fn additional_medicare_threshold(&self, status: FilingStatus) -> Result<f64, EngineError> {
        lookup_threshold(
            &self.payroll.additional_medicare_threshold,
            status,
            "additional Medicare threshold",
            self.tax_year,
        )
    }

    pub fn surtax_threshold(&self, status: FilingStatus) -> Result<f64, EngineError> {
        lookup_threshold(
            &self.investment_surtax.threshold,
            status,
            "investment surtax threshold",
            self.tax_year,
        )
    }

    /// Region lookup is case-insensitive on the region code.
    pub fn region(&self, code: &str) -> Result<&RegionRate, EngineError> {
        self.regions
            .get(&code.trim().to_ascii_uppercase())
            .ok_or_else(|| {
                EngineError::ConfigurationMissing(format!(
                    "no state rate for region {code:?} in tax year {}",
                    self.tax_year
                ))
            })
    }

    pub fn contribution_ceiling(&self, category: AccountCategory) -> Option<f64> {
        match category {
            AccountCategory::TaxDeferred => Some(self.contribution_limits.tax_deferred),
            AccountCategory::TaxAdvantaged => Some(self.contribution_limits.tax_advantaged),
            AccountCategory::Equity => None,
        }
    }
}

fn into_config_error(e: EngineError) -> EngineError {
    match e {
        EngineError::InvalidInput(msg) => EngineError::Config(msg),
        other => other,
    }
}

fn lookup_threshold(
    table: &BTreeMap<FilingStatus, f64>,
    status: FilingStatus,
    what: &str,
    tax_year: u16,
) -> Result<f64, EngineError> {
    table.get(&status).copied().ok_or_else(|| {
        EngineError::ConfigurationMissing(format!(
            "no {what} for filing status {status} in tax year {tax_year}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_tables_load_and_validate() {
        let config = TaxYearConfig::builtin().expect("bundled tables are valid");
        assert_eq!(config.tax_year, 2024);
        for status in [FilingStatus::Single, FilingStatus::Married] {
            assert!(config.schedule(ScheduleKind::Ordinary, status).is_ok());
            assert!(config.schedule(ScheduleKind::LongTerm, status).is_ok());
            assert!(config.standard_deduction(status).is_ok());
        }
        assert_eq!(config.capital_loss_floor, -3_000.0);
        assert_eq!(config.regions.len(), 51);
    }

    #[test]
    fn region_lookup_ignores_case() {
        let config = TaxYearConfig::builtin().unwrap();
        assert_eq!(config.region("mi").unwrap().rate, 0.0425);
        assert_eq!(config.region(" TX ").unwrap().rate, 0.0);
    }

    #[test]
    fn missing_region_is_configuration_missing() {
        let config = TaxYearConfig::builtin().unwrap();
        assert!(matches!(
            config.region("ZZ"),
            Err(EngineError::ConfigurationMissing(_))
        ));
    }

    #[test]
    fn missing_status_is_configuration_missing() {
        let mut config = TaxYearConfig::builtin().unwrap();
        config.long_term.remove(&FilingStatus::Married);
        assert!(matches!(
            config.schedule(ScheduleKind::LongTerm, FilingStatus::Married),
            Err(EngineError::ConfigurationMissing(_))
        ));
    }

    #[test]
    fn swapped_year_round_trips_through_json() {
        let mut config = TaxYearConfig::builtin().unwrap();
        config.tax_year = 2025;
        config.capital_loss_floor = -4_000.0;
        let json = serde_json::to_string(&config).unwrap();
        let reloaded = TaxYearConfig::from_json_str(&json).unwrap();
        assert_eq!(reloaded.tax_year, 2025);
        assert_eq!(reloaded.capital_loss_floor, -4_000.0);
        assert_eq!(reloaded.regions.len(), config.regions.len());
        assert_eq!(
            reloaded.ordinary[&FilingStatus::Single].brackets().len(),
            config.ordinary[&FilingStatus::Single].brackets().len()
        );
    }

    #[test]
    fn rejects_positive_loss_floor_and_bad_rates() {
        let mut config = TaxYearConfig::builtin().unwrap();
        config.capital_loss_floor = 100.0;
        let json = serde_json::to_string(&config).unwrap();
        assert!(matches!(
            TaxYearConfig::from_json_str(&json),
            Err(EngineError::Config(_))
        ));

        let mut config = TaxYearConfig::builtin().unwrap();
        config.payroll.medicare_rate = 1.45;
        let json = serde_json::to_string(&config).unwrap();
        assert!(TaxYearConfig::from_json_str(&json).is_err());
    }

    #[test]
    fn malformed_schedule_fails_to_load() {
        let json = TAX_YEAR_2024_JSON.replacen("\"lowerBound\": 11600", "\"lowerBound\": 12000", 1);
        assert_ne!(json, TAX_YEAR_2024_JSON);
        assert!(matches!(
            TaxYearConfig::from_json_str(&json),
            Err(EngineError::Config(_))
        ));
    }
}
