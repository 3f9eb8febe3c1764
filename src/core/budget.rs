use serde::{Deserialize, Serialize};

use super::error::{EngineError, ensure_fraction, ensure_non_negative};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetEntry {
    pub name: String,
    pub monthly_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetCategory {
    pub key: String,
    pub recommended_fraction: f64,
    /// Savings categories are excluded from expenses and from the health score.
    #[serde(default)]
    pub savings: bool,
    #[serde(default)]
    pub entries: Vec<BudgetEntry>,
}

impl BudgetCategory {
    fn annual_total(&self) -> f64 {
        self.entries.iter().map(|e| e.monthly_amount * 12.0).sum()
    }
}

/// Flat row used for CSV-style export.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetRecord {
    pub category: String,
    pub subcategory: String,
    pub monthly_amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CategoryStatus {
    Zero,
    Over,
    Under,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HealthLabel {
    Excellent,
    Good,
    Fair,
    NeedsWork,
}

impl HealthLabel {
    pub fn from_score(score: u8) -> Self {
        match score {
            90.. => HealthLabel::Excellent,
            75..=89 => HealthLabel::Good,
            60..=74 => HealthLabel::Fair,
            _ => HealthLabel::NeedsWork,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryReport {
    pub key: String,
    pub annual: f64,
    pub monthly: f64,
    pub percentage: f64,
    pub recommended_percentage: f64,
    pub status: CategoryStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetReport {
    pub net_income: f64,
    pub annual_expenses: f64,
    pub annual_savings: f64,
    pub excess_savings: f64,
    pub savings_rate: f64,
    pub categories: Vec<CategoryReport>,
    pub health_score: u8,
    pub health_label: HealthLabel,
}

/// Ordered list of spending categories, each holding named monthly entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Budget {
    categories: Vec<BudgetCategory>,
}

impl Budget {
    pub fn new(categories: Vec<BudgetCategory>) -> Result<Self, EngineError> {
        let mut budget = Budget::default();
        for category in categories {
            budget.add_category(category)?;
        }
        Ok(budget)
    }

    pub fn categories(&self) -> &[BudgetCategory] {
        &self.categories
    }

    pub fn category(&self, key: &str) -> Option<&BudgetCategory> {
        self.categories.iter().find(|c| c.key == key)
    }

    fn category_mut(&mut self, key: &str) -> Result<&mut BudgetCategory, EngineError> {
        self.categories
            .iter_mut()
            .find(|c| c.key == key)
            .ok_or_else(|| EngineError::invalid(format!("unknown budget category {key:?}")))
    }

    pub fn add_category(&mut self, category: BudgetCategory) -> Result<(), EngineError> {
        if category.key.trim().is_empty() {
            return Err(EngineError::invalid("budget category key must not be empty"));
        }
        if self.category(&category.key).is_some() {
            return Err(EngineError::invalid(format!(
                "budget category {:?} already exists",
                category.key
            )));
        }
        ensure_fraction("recommended fraction", category.recommended_fraction)?;

        let BudgetCategory {
            key,
            recommended_fraction,
            savings,
            entries,
        } = category;
        let mut checked = BudgetCategory {
            key,
            recommended_fraction,
            savings,
            entries: Vec::with_capacity(entries.len()),
        };
        for entry in entries {
            push_entry(&mut checked, entry)?;
        }
        self.categories.push(checked);
        Ok(())
    }

    pub fn add_entry(
        &mut self,
        key: &str,
        name: &str,
        monthly_amount: f64,
    ) -> Result<(), EngineError> {
        let category = self.category_mut(key)?;
        push_entry(
            category,
            BudgetEntry {
                name: name.to_string(),
                monthly_amount,
            },
        )
    }

    pub fn set_amount(
        &mut self,
        key: &str,
        name: &str,
        monthly_amount: f64,
    ) -> Result<(), EngineError> {
        ensure_non_negative("monthly amount", monthly_amount)?;
        let entry = entry_mut(self.category_mut(key)?, name)?;
        entry.monthly_amount = monthly_amount;
        Ok(())
    }

    pub fn rename_entry(&mut self, key: &str, from: &str, to: &str) -> Result<(), EngineError> {
        let category = self.category_mut(key)?;
        if to.trim().is_empty() {
            return Err(EngineError::invalid("entry name must not be empty"));
        }
        if from != to && category.entries.iter().any(|e| e.name == to) {
            return Err(EngineError::invalid(format!(
                "{key} already has an entry named {to:?}"
            )));
        }
        entry_mut(category, from)?.name = to.to_string();
        Ok(())
    }

    pub fn remove_entry(&mut self, key: &str, name: &str) -> Result<BudgetEntry, EngineError> {
        let category = self.category_mut(key)?;
        let idx = category
            .entries
            .iter()
            .position(|e| e.name == name)
            .ok_or_else(|| EngineError::invalid(format!("{key} has no entry named {name:?}")))?;
        Ok(category.entries.remove(idx))
    }

    pub fn records(&self) -> Vec<BudgetRecord> {
        self.categories
            .iter()
            .flat_map(|c| {
                c.entries.iter().map(move |e| BudgetRecord {
                    category: c.key.clone(),
                    subcategory: e.name.clone(),
                    monthly_amount: e.monthly_amount,
                })
            })
            .collect()
    }

    /// Compares spending against each category's recommended share of
    /// `net_income` and scores the result out of 100.
    ///
    /// Income left over after expenses and planned savings is credited to the
    /// first savings category.
    pub fn evaluate(&self, net_income: f64) -> Result<BudgetReport, EngineError> {
        if !net_income.is_finite() {
            return Err(EngineError::invalid("net income must be finite"));
        }

        let annual_expenses: f64 = self
            .categories
            .iter()
            .filter(|c| !c.savings)
            .map(BudgetCategory::annual_total)
            .sum();
        let annual_savings: f64 = self
            .categories
            .iter()
            .filter(|c| c.savings)
            .map(BudgetCategory::annual_total)
            .sum();
        let excess_savings = (net_income - annual_expenses - annual_savings).max(0.0);
        let savings_rate = if net_income > 0.0 {
            (annual_savings + excess_savings) / net_income * 100.0
        } else {
            0.0
        };

        let first_savings = self.categories.iter().position(|c| c.savings);
        let categories = self
            .categories
            .iter()
            .enumerate()
            .map(|(idx, c)| {
                let mut annual = c.annual_total();
                if Some(idx) == first_savings {
                    annual += excess_savings;
                }
                let percentage = if net_income > 0.0 {
                    annual / net_income * 100.0
                } else {
                    0.0
                };
                let recommended_percentage = c.recommended_fraction * 100.0;
                let status = if annual == 0.0 {
                    CategoryStatus::Zero
                } else if percentage > recommended_percentage {
                    CategoryStatus::Over
                } else {
                    CategoryStatus::Under
                };
                CategoryReport {
                    key: c.key.clone(),
                    annual,
                    monthly: annual / 12.0,
                    percentage,
                    recommended_percentage,
                    status,
                }
            })
            .collect::<Vec<_>>();

        let health_score = health_score(&self.categories, &categories, savings_rate);

        Ok(BudgetReport {
            net_income,
            annual_expenses,
            annual_savings,
            excess_savings,
            savings_rate,
            categories,
            health_score,
            health_label: HealthLabel::from_score(health_score),
        })
    }
}

fn health_score(
    categories: &[BudgetCategory],
    reports: &[CategoryReport],
    savings_rate: f64,
) -> u8 {
    let mut weighted = 0.0;
    let mut weight = 0.0;
    for (category, report) in categories.iter().zip(reports) {
        if category.savings {
            continue;
        }
        let target = report.recommended_percentage;
        let score = if report.percentage > target {
            (100.0 - (report.percentage - target) * 3.0).max(0.0)
        } else if report.percentage < target * 0.5 {
            90.0
        } else {
            100.0
        };
        weighted += score * target;
        weight += target;
    }

    let base = if weight > 0.0 { weighted / weight } else { 100.0 };
    let bonus = if savings_rate >= 20.0 {
        10.0
    } else if savings_rate >= 15.0 {
        5.0
    } else {
        0.0
    };
    (base + bonus).round().clamp(0.0, 100.0) as u8
}

fn push_entry(category: &mut BudgetCategory, entry: BudgetEntry) -> Result<(), EngineError> {
    if entry.name.trim().is_empty() {
        return Err(EngineError::invalid("entry name must not be empty"));
    }
    ensure_non_negative("monthly amount", entry.monthly_amount)?;
    if category.entries.iter().any(|e| e.name == entry.name) {
        return Err(EngineError::invalid(format!(
            "{} already has an entry named {:?}",
            category.key, entry.name
        )));
    }
    category.entries.push(entry);
    Ok(())
}

fn entry_mut<'a>(
    category: &'a mut BudgetCategory,
    name: &str,
) -> Result<&'a mut BudgetEntry, EngineError> {
    let key = category.key.clone();
    category
        .entries
        .iter_mut()
        .find(|e| e.name == name)
        .ok_or_else(|| EngineError::invalid(format!("{key} has no entry named {name:?}")))
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

    fn category(
        key: &str,
        fraction: f64,
        savings: bool,
        entries: &[(&str, f64)],
    ) -> BudgetCategory {
        BudgetCategory {
            key: key.to_string(),
            recommended_fraction: fraction,
            savings,
            entries: entries
                .iter()
                .map(|&(name, amount)| BudgetEntry {
                    name: name.to_string(),
                    monthly_amount: amount,
                })
                .collect(),
        }
    }

    fn sample_budget() -> Budget {
        Budget::new(vec![
            category("housing", 0.30, false, &[("rent", 1_500.0)]),
            category("food", 0.15, false, &[("groceries", 1_000.0)]),
            category("fun", 0.10, false, &[]),
            category("savings", 0.20, true, &[("401k", 500.0)]),
        ])
        .unwrap()
    }

    #[test]
    fn evaluate_credits_excess_to_savings() {
        let report = sample_budget().evaluate(60_000.0).unwrap();
        assert_approx(report.annual_expenses, 30_000.0);
        assert_approx(report.annual_savings, 6_000.0);
        assert_approx(report.excess_savings, 24_000.0);
        assert_approx(report.savings_rate, 50.0);

        let savings = &report.categories[3];
        assert_approx(savings.annual, 30_000.0);
        assert_approx(savings.percentage, 50.0);

        assert_eq!(report.categories[0].status, CategoryStatus::Under);
        assert_eq!(report.categories[1].status, CategoryStatus::Over);
        assert_eq!(report.categories[2].status, CategoryStatus::Zero);
        assert_approx(report.categories[1].monthly, 1_000.0);
    }

    #[test]
    fn health_score_weights_by_target_and_caps_at_100() {
        // (100 * 30 + 85 * 15 + 90 * 10) / 55 is about 94, plus the savings bonus.
        let report = sample_budget().evaluate(60_000.0).unwrap();
        assert_eq!(report.health_score, 100);
        assert_eq!(report.health_label, HealthLabel::Excellent);
    }

    #[test]
    fn overspending_pulls_the_score_down() {
        let budget = Budget::new(vec![
            category("housing", 0.30, false, &[("rent", 2_500.0)]),
            category("food", 0.15, false, &[("groceries", 1_000.0)]),
        ])
        .unwrap();
        let report = budget.evaluate(60_000.0).unwrap();
        // Housing at 50% scores 40, food at 20% scores 85: 2475 / 45 = 55, +10.
        assert_eq!(report.health_score, 65);
        assert_eq!(report.health_label, HealthLabel::Fair);
    }

    #[test]
    fn zero_income_reports_zero_rates() {
        let report = sample_budget().evaluate(0.0).unwrap();
        assert_approx(report.savings_rate, 0.0);
        assert!(report.categories.iter().all(|c| c.percentage == 0.0));
    }

    #[test]
    fn labels_follow_thresholds() {
        assert_eq!(HealthLabel::from_score(90), HealthLabel::Excellent);
        assert_eq!(HealthLabel::from_score(89), HealthLabel::Good);
        assert_eq!(HealthLabel::from_score(60), HealthLabel::Fair);
        assert_eq!(HealthLabel::from_score(59), HealthLabel::NeedsWork);
    }

    #[test]
    fn entries_are_edited_by_key_and_name() {
        let mut budget = sample_budget();
        budget.add_entry("food", "dining", 200.0).unwrap();
        budget.set_amount("food", "groceries", 800.0).unwrap();
        budget.rename_entry("food", "dining", "restaurants").unwrap();

        let food = budget.category("food").unwrap();
        assert_eq!(food.entries[1].name, "restaurants");
        assert_approx(food.entries[0].monthly_amount, 800.0);

        let removed = budget.remove_entry("food", "restaurants").unwrap();
        assert_approx(removed.monthly_amount, 200.0);
        assert_eq!(budget.category("food").unwrap().entries.len(), 1);

        assert!(budget.add_entry("food", "groceries", 1.0).is_err());
        assert!(budget.rename_entry("housing", "rent", "").is_err());
        assert!(budget.remove_entry("food", "missing").is_err());
        assert!(budget.add_entry("travel", "flights", 1.0).is_err());
        assert!(budget.set_amount("food", "groceries", -5.0).is_err());
    }

    #[test]
    fn rejects_duplicate_categories_and_bad_fractions() {
        assert!(
            Budget::new(vec![
                category("food", 0.1, false, &[]),
                category("food", 0.2, false, &[]),
            ])
            .is_err()
        );
        assert!(Budget::new(vec![category("food", 1.5, false, &[])]).is_err());
        assert!(Budget::new(vec![category("food", 0.1, false, &[("a", -1.0)])]).is_err());
    }

    #[test]
    fn records_flatten_in_order() {
        let records = sample_budget().records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].category, "housing");
        assert_eq!(records[0].subcategory, "rent");
        assert_eq!(records[2].subcategory, "401k");
    }
}
