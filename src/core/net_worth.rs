use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{EngineError, ensure_non_negative};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetWorthCategory {
    Cash,
    Investments,
    Assets,
    Retirement,
    Debts,
}

impl NetWorthCategory {
    pub const ALL: [NetWorthCategory; 5] = [
        NetWorthCategory::Cash,
        NetWorthCategory::Investments,
        NetWorthCategory::Assets,
        NetWorthCategory::Retirement,
        NetWorthCategory::Debts,
    ];

    pub fn is_liability(self) -> bool {
        self == NetWorthCategory::Debts
    }

    fn starter_accounts(self) -> &'static [&'static str] {
        match self {
            NetWorthCategory::Cash => &["Emergency Fund", "Checking", "Savings"],
            NetWorthCategory::Investments => &["Brokerage", "Crypto", "Stock Options"],
            NetWorthCategory::Assets => &["Primary Home", "Vehicles", "Other Assets"],
            NetWorthCategory::Retirement => &["Roth IRA", "401(k)"],
            NetWorthCategory::Debts => &["Mortgage", "Car Loans", "Credit Cards", "Other Loans"],
        }
    }
}

impl fmt::Display for NetWorthCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NetWorthCategory::Cash => "cash",
            NetWorthCategory::Investments => "investments",
            NetWorthCategory::Assets => "assets",
            NetWorthCategory::Retirement => "retirement",
            NetWorthCategory::Debts => "debts",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetWorthAccount {
    pub name: String,
    /// Always non-negative; debts are subtracted by category.
    pub value: f64,
}

/// Flat `{category, account, value}` row used for CSV-style exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetWorthRecord {
    pub category: NetWorthCategory,
    pub account: String,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    pub category: NetWorthCategory,
    pub total: f64,
    /// Share of total assets, or of total debts for the debt category.
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetWorthSummary {
    pub categories: Vec<CategoryTotal>,
    pub total_assets: f64,
    pub total_debts: f64,
    pub net_worth: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct AccountGroup {
    category: NetWorthCategory,
    accounts: Vec<NetWorthAccount>,
}

/// Balance sheet grouped by category, in the fixed order of
/// [`NetWorthCategory::ALL`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetWorth {
    groups: Vec<AccountGroup>,
}

impl Default for NetWorth {
    fn default() -> Self {
        NetWorth {
            groups: NetWorthCategory::ALL
                .iter()
                .map(|&category| AccountGroup {
                    category,
                    accounts: Vec::new(),
                })
                .collect(),
        }
    }
}

impl NetWorth {
    /// Sheet pre-filled with the usual accounts, all at zero.
    pub fn starter() -> Self {
        let mut sheet = NetWorth::default();
        for group in &mut sheet.groups {
            group.accounts = group
                .category
                .starter_accounts()
                .iter()
                .map(|name| NetWorthAccount {
                    name: name.to_string(),
                    value: 0.0,
                })
                .collect();
        }
        sheet
    }

    pub fn from_records(records: &[NetWorthRecord]) -> Result<Self, EngineError> {
        let mut sheet = NetWorth::default();
        for record in records {
            sheet.add_account(record.category, &record.account, record.value)?;
        }
        Ok(sheet)
    }

    pub fn accounts(&self, category: NetWorthCategory) -> &[NetWorthAccount] {
        &self.groups[category as usize].accounts
    }

    // Groups are stored in declaration order, so the discriminant is the index.
    fn group_mut(&mut self, category: NetWorthCategory) -> &mut AccountGroup {
        &mut self.groups[category as usize]
    }

    pub fn add_account(
        &mut self,
        category: NetWorthCategory,
        name: &str,
        value: f64,
    ) -> Result<(), EngineError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::invalid("account name must not be empty"));
        }
        ensure_non_negative("account value", value)?;
        let group = self.group_mut(category);
        if group.accounts.iter().any(|a| a.name == name) {
            return Err(EngineError::invalid(format!(
                "{category} already has an account named {name:?}"
            )));
        }
        group.accounts.push(NetWorthAccount {
            name: name.to_string(),
            value,
        });
        Ok(())
    }

    pub fn set_value(
        &mut self,
        category: NetWorthCategory,
        name: &str,
        value: f64,
    ) -> Result<(), EngineError> {
        ensure_non_negative("account value", value)?;
        let account = self
            .group_mut(category)
            .accounts
            .iter_mut()
            .find(|a| a.name == name)
            .ok_or_else(|| EngineError::invalid(format!("{category} has no account {name:?}")))?;
        account.value = value;
        Ok(())
    }

    pub fn remove_account(
        &mut self,
        category: NetWorthCategory,
        name: &str,
    ) -> Result<NetWorthAccount, EngineError> {
        let group = self.group_mut(category);
        let idx = group
            .accounts
            .iter()
            .position(|a| a.name == name)
            .ok_or_else(|| EngineError::invalid(format!("{category} has no account {name:?}")))?;
        Ok(group.accounts.remove(idx))
    }

    /// Overwrites the values of accounts already on the sheet. Rows naming
    /// an unknown account are skipped; the number of rows applied is returned.
    pub fn apply_records(&mut self, records: &[NetWorthRecord]) -> Result<usize, EngineError> {
        let mut applied = 0;
        for record in records {
            ensure_non_negative("account value", record.value)?;
            let group = self.group_mut(record.category);
            if let Some(account) = group.accounts.iter_mut().find(|a| a.name == record.account) {
                account.value = record.value;
                applied += 1;
            }
        }
        Ok(applied)
    }

    pub fn records(&self) -> Vec<NetWorthRecord> {
        self.groups
            .iter()
            .flat_map(|g| {
                g.accounts.iter().map(move |a| NetWorthRecord {
                    category: g.category,
                    account: a.name.clone(),
                    value: a.value,
                })
            })
            .collect()
    }

    pub fn category_total(&self, category: NetWorthCategory) -> f64 {
        self.accounts(category).iter().map(|a| a.value).sum()
    }

    pub fn summary(&self) -> NetWorthSummary {
        let total_assets: f64 = NetWorthCategory::ALL
            .iter()
            .filter(|c| !c.is_liability())
            .map(|&c| self.category_total(c))
            .sum();
        let total_debts = self.category_total(NetWorthCategory::Debts);

        let categories = NetWorthCategory::ALL
            .iter()
            .map(|&category| {
                let total = self.category_total(category);
                let base = if category.is_liability() {
                    total_debts
                } else {
                    total_assets
                };
                CategoryTotal {
                    category,
                    total,
                    share: if base > 0.0 { total / base * 100.0 } else { 0.0 },
                }
            })
            .collect();

        NetWorthSummary {
            categories,
            total_assets,
            total_debts,
            net_worth: total_assets - total_debts,
        }
    }
}
