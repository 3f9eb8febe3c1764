use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::brackets::{marginal_rate, stacked_tax};
use super::config::TaxYearConfig;
use super::error::{EngineError, ensure_non_negative};
use super::types::{FilingStatus, ScheduleKind, Trade};

/// Net short-term gains above this level trigger a loss-harvesting hint.
const HARVEST_HINT_THRESHOLD: f64 = 10_000.0;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxSettings {
    pub filing_status: FilingStatus,
    pub region: String,
    /// Other taxable income, before any capital gains.
    pub taxable_income: f64,
    #[serde(default)]
    pub surtax_applies: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GainTotals {
    pub short_gains: f64,
    pub short_losses: f64,
    pub long_gains: f64,
    pub long_losses: f64,
}

impl GainTotals {
    pub fn tally(trades: &[Trade]) -> Self {
        let mut totals = GainTotals::default();
        for trade in trades {
            let amount = trade.gain_loss();
            let (gains, losses) = if trade.is_long_term() {
                (&mut totals.long_gains, &mut totals.long_losses)
            } else {
                (&mut totals.short_gains, &mut totals.short_losses)
            };
            if amount > 0.0 {
                *gains += amount;
            } else {
                *losses += amount.abs();
            }
        }
        totals
    }

    pub fn net_short(&self) -> f64 {
        self.short_gains - self.short_losses
    }

    pub fn net_long(&self) -> f64 {
        self.long_gains - self.long_losses
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LossLimitation {
    pub taxable_short: f64,
    pub taxable_long: f64,
    /// Loss beyond the floor, negative when present. Not applied to later years.
    pub carryforward: f64,
}

/// Caps a combined net loss at `floor`, splitting the deductible part
/// between the two classes in proportion to their share of the loss.
pub fn limit_losses(net_short: f64, net_long: f64, floor: f64) -> LossLimitation {
    let mut limited = LossLimitation {
        taxable_short: net_short,
        taxable_long: net_long,
        carryforward: 0.0,
    };

    if net_short < 0.0 && net_long < 0.0 {
        let combined = net_short + net_long;
        if combined < floor {
            limited.carryforward = combined - floor;
            limited.taxable_short = floor * (net_short / combined);
            limited.taxable_long = floor - limited.taxable_short;
        }
    }
    limited
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapitalGainsTax {
    pub totals: GainTotals,
    pub net_short: f64,
    pub net_long: f64,
    pub combined_net: f64,
    pub taxable_short: f64,
    pub taxable_long: f64,
    /// Portion of each class actually taxed, `max(0, taxable)`.
    pub taxed_short: f64,
    pub taxed_long: f64,
    pub carryforward: f64,
    pub short_rate: f64,
    pub long_rate: f64,
    pub federal_short_tax: f64,
    pub federal_long_tax: f64,
    pub state_tax: f64,
    pub surtax: f64,
    pub total_tax: f64,
    pub effective_rate: f64,
    pub total_gain_loss: f64,
    pub after_tax_profit: f64,
}

/// Nets the four totals and computes the tax due on them.
pub fn tax_on_totals(
    totals: GainTotals,
    settings: &TaxSettings,
    config: &TaxYearConfig,
) -> Result<CapitalGainsTax, EngineError> {
    ensure_non_negative("taxable income", settings.taxable_income)?;

    let status = settings.filing_status;
    let ordinary = config.schedule(ScheduleKind::Ordinary, status)?;
    let long_term = config.schedule(ScheduleKind::LongTerm, status)?;
    let state_rate = config.region(&settings.region)?.rate;
    let income = settings.taxable_income;

    let net_short = totals.net_short();
    let net_long = totals.net_long();
    let limited = limit_losses(net_short, net_long, config.capital_loss_floor);

    let taxed_short = limited.taxable_short.max(0.0);
    let taxed_long = limited.taxable_long.max(0.0);
    let taxed_total = taxed_short + taxed_long;

    // Short-term gains stack on top of other income; long-term gains only
    // take their rate from the pre-gains income level.
    let short_rate = marginal_rate(income + taxed_short, ordinary)?;
    let federal_short_tax = stacked_tax(income, taxed_short, ordinary)?;
    let long_rate = marginal_rate(income, long_term)?;
    let federal_long_tax = taxed_long * long_rate;

    let state_tax = taxed_total * state_rate;
    let surtax = if settings.surtax_applies && income > config.surtax_threshold(status)? {
        taxed_total * config.investment_surtax.rate
    } else {
        0.0
    };

    let total_tax = federal_short_tax + federal_long_tax + state_tax + surtax;
    let total_gain_loss = limited.taxable_short + limited.taxable_long;
    let effective_rate = if total_gain_loss > 0.0 {
        total_tax / total_gain_loss
    } else {
        0.0
    };

    Ok(CapitalGainsTax {
        totals,
        net_short,
        net_long,
        combined_net: net_short + net_long,
        taxable_short: limited.taxable_short,
        taxable_long: limited.taxable_long,
        taxed_short,
        taxed_long,
        carryforward: limited.carryforward,
        short_rate,
        long_rate,
        federal_short_tax,
        federal_long_tax,
        state_tax,
        surtax,
        total_tax,
        effective_rate,
        total_gain_loss,
        after_tax_profit: total_gain_loss - total_tax,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetSummary {
    pub asset: String,
    pub gains: f64,
    pub losses: f64,
    pub net: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthSummary {
    pub month: String,
    pub short_term: f64,
    pub long_term: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum GainsInsight {
    #[serde(rename_all = "camelCase")]
    HoldLonger { short_rate: f64, long_rate: f64 },
    CarryforwardAvailable { amount: f64 },
    LossesOffsetGains,
    #[serde(rename_all = "camelCase")]
    NoStateTax { region_name: String },
    HarvestLosses,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapitalGainsResult {
    pub tax: CapitalGainsTax,
    pub by_asset: Vec<AssetSummary>,
    pub by_month: Vec<MonthSummary>,
    pub insights: Vec<GainsInsight>,
}

pub fn validate_trade(trade: &Trade) -> Result<(), EngineError> {
    if trade.asset.trim().is_empty() {
        return Err(EngineError::invalid("trade asset must not be empty"));
    }
    if trade.sale_date < trade.purchase_date {
        return Err(EngineError::invalid(format!(
            "trade {:?} sold on {} before it was bought on {}",
            trade.asset, trade.sale_date, trade.purchase_date
        )));
    }
    if !trade.quantity.is_finite() || trade.quantity <= 0.0 {
        return Err(EngineError::invalid(format!(
            "trade {:?} quantity must be > 0",
            trade.asset
        )));
    }
    ensure_non_negative("purchase price", trade.purchase_price)?;
    ensure_non_negative("sale price", trade.sale_price)?;
    ensure_non_negative("fees", trade.fees)?;
    Ok(())
}

/// Classifies, nets and taxes a set of trades. Trades are not modified.
pub fn net_capital_gains(
    trades: &[Trade],
    settings: &TaxSettings,
    config: &TaxYearConfig,
) -> Result<CapitalGainsResult, EngineError> {
    for trade in trades {
        validate_trade(trade)?;
    }

    let tax = tax_on_totals(GainTotals::tally(trades), settings, config)?;
    let region = config.region(&settings.region)?;

    let mut insights = Vec::new();
    if tax.net_short > 0.0 && tax.short_rate > tax.long_rate {
        insights.push(GainsInsight::HoldLonger {
            short_rate: tax.short_rate,
            long_rate: tax.long_rate,
        });
    }
    if tax.carryforward < 0.0 {
        insights.push(GainsInsight::CarryforwardAvailable {
            amount: tax.carryforward.abs(),
        });
    }
    if tax.net_long > 0.0 && tax.net_short < 0.0 {
        insights.push(GainsInsight::LossesOffsetGains);
    }
    if region.rate == 0.0 {
        insights.push(GainsInsight::NoStateTax {
            region_name: region.name.clone(),
        });
    }
    if tax.net_short > HARVEST_HINT_THRESHOLD {
        insights.push(GainsInsight::HarvestLosses);
    }

    Ok(CapitalGainsResult {
        tax,
        by_asset: summarize_by_asset(trades),
        by_month: summarize_by_month(trades),
        insights,
    })
}

pub fn summarize_by_asset(trades: &[Trade]) -> Vec<AssetSummary> {
    let mut by_asset: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for trade in trades {
        let amount = trade.gain_loss();
        let entry = by_asset.entry(trade.asset.as_str()).or_default();
        if amount > 0.0 {
            entry.0 += amount;
        } else {
            entry.1 += amount.abs();
        }
    }
    by_asset
        .into_iter()
        .map(|(asset, (gains, losses))| AssetSummary {
            asset: asset.to_string(),
            gains,
            losses,
            net: gains - losses,
        })
        .collect()
}

pub fn summarize_by_month(trades: &[Trade]) -> Vec<MonthSummary> {
    let mut by_month: BTreeMap<String, (f64, f64)> = BTreeMap::new();
    for trade in trades {
        let entry = by_month
            .entry(trade.sale_date.format("%Y-%m").to_string())
            .or_default();
        if trade.is_long_term() {
            entry.1 += trade.gain_loss();
        } else {
            entry.0 += trade.gain_loss();
        }
    }
    by_month
        .into_iter()
        .map(|(month, (short_term, long_term))| MonthSummary {
            month,
            short_term,
            long_term,
        })
        .collect()
}

/// Insertion-ordered trades with stable ids.
#[derive(Debug, Clone, Default)]
pub struct TradeBook {
    trades: Vec<Trade>,
    next_id: u64,
}

impl TradeBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a book from raw trades, assigning fresh ids in order.
    pub fn from_trades(trades: Vec<Trade>) -> Result<Self, EngineError> {
        let mut book = Self::new();
        for trade in trades {
            book.add(trade)?;
        }
        Ok(book)
    }

    pub fn add(&mut self, mut trade: Trade) -> Result<u64, EngineError> {
        validate_trade(&trade)?;
        self.next_id += 1;
        trade.id = self.next_id;
        self.trades.push(trade);
        Ok(self.next_id)
    }

    pub fn update(&mut self, id: u64, mut trade: Trade) -> Result<(), EngineError> {
        validate_trade(&trade)?;
        let slot = self
            .trades
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| EngineError::invalid(format!("no trade with id {id}")))?;
        trade.id = id;
        *slot = trade;
        Ok(())
    }

    pub fn remove(&mut self, id: u64) -> Result<Trade, EngineError> {
        let idx = self
            .trades
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| EngineError::invalid(format!("no trade with id {id}")))?;
        Ok(self.trades.remove(idx))
    }

    pub fn get(&self, id: u64) -> Option<&Trade> {
        self.trades.iter().find(|t| t.id == id)
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::{prop_assert, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn config() -> TaxYearConfig {
        TaxYearConfig::builtin().expect("bundled tables")
    }

    fn settings() -> TaxSettings {
        TaxSettings {
            filing_status: FilingStatus::Single,
            region: "MI".to_string(),
            taxable_income: 100_000.0,
            surtax_applies: false,
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid date")
    }

    fn trade(asset: &str, bought: &str, sold: &str, buy: f64, sell: f64, qty: f64) -> Trade {
        Trade {
            id: 0,
            asset: asset.to_string(),
            purchase_date: date(bought),
            sale_date: date(sold),
            purchase_price: buy,
            sale_price: sell,
            quantity: qty,
            fees: 0.0,
        }
    }

    #[test]
    fn short_loss_against_long_gain_is_not_limited() {
        let totals = GainTotals {
            short_gains: 5_000.0,
            short_losses: 12_000.0,
            long_gains: 8_000.0,
            long_losses: 0.0,
        };
        let t = tax_on_totals(totals, &settings(), &config()).unwrap();

        assert_approx(t.net_short, -7_000.0);
        assert_approx(t.net_long, 8_000.0);
        assert_approx(t.combined_net, 1_000.0);
        assert_approx(t.taxed_short, 0.0);
        assert_approx(t.taxed_long, 8_000.0);
        assert_approx(t.carryforward, 0.0);
        assert_approx(t.federal_short_tax, 0.0);
        // 100k sits in the 15% long-term bracket.
        assert_approx(t.long_rate, 0.15);
        assert_approx(t.federal_long_tax, 1_200.0);
        assert_approx(t.state_tax, 8_000.0 * 0.0425);
    }

    #[test]
    fn combined_loss_beyond_floor_is_apportioned() {
        let limited = limit_losses(-2_000.0, -4_000.0, -3_000.0);
        assert_approx(limited.taxable_short + limited.taxable_long, -3_000.0);
        assert_approx(limited.taxable_short, -1_000.0);
        assert_approx(limited.taxable_long, -2_000.0);
        assert_approx(limited.carryforward, -3_000.0);
    }

    #[test]
    fn combined_loss_within_floor_is_untouched() {
        let limited = limit_losses(-1_000.0, -1_500.0, -3_000.0);
        assert_approx(limited.taxable_short, -1_000.0);
        assert_approx(limited.taxable_long, -1_500.0);
        assert_approx(limited.carryforward, 0.0);
    }

    #[test]
    fn no_trades_means_no_tax_and_zero_effective_rate() {
        let result = net_capital_gains(&[], &settings(), &config()).unwrap();
        assert_eq!(result.tax.totals, GainTotals::default());
        assert_approx(result.tax.total_tax, 0.0);
        assert_approx(result.tax.effective_rate, 0.0);
        assert!(result.by_asset.is_empty());
        assert!(result.by_month.is_empty());
    }

    #[test]
    fn short_term_gain_is_stacked_on_ordinary_income() {
        let trades = vec![trade("AAPL", "2024-01-10", "2024-06-10", 100.0, 150.0, 100.0)];
        let result = net_capital_gains(&trades, &settings(), &config()).unwrap();
        let t = &result.tax;

        assert_approx(t.totals.short_gains, 5_000.0);
        // 525 left in the 22% bracket, 4475 at 24%.
        assert_approx(t.federal_short_tax, 525.0 * 0.22 + 4_475.0 * 0.24);
        assert_approx(t.short_rate, 0.24);
        assert_approx(t.effective_rate, t.total_tax / 5_000.0);
        assert_approx(t.after_tax_profit, 5_000.0 - t.total_tax);
        assert!(
            result
                .insights
                .iter()
                .any(|i| matches!(i, GainsInsight::HoldLonger { .. }))
        );
    }

    #[test]
    fn surtax_requires_flag_and_threshold() {
        let trades = vec![trade("MSFT", "2020-01-01", "2024-01-01", 100.0, 200.0, 100.0)];
        let mut s = settings();
        s.taxable_income = 250_000.0;
        let without = net_capital_gains(&trades, &s, &config()).unwrap();
        assert_approx(without.tax.surtax, 0.0);

        s.surtax_applies = true;
        let with = net_capital_gains(&trades, &s, &config()).unwrap();
        assert_approx(with.tax.surtax, 10_000.0 * 0.038);

        s.taxable_income = 150_000.0;
        let below = net_capital_gains(&trades, &s, &config()).unwrap();
        assert_approx(below.tax.surtax, 0.0);
    }

    #[test]
    fn fees_count_against_the_gain_and_breakdowns_group() {
        let mut a = trade("VTI", "2024-01-02", "2024-03-15", 200.0, 210.0, 10.0);
        a.fees = 150.0;
        let b = trade("VTI", "2022-01-02", "2024-03-20", 100.0, 200.0, 1.0);
        let c = trade("BND", "2024-02-01", "2024-04-01", 80.0, 90.0, 10.0);
        let trades = vec![a, b, c];

        let by_asset = summarize_by_asset(&trades);
        assert_eq!(by_asset.len(), 2);
        assert_eq!(by_asset[0].asset, "BND");
        assert_approx(by_asset[1].gains, 100.0);
        assert_approx(by_asset[1].losses, 50.0);
        assert_approx(by_asset[1].net, 50.0);

        let by_month = summarize_by_month(&trades);
        assert_eq!(by_month.len(), 2);
        assert_eq!(by_month[0].month, "2024-03");
        assert_approx(by_month[0].short_term, -50.0);
        assert_approx(by_month[0].long_term, 100.0);
        assert_eq!(by_month[1].month, "2024-04");
    }

    #[test]
    fn trades_are_not_mutated() {
        let trades = vec![trade("AAPL", "2024-01-10", "2024-06-10", 100.0, 90.0, 5.0)];
        let before = trades.clone();
        net_capital_gains(&trades, &settings(), &config()).unwrap();
        assert_eq!(trades, before);
    }

    #[test]
    fn rejects_sale_before_purchase() {
        let trades = vec![trade("AAPL", "2024-06-10", "2024-01-10", 100.0, 90.0, 5.0)];
        assert!(matches!(
            net_capital_gains(&trades, &settings(), &config()),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn trade_book_assigns_ids_and_deletes_by_id() {
        let mut book = TradeBook::new();
        let first = book
            .add(trade("AAPL", "2024-01-10", "2024-06-10", 100.0, 90.0, 5.0))
            .unwrap();
        let second = book
            .add(trade("MSFT", "2024-01-10", "2024-06-10", 100.0, 120.0, 5.0))
            .unwrap();
        assert_ne!(first, second);
        assert_eq!(book.len(), 2);

        book.update(first, trade("AAPL", "2024-01-10", "2024-06-10", 100.0, 95.0, 5.0))
            .unwrap();
        assert_approx(book.get(first).unwrap().sale_price, 95.0);

        let removed = book.remove(first).unwrap();
        assert_eq!(removed.asset, "AAPL");
        assert_eq!(book.trades()[0].id, second);
        assert!(book.remove(first).is_err());

        let third = book
            .add(trade("BND", "2024-01-10", "2024-06-10", 100.0, 101.0, 1.0))
            .unwrap();
        assert!(third > second);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(128))]

        #[test]
        fn prop_apportioned_loss_sums_to_floor(
            short_loss in 1.0f64..200_000.0,
            long_loss in 1.0f64..200_000.0,
        ) {
            let floor = -3_000.0;
            let limited = limit_losses(-short_loss, -long_loss, floor);
            let combined = -(short_loss + long_loss);
            if combined < floor {
                prop_assert!((limited.taxable_short + limited.taxable_long - floor).abs() < 1e-6);
                prop_assert!(limited.taxable_short < 0.0 && limited.taxable_long < 0.0);
                let ratio = limited.taxable_short / limited.taxable_long;
                prop_assert!((ratio - short_loss / long_loss).abs() < 1e-6 * (1.0 + ratio.abs()));
                prop_assert!((limited.carryforward - (combined - floor)).abs() < 1e-6);
            } else {
                prop_assert!(limited.carryforward == 0.0);
            }
        }
    }
}
