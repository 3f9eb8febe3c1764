use serde::Serialize;

use super::error::EngineError;
use super::types::BracketSchedule;

/// Tax charged within a single bracket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketSlice {
    pub lower_bound: f64,
    pub upper_bound: Option<f64>,
    pub rate: f64,
    pub taxed_amount: f64,
    pub tax: f64,
}

fn ensure_taxable(taxable_amount: f64) -> Result<(), EngineError> {
    if taxable_amount.is_nan() || taxable_amount < 0.0 {
        return Err(EngineError::invalid(format!(
            "taxable amount must be >= 0, got {taxable_amount}"
        )));
    }
    Ok(())
}

/// Per-bracket breakdown of the progressive tax on `taxable_amount`.
/// Brackets entirely above the amount are omitted.
pub fn bracket_slices(
    taxable_amount: f64,
    schedule: &BracketSchedule,
) -> Result<Vec<BracketSlice>, EngineError> {
    ensure_taxable(taxable_amount)?;

    let slices = schedule
        .brackets()
        .iter()
        .take_while(|b| b.lower_bound < taxable_amount)
        .map(|b| {
            let top = b
                .upper_bound
                .map_or(taxable_amount, |upper| taxable_amount.min(upper));
            let taxed_amount = top - b.lower_bound;
            BracketSlice {
                lower_bound: b.lower_bound,
                upper_bound: b.upper_bound,
                rate: b.rate,
                taxed_amount,
                tax: taxed_amount * b.rate,
            }
        })
        .collect();
    Ok(slices)
}

/// Progressive tax owed on `taxable_amount`.
pub fn marginal_tax(taxable_amount: f64, schedule: &BracketSchedule) -> Result<f64, EngineError> {
    Ok(bracket_slices(taxable_amount, schedule)?
        .iter()
        .map(|s| s.tax)
        .sum())
}

/// Rate of the highest bracket whose lower bound the amount reaches.
pub fn marginal_rate(taxable_amount: f64, schedule: &BracketSchedule) -> Result<f64, EngineError> {
    ensure_taxable(taxable_amount)?;

    Ok(schedule
        .brackets()
        .iter()
        .rev()
        .find(|b| b.lower_bound <= taxable_amount)
        .map_or(0.0, |b| b.rate))
}

/// Extra tax from stacking `additional` on top of `base` income.
pub fn stacked_tax(
    base: f64,
    additional: f64,
    schedule: &BracketSchedule,
) -> Result<f64, EngineError> {
    let with = marginal_tax(base + additional, schedule)?;
    let without = marginal_tax(base, schedule)?;
    Ok((with - without).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TaxBracket;
    use proptest::prelude::{prop_assert, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn schedule(bounds: &[(f64, f64)]) -> BracketSchedule {
        let brackets = bounds
            .iter()
            .enumerate()
            .map(|(idx, &(lower, rate))| TaxBracket {
                lower_bound: lower,
                upper_bound: bounds.get(idx + 1).map(|&(next, _)| next),
                rate,
            })
            .collect();
        BracketSchedule::new(brackets).expect("valid schedule")
    }

    fn single_2024() -> BracketSchedule {
        schedule(&[
            (0.0, 0.10),
            (11_600.0, 0.12),
            (47_150.0, 0.22),
            (100_525.0, 0.24),
            (191_950.0, 0.32),
            (243_725.0, 0.35),
            (609_350.0, 0.37),
        ])
    }

    #[test]
    fn zero_income_owes_nothing() {
        assert_approx(marginal_tax(0.0, &single_2024()).unwrap(), 0.0);
        assert_approx(marginal_rate(0.0, &single_2024()).unwrap(), 0.10);
    }

    #[test]
    fn walks_brackets_progressively() {
        let s = single_2024();
        // 1160 + 0.12 * 35550 + 0.22 * 2850
        assert_approx(marginal_tax(50_000.0, &s).unwrap(), 1_160.0 + 4_266.0 + 627.0);
        assert_approx(marginal_rate(50_000.0, &s).unwrap(), 0.22);
    }

    #[test]
    fn rate_at_exact_lower_bound_is_that_bracket() {
        let s = single_2024();
        assert_approx(marginal_rate(47_150.0, &s).unwrap(), 0.22);
        assert_approx(marginal_rate(47_149.99, &s).unwrap(), 0.12);
    }

    #[test]
    fn top_bracket_rate_is_independent_of_amount() {
        let s = single_2024();
        for amount in [609_350.0, 700_000.0, 5_000_000.0, 1e12] {
            assert_approx(marginal_rate(amount, &s).unwrap(), 0.37);
        }
    }

    #[test]
    fn slices_sum_to_direct_tax_at_every_boundary() {
        let s = single_2024();
        for b in s.brackets() {
            for amount in [b.lower_bound, b.lower_bound + 1.0] {
                let direct = marginal_tax(amount, &s).unwrap();
                let summed: f64 = bracket_slices(amount, &s)
                    .unwrap()
                    .iter()
                    .map(|slice| slice.taxed_amount * slice.rate)
                    .sum();
                assert_approx(summed, direct);
            }
        }
    }

    #[test]
    fn slices_stop_at_the_amount() {
        let slices = bracket_slices(11_600.0, &single_2024()).unwrap();
        assert_eq!(slices.len(), 1);
        assert_approx(slices[0].taxed_amount, 11_600.0);
    }

    #[test]
    fn negative_amount_is_invalid_input() {
        let s = single_2024();
        assert!(matches!(
            marginal_tax(-1.0, &s),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            marginal_rate(-0.01, &s),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(marginal_tax(f64::NAN, &s).is_err());
    }

    #[test]
    fn stacked_tax_charges_the_upper_slice() {
        let s = single_2024();
        // 10k on top of 95k: 5525 at 22% and 4475 at 24%.
        assert_approx(
            stacked_tax(95_000.0, 10_000.0, &s).unwrap(),
            5_525.0 * 0.22 + 4_475.0 * 0.24,
        );
    }

    #[test]
    fn repeated_calls_are_identical() {
        let s = single_2024();
        let a = marginal_tax(123_456.78, &s).unwrap();
        let b = marginal_tax(123_456.78, &s).unwrap();
        assert_eq!(a.to_bits(), b.to_bits());
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(256))]

        #[test]
        fn prop_tax_is_non_decreasing_and_convex(
            x in 0.0f64..2_000_000.0,
            step in 1.0f64..50_000.0
        ) {
            let s = single_2024();
            let t0 = marginal_tax(x, &s).unwrap();
            let t1 = marginal_tax(x + step, &s).unwrap();
            let t2 = marginal_tax(x + 2.0 * step, &s).unwrap();
            prop_assert!(t1 + 1e-6 >= t0);
            prop_assert!(t2 + 1e-6 >= t1);
            // Convexity: second difference is non-negative.
            prop_assert!((t2 - t1) + 1e-6 >= (t1 - t0));
        }

        #[test]
        fn prop_tax_never_exceeds_top_rate(x in 0.0f64..5_000_000.0) {
            let s = single_2024();
            let tax = marginal_tax(x, &s).unwrap();
            prop_assert!(tax <= x * 0.37 + 1e-6);
            prop_assert!(tax >= x * 0.10 - 1e-6);
        }
    }
}
