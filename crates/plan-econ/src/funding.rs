//! Funding metrics derived from a completed projection.

use crate::money::safe_div;
use plan_core::Year;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Capital required to keep every balance non-negative.
///
/// `max(0, -min(balances))`; zero for an empty series.
pub fn funding_need<I>(balances: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    balances
        .into_iter()
        .min()
        .map(|low| (-low).max(Decimal::ZERO))
        .unwrap_or(Decimal::ZERO)
}

/// `total_raise / need`, defined as 1 when nothing is needed.
pub fn coverage_ratio(total_raise: Decimal, need: Decimal) -> Decimal {
    if need.is_zero() {
        Decimal::ONE
    } else {
        total_raise / need
    }
}

/// Ownership effect of a round.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Dilution {
    pub total_raise: Decimal,
    pub equity_raised: Decimal,
    /// Convertible bonds, excluded from the dilution numerator.
    pub oc_raised: Decimal,
    pub pre_money: Decimal,
    pub post_money: Decimal,
    /// `equity_raised / post_money`.
    pub dilution: Decimal,
}

/// Dilution of a raise of which `oc_ratio` is convertible.
pub fn dilution(total_raise: Decimal, pre_money: Decimal, oc_ratio: Decimal) -> Dilution {
    let oc_raised = total_raise * oc_ratio;
    let equity_raised = total_raise - oc_raised;
    let post_money = pre_money + equity_raised;
    Dilution {
        total_raise,
        equity_raised,
        oc_raised,
        pre_money,
        post_money,
        dilution: safe_div(equity_raised, post_money),
    }
}

/// Which yearly series break-even is read from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakEvenBasis {
    /// Each year's own cash flow.
    #[default]
    Annual,
    /// Running sum of cash flows from the first year.
    Cumulative,
}

/// First year whose cash flow on `basis` is non-negative.
///
/// Every earlier year is negative on that basis; no interpolation.
pub fn break_even_year(flows: &[(Year, Decimal)], basis: BreakEvenBasis) -> Option<Year> {
    let mut running = Decimal::ZERO;
    for &(year, flow) in flows {
        running += flow;
        let value = match basis {
            BreakEvenBasis::Annual => flow,
            BreakEvenBasis::Cumulative => running,
        };
        if value >= Decimal::ZERO {
            return Some(year);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(v: i64) -> Decimal {
        Decimal::new(v, 0)
    }

    #[test]
    fn need_is_depth_of_lowest_balance() {
        assert_eq!(funding_need(vec![d(100), d(-250), d(-40)]), d(250));
        assert_eq!(funding_need(vec![d(100), d(0)]), Decimal::ZERO);
        assert_eq!(funding_need(Vec::new()), Decimal::ZERO);
    }

    #[test]
    fn coverage_defaults_to_one() {
        assert_eq!(coverage_ratio(d(500), Decimal::ZERO), Decimal::ONE);
        assert_eq!(coverage_ratio(d(500), d(250)), d(2));
    }

    #[test]
    fn dilution_of_equity_round() {
        let r = dilution(d(1_500_000), d(4_000_000), Decimal::ZERO);
        assert_eq!(r.post_money, d(5_500_000));
        assert_eq!(r.dilution.round_dp(3), Decimal::new(273, 3));
    }

    #[test]
    fn convertible_share_is_not_dilutive() {
        let r = dilution(d(1_000_000), d(4_000_000), Decimal::new(25, 2));
        assert_eq!(r.total_raise, d(1_000_000));
        assert_eq!(r.oc_raised, d(250_000));
        assert_eq!(r.equity_raised, d(750_000));
        assert_eq!(r.post_money, d(4_750_000));
    }

    #[test]
    fn break_even_first_match() {
        let flows = [(2025, d(-100)), (2026, d(-20)), (2027, d(50)), (2028, d(90))];
        assert_eq!(break_even_year(&flows, BreakEvenBasis::Annual), Some(2027));
        assert_eq!(break_even_year(&flows, BreakEvenBasis::Cumulative), Some(2028));
        assert_eq!(break_even_year(&flows[..2], BreakEvenBasis::Annual), None);
    }

    proptest! {
        #[test]
        fn lower_starting_cash_never_lowers_need(flows in proptest::collection::vec(-10_000i64..10_000, 1..48),
                                                 cash in 0i64..100_000,
                                                 cut in 0i64..100_000) {
            let run = |start: i64| {
                let mut bal = Decimal::new(start, 0);
                flows.iter().map(|f| { bal += Decimal::new(*f, 0); bal }).collect::<Vec<_>>()
            };
            let high = funding_need(run(cash));
            let low = funding_need(run(cash - cut));
            prop_assert!(low >= high);
        }
    }
}
