//! Timing of development cost payments.

use crate::money::percent_of;
use plan_core::{CapexTranche, Product, YearMonth};
use rust_decimal::Decimal;

/// Month in which untranched development cost falls due.
pub fn launch_month(product: &Product) -> YearMonth {
    YearMonth::new(product.launch_year, 1)
}

/// Development cost payments of a product, as `(month, amount)` pairs.
///
/// Without tranches the whole cost is due at launch. When tranches cover
/// less than 100% the remainder is due at launch; an excess is paid as given.
pub fn capex_payments(product: &Product, tranches: &[CapexTranche]) -> Vec<(YearMonth, Decimal)> {
    if product.dev_cost.is_zero() {
        return vec![];
    }
    if tranches.is_empty() {
        return vec![(launch_month(product), product.dev_cost)];
    }
    let mut out: Vec<(YearMonth, Decimal)> = tranches
        .iter()
        .map(|t| {
            let due = YearMonth::new(t.year, t.month.clamp(1, 12));
            (due, percent_of(product.dev_cost, t.percentage))
        })
        .collect();
    let covered: Decimal = tranches.iter().map(|t| t.percentage).sum();
    if covered < Decimal::ONE_HUNDRED {
        out.push((
            launch_month(product),
            percent_of(product.dev_cost, Decimal::ONE_HUNDRED - covered),
        ));
    }
    out
}
