//! Payment terms.
//!
//! An amount incurred in month `m` is settled in `m + delay` for each term,
//! pro rata of its percentage. Percentages are used as given; an empty term
//! list settles in the incurrence month.

use crate::money::percent_of;
use plan_core::PaymentTerm;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Settlements of `amount` incurred in `month`, as `(month, amount)` pairs.
pub fn split_payment(month: usize, amount: Decimal, terms: &[PaymentTerm]) -> Vec<(usize, Decimal)> {
    if terms.is_empty() {
        return vec![(month, amount)];
    }
    terms
        .iter()
        .map(|t| (month + t.delay_months as usize, percent_of(amount, t.percentage)))
        .collect()
}

/// Pending settlements keyed by target month offset.
#[derive(Clone, Debug, Default)]
pub struct PaymentSchedule {
    pending: BTreeMap<usize, Decimal>,
}

impl PaymentSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the settlements of an amount incurred in `month`.
    pub fn schedule(&mut self, month: usize, amount: Decimal, terms: &[PaymentTerm]) {
        if amount.is_zero() {
            return;
        }
        for (due, part) in split_payment(month, amount, terms) {
            *self.pending.entry(due).or_default() += part;
        }
    }

    /// Remove and return what falls due in `month`.
    pub fn settle(&mut self, month: usize) -> Decimal {
        self.pending.remove(&month).unwrap_or_default()
    }

    /// Total still pending, including settlements past the horizon.
    pub fn outstanding(&self) -> Decimal {
        self.pending.values().copied().sum()
    }
}
