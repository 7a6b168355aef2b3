//! Loan amortization.
//!
//! The term runs from `start` to `end` inclusive. Payments fall every
//! `months_per_period` months from `start`; the period count is the term
//! length divided by the period length, rounded up.

use crate::money::checked_pow;
use plan_core::{LoanConfig, LoanMode, YearMonth};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One repayment period of a loan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AmortizationRow {
    /// 1-based period number.
    pub period: u32,
    pub due: YearMonth,
    pub payment: Decimal,
    pub interest: Decimal,
    pub principal: Decimal,
    /// Outstanding principal after the payment.
    pub balance: Decimal,
}

/// Months covered by the loan, zero when `end` precedes `start`.
pub fn term_months(loan: &LoanConfig) -> u32 {
    let span = loan.end.offset_from(loan.start.year) - loan.start.offset_from(loan.start.year) + 1;
    u32::try_from(span.max(0)).unwrap_or(0)
}

/// Number of repayment periods.
pub fn period_count(loan: &LoanConfig) -> u32 {
    let per = loan.frequency.months_per_period();
    term_months(loan).div_ceil(per)
}

/// Interest rate applied per period.
pub fn periodic_rate(loan: &LoanConfig) -> Decimal {
    loan.annual_rate / Decimal::from(loan.frequency.periods_per_year())
}

/// Constant payment per period.
///
/// Calculated mode uses `P*r / (1 - (1+r)^-n)`, or `P/n` when the rate is
/// zero. Fixed mode returns the configured amount.
///
/// When `(1+r)^n` overflows Decimal the payment takes its limit `P*r`
/// (interest only); any other out-of-range input falls back to `P/n`.
pub fn periodic_payment(loan: &LoanConfig) -> Decimal {
    let n = period_count(loan);
    if n == 0 {
        return Decimal::ZERO;
    }
    match loan.mode {
        LoanMode::Fixed => loan.fixed_payment,
        LoanMode::Calculated => {
            let r = periodic_rate(loan);
            let straight = loan.principal / Decimal::from(n);
            if r.is_zero() {
                return straight;
            }
            let annuity = match checked_pow(Decimal::ONE + r, n) {
                Some(factor) => Decimal::ONE.checked_div(factor).and_then(|remaining| {
                    loan.principal
                        .checked_mul(r)?
                        .checked_div(Decimal::ONE - remaining)
                }),
                None if r > Decimal::ZERO => loan.principal.checked_mul(r),
                None => None,
            };
            annuity.unwrap_or_else(|| {
                warn!(loan = %loan.id, periods = n, "annuity out of range, straight line");
                straight
            })
        }
    }
}

/// Full repayment table.
pub fn amortization_schedule(loan: &LoanConfig) -> Vec<AmortizationRow> {
    let n = period_count(loan);
    let payment = periodic_payment(loan);
    let rate = periodic_rate(loan);
    let step = i64::from(loan.frequency.months_per_period());
    let origin = loan.start.year;
    let first = loan.start.offset_from(origin);

    let mut balance = loan.principal;
    let mut rows = Vec::with_capacity(n as usize);
    for k in 0..n {
        let interest = balance * rate;
        let principal = (payment - interest).min(balance).max(Decimal::ZERO);
        balance -= principal;
        rows.push(AmortizationRow {
            period: k + 1,
            due: YearMonth::from_offset(origin, first + i64::from(k) * step),
            payment,
            interest,
            principal,
            balance,
        });
    }
    rows
}

/// Cash paid per due month.
pub fn loan_payments(loan: &LoanConfig) -> Vec<(YearMonth, Decimal)> {
    amortization_schedule(loan)
        .into_iter()
        .map(|row| (row.due, row.payment))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use plan_core::LoanFrequency;
    use proptest::prelude::*;

    fn loan(principal: i64, rate_bp: i64, months: u32, frequency: LoanFrequency) -> LoanConfig {
        let start = YearMonth::new(2025, 1);
        LoanConfig {
            id: "bank".into(),
            principal: Decimal::new(principal, 0),
            annual_rate: Decimal::new(rate_bp, 4),
            start,
            end: YearMonth::from_offset(2025, i64::from(months) - 1),
            frequency,
            ..Default::default()
        }
    }

    #[test]
    fn zero_rate_is_straight_line() {
        let l = loan(12_000, 0, 12, LoanFrequency::Monthly);
        assert_eq!(period_count(&l), 12);
        assert_eq!(periodic_payment(&l), Decimal::new(1000, 0));
        let pays = loan_payments(&l);
        assert_eq!(pays.len(), 12);
        assert_eq!(pays[0].0, YearMonth::new(2025, 1));
        assert_eq!(pays[11].0, YearMonth::new(2025, 12));
        assert!(pays.iter().all(|(_, p)| *p == Decimal::new(1000, 0)));
    }

    #[test]
    fn annuity_matches_reference_value() {
        // 100k over 5 years at 6% monthly: 1933.28
        let l = loan(100_000, 600, 60, LoanFrequency::Monthly);
        let p = periodic_payment(&l).round_dp(2);
        assert_eq!(p, Decimal::new(193_328, 2));
        let last = amortization_schedule(&l).pop().unwrap();
        assert!(last.balance.abs() < Decimal::new(1, 6));
    }

    #[test]
    fn quarterly_schedule_dates() {
        let l = loan(40_000, 400, 12, LoanFrequency::Quarterly);
        let rows = amortization_schedule(&l);
        let dues: Vec<u32> = rows.iter().map(|r| r.due.month).collect();
        assert_eq!(dues, vec![1, 4, 7, 10]);
    }

    #[test]
    fn fixed_mode_charges_flat_amount() {
        let mut l = loan(10_000, 500, 6, LoanFrequency::Monthly);
        l.mode = LoanMode::Fixed;
        l.fixed_payment = Decimal::new(750, 0);
        let pays = loan_payments(&l);
        assert_eq!(pays.len(), 6);
        assert!(pays.iter().all(|(_, p)| *p == Decimal::new(750, 0)));
    }

    #[test]
    fn missing_start_degrades_to_interest_only() {
        // start left at its default: year 0, some 24k monthly periods
        let l = LoanConfig {
            id: "bank".into(),
            principal: Decimal::new(100_000, 0),
            annual_rate: Decimal::new(6, 2),
            end: YearMonth::new(2029, 12),
            ..Default::default()
        };
        assert_eq!(periodic_payment(&l), Decimal::new(500, 0));
        let rows = amortization_schedule(&l);
        assert_eq!(rows.len() as u32, period_count(&l));
        assert!(rows.iter().all(|r| r.balance == l.principal));
    }

    #[test]
    fn inverted_dates_have_no_payments() {
        let mut l = loan(10_000, 500, 6, LoanFrequency::Monthly);
        l.end = YearMonth::new(2024, 6);
        assert_eq!(period_count(&l), 0);
        assert_eq!(periodic_payment(&l), Decimal::ZERO);
        assert!(loan_payments(&l).is_empty());
    }

    proptest! {
        #[test]
        fn zero_rate_repays_principal_exactly(periods in 1u32..=60, per_period in 1i64..100_000) {
            let l = loan(per_period * i64::from(periods), 0, periods, LoanFrequency::Monthly);
            let payment = periodic_payment(&l);
            prop_assert_eq!(payment * Decimal::from(periods), l.principal);
        }

        #[test]
        fn positive_rate_pays_interest(principal in 1_000i64..10_000_000,
                                       rate_bp in 1i64..2_000,
                                       months in 1u32..=120) {
            let l = loan(principal, rate_bp, months, LoanFrequency::Monthly);
            let total: Decimal = loan_payments(&l).iter().map(|(_, p)| *p).sum();
            prop_assert!(total > l.principal);
        }
    }
}
