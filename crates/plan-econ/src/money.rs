//! Decimal helpers shared by the calculators.

use rust_decimal::{Decimal, RoundingStrategy};

/// `base^exp` by repeated multiplication, `None` once it leaves Decimal's range.
pub fn checked_pow(base: Decimal, exp: u32) -> Option<Decimal> {
    let mut acc = Decimal::ONE;
    for _ in 0..exp {
        acc = acc.checked_mul(base)?;
    }
    Some(acc)
}

/// `num / den`, or zero when `den` is zero.
pub fn safe_div(num: Decimal, den: Decimal) -> Decimal {
    if den.is_zero() {
        Decimal::ZERO
    } else {
        num / den
    }
}

/// `amount * pct / 100`.
pub fn percent_of(amount: Decimal, pct: Decimal) -> Decimal {
    amount * pct / Decimal::ONE_HUNDRED
}

/// Round to whole units, half away from zero.
pub fn round_units(v: Decimal) -> Decimal {
    v.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Decimal places kept on split amounts.
pub const MONEY_DP: u32 = 2;

/// Split `total` proportionally to `weights`.
///
/// Shares are rounded to cents and the last one takes the remainder, so the
/// parts sum to `total` exactly. All-zero weights split uniformly.
pub fn split_by_weights(total: Decimal, weights: &[Decimal]) -> Vec<Decimal> {
    let n = weights.len();
    if n == 0 {
        return vec![];
    }
    let sum: Decimal = weights.iter().copied().sum();
    let mut parts = Vec::with_capacity(n);
    let mut allocated = Decimal::ZERO;
    for (i, w) in weights.iter().enumerate() {
        let part = if i + 1 == n {
            total - allocated
        } else if sum.is_zero() {
            (total / Decimal::from(n as u64)).round_dp(MONEY_DP)
        } else {
            (total * *w / sum).round_dp(MONEY_DP)
        };
        allocated += part;
        parts.push(part);
    }
    parts
}
