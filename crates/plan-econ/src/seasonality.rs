//! Seasonality curves.
//!
//! A profile stores deviations from a flat month. Coefficients are
//! `1 + deviation`, floored at zero and rescaled to sum to 12, so splitting
//! an annual total always gives back the total.

use crate::money::split_by_weights;
use plan_core::SeasonalityProfile;
use rust_decimal::Decimal;

fn raw_weights(profile: &SeasonalityProfile) -> [Decimal; 12] {
    let mut raw = [Decimal::ONE; 12];
    for (&idx, &dev) in &profile.deviations {
        if let Some(slot) = raw.get_mut(usize::from(idx)) {
            *slot = (Decimal::ONE + dev).max(Decimal::ZERO);
        }
    }
    if raw.iter().all(|w| w.is_zero()) {
        return [Decimal::ONE; 12];
    }
    raw
}

/// Normalized monthly coefficients (index 0 = January), summing to 12.
pub fn coefficients(profile: &SeasonalityProfile) -> [Decimal; 12] {
    let raw = raw_weights(profile);
    let sum: Decimal = raw.iter().copied().sum();
    let twelve = Decimal::from(12u32);
    let mut out = [Decimal::ZERO; 12];
    for (o, r) in out.iter_mut().zip(raw) {
        *o = r * twelve / sum;
    }
    out
}

/// Split an annual total across the 12 months of a year.
pub fn distribute_annual(total: Decimal, profile: &SeasonalityProfile) -> [Decimal; 12] {
    let parts = split_by_weights(total, &raw_weights(profile));
    let mut out = [Decimal::ZERO; 12];
    out.copy_from_slice(&parts);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn profile(pairs: &[(u8, i64)]) -> SeasonalityProfile {
        SeasonalityProfile {
            deviations: pairs
                .iter()
                .map(|&(m, pct)| (m, Decimal::new(pct, 2)))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn uniform_profile_is_flat() {
        let months = distribute_annual(Decimal::new(120_000, 0), &SeasonalityProfile::default());
        for m in months {
            assert_eq!(m, Decimal::new(10_000, 0));
        }
    }

    #[test]
    fn december_peak_takes_larger_share() {
        let p = profile(&[(11, 100)]);
        let c = coefficients(&p);
        let drift = (c.iter().copied().sum::<Decimal>() - Decimal::from(12u32)).abs();
        assert!(drift < Decimal::new(1, 20));
        assert!(c[11] > c[0]);
        let months = distribute_annual(Decimal::new(13_000, 0), &p);
        assert_eq!(months[0], Decimal::new(1_000, 0));
        assert_eq!(months[11], Decimal::new(2_000, 0));
    }

    #[test]
    fn deviations_below_minus_one_floor_at_zero() {
        let p = profile(&[(0, -150)]);
        let months = distribute_annual(Decimal::new(1_100, 0), &p);
        assert_eq!(months[0], Decimal::ZERO);
        assert_eq!(months[1], Decimal::new(100, 0));
    }

    #[test]
    fn out_of_range_index_is_ignored() {
        let p = profile(&[(12, 300)]);
        assert_eq!(coefficients(&p), [Decimal::ONE; 12]);
    }

    proptest! {
        #[test]
        fn split_preserves_annual_total(total in 0i64..100_000_000,
                                        devs in proptest::collection::vec(-100i64..300, 12)) {
            let pairs: Vec<(u8, i64)> = devs.iter().enumerate().map(|(i, &d)| (i as u8, d)).collect();
            let p = profile(&pairs);
            let total = Decimal::new(total, 2);
            let months = distribute_annual(total, &p);
            prop_assert_eq!(months.iter().copied().sum::<Decimal>(), total);
        }
    }
}
