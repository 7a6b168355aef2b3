//! Valuation methods.
//!
//! Each method is evaluated on its own parameters; methods share no state.
//! A basis that matches no year values at zero.

use crate::annual::AnnualRecord;
use crate::money::{checked_pow, safe_div};
use plan_core::{
    Actuals, BerkusParams, DcfParams, RiskFactorParams, ScorecardParams, ValuationBasis,
    ValuationMethod, Year,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of one valuation method.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValuationResult {
    pub method: String,
    pub value: Decimal,
}

/// Revenue and EBITDA on a given basis.
pub fn basis_figures(
    basis: &ValuationBasis,
    annual: &[AnnualRecord],
    historical: &BTreeMap<Year, Actuals>,
) -> Actuals {
    let projected = |year: Year| annual.iter().find(|r| r.year == year);
    match basis {
        ValuationBasis::Historical { year } => historical.get(year).cloned().unwrap_or_default(),
        ValuationBasis::Projected { year } => projected(*year)
            .map(|r| Actuals {
                revenue: r.revenue,
                ebitda: r.ebitda,
            })
            .unwrap_or_default(),
        ValuationBasis::Average { from, to } => {
            let rows: Vec<&AnnualRecord> = annual
                .iter()
                .filter(|r| r.year >= *from && r.year <= *to)
                .collect();
            let n = Decimal::from(rows.len() as u64);
            Actuals {
                revenue: safe_div(rows.iter().map(|r| r.revenue).sum(), n),
                ebitda: safe_div(rows.iter().map(|r| r.ebitda).sum(), n),
            }
        }
    }
}

/// Discounted free cash flow (EBITDA minus CAPEX) plus a Gordon terminal value.
///
/// The terminal value is omitted when the discount rate does not exceed the
/// terminal growth.
pub fn dcf(params: &DcfParams, annual: &[AnnualRecord]) -> Decimal {
    let r = params.discount_rate;
    let g = params.terminal_growth;
    let mut value = Decimal::ZERO;
    for (i, rec) in annual.iter().enumerate() {
        // a discount factor past Decimal's range makes the flow negligible
        let Some(discount) = checked_pow(Decimal::ONE + r, i as u32 + 1) else {
            break;
        };
        value += safe_div(rec.ebitda - rec.capex, discount);
    }
    if let Some(last) = annual.last() {
        if r > g {
            let fcf = last.ebitda - last.capex;
            let terminal = fcf
                .checked_mul(Decimal::ONE + g)
                .and_then(|v| v.checked_div(r - g));
            let discount = checked_pow(Decimal::ONE + r, annual.len() as u32);
            if let (Some(terminal), Some(discount)) = (terminal, discount) {
                value += safe_div(terminal, discount);
            }
        }
    }
    value
}

/// Base valuation times the weighted factor scores.
pub fn scorecard(params: &ScorecardParams) -> Decimal {
    let multiplier: Decimal = params.factors.iter().map(|f| f.weight * f.score).sum();
    params.base_valuation * multiplier
}

/// Sum of the five Berkus factors, each floored at zero and capped.
pub fn berkus(params: &BerkusParams) -> Decimal {
    [
        params.sound_idea,
        params.prototype,
        params.quality_team,
        params.strategic_relationships,
        params.product_rollout,
    ]
    .into_iter()
    .map(|v| {
        let v = v.max(Decimal::ZERO);
        if params.max_per_factor > Decimal::ZERO {
            v.min(params.max_per_factor)
        } else {
            v
        }
    })
    .sum()
}

/// Base valuation adjusted by `step` per risk point, scores clamped to -2..=2.
pub fn risk_factor(params: &RiskFactorParams) -> Decimal {
    let points: i64 = params
        .factors
        .iter()
        .map(|f| i64::from(f.score.clamp(-2, 2)))
        .sum();
    params.base_valuation + params.step * Decimal::from(points)
}

/// Evaluate one method against the projection.
pub fn evaluate(
    method: &ValuationMethod,
    annual: &[AnnualRecord],
    historical: &BTreeMap<Year, Actuals>,
) -> ValuationResult {
    let value = match method {
        ValuationMethod::RevenueMultiple { multiple, basis } => {
            basis_figures(basis, annual, historical).revenue * *multiple
        }
        ValuationMethod::EbitdaMultiple { multiple, basis } => {
            basis_figures(basis, annual, historical).ebitda * *multiple
        }
        ValuationMethod::Dcf(p) => dcf(p, annual),
        ValuationMethod::Scorecard(p) => scorecard(p),
        ValuationMethod::Berkus(p) => berkus(p),
        ValuationMethod::RiskFactor(p) => risk_factor(p),
    };
    ValuationResult {
        method: method.label().to_string(),
        value,
    }
}
