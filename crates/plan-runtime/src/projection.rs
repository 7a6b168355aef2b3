//! Full projection pass: annual aggregates, monthly ledger, metrics and
//! valuations from one scenario.

use crate::treasury::{project_monthly, yearly_treasury, MonthlyTreasury, TreasuryInputs, TreasuryYear};
use plan_core::{Scenario, Year, YearMonth};
use plan_econ::{
    aggregate_years, break_even_year, coverage_ratio, dilution, evaluate, funding_need,
    AnnualRecord, BreakEvenBasis, Dilution, ValuationResult,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Single-figure outputs read from the ledger.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectionMetrics {
    /// Lowest end-of-month balance of the ledger.
    pub min_treasury: Decimal,
    pub min_treasury_month: Option<YearMonth>,
    pub closing_treasury: Decimal,
    /// Capital needed to stay non-negative, measured without funding rounds.
    pub funding_need: Decimal,
    pub total_raise: Decimal,
    pub coverage_ratio: Decimal,
    /// First year with non-negative operating cash flow.
    pub break_even_year: Option<Year>,
    /// First year with non-negative cumulative operating cash flow.
    pub cumulative_break_even_year: Option<Year>,
    /// Dilution of the first funding round.
    pub dilution: Option<Dilution>,
}

/// Everything derived from a scenario.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub annual: Vec<AnnualRecord>,
    pub monthly: Vec<MonthlyTreasury>,
    pub treasury_years: Vec<TreasuryYear>,
    pub metrics: ProjectionMetrics,
    pub valuations: Vec<ValuationResult>,
}

/// End-of-month balances as if no funding round had been booked.
fn balances_without_funding(monthly: &[MonthlyTreasury]) -> Vec<Decimal> {
    let mut injected = Decimal::ZERO;
    monthly
        .iter()
        .map(|m| {
            injected += m.funding_injection;
            m.treasury_end - injected
        })
        .collect()
}

fn metrics(scenario: &Scenario, monthly: &[MonthlyTreasury], years: &[TreasuryYear]) -> ProjectionMetrics {
    let lowest = monthly.iter().min_by_key(|m| m.treasury_end);
    let need = funding_need(balances_without_funding(monthly));
    let total_raise: Decimal = scenario.funding_rounds.iter().map(|r| r.amount).sum();
    let flows: Vec<(Year, Decimal)> = years
        .iter()
        .map(|y| (y.year, y.operating_cash_flow))
        .collect();

    ProjectionMetrics {
        min_treasury: lowest.map(|m| m.treasury_end).unwrap_or(scenario.treasury.initial_cash),
        min_treasury_month: lowest.map(MonthlyTreasury::year_month),
        closing_treasury: monthly
            .last()
            .map(|m| m.treasury_end)
            .unwrap_or(scenario.treasury.initial_cash),
        funding_need: need,
        total_raise,
        coverage_ratio: coverage_ratio(total_raise, need),
        break_even_year: break_even_year(&flows, BreakEvenBasis::Annual),
        cumulative_break_even_year: break_even_year(&flows, BreakEvenBasis::Cumulative),
        dilution: scenario
            .funding_rounds
            .first()
            .map(|r| dilution(r.amount, r.pre_money_valuation, r.oc_ratio)),
    }
}

/// Recompute the whole projection of `scenario`.
pub fn project(scenario: &Scenario) -> Projection {
    let annual = aggregate_years(scenario);
    let monthly = project_monthly(&TreasuryInputs::from_scenario(scenario, &annual));
    let treasury_years = yearly_treasury(&monthly);
    let metrics = metrics(scenario, &monthly, &treasury_years);
    let valuations = scenario
        .valuation
        .methods
        .iter()
        .map(|m| evaluate(m, &annual, &scenario.valuation.historical))
        .collect();

    debug!(
        scenario = %scenario.name,
        funding_need = %metrics.funding_need,
        min_treasury = %metrics.min_treasury,
        "projection recomputed"
    );
    Projection {
        annual,
        monthly,
        treasury_years,
        metrics,
        valuations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plan_core::{
        FundingRound, PlanningWindow, Product, Quarter, Role, SalesPlan, ValuationBasis,
        ValuationMethod,
    };
    use proptest::prelude::*;

    fn d(v: i64) -> Decimal {
        Decimal::new(v, 0)
    }

    /// Two years of burn before a product launch in the third year.
    fn startup(initial_cash: i64) -> Scenario {
        let mut s = Scenario {
            name: "startup".into(),
            window: PlanningWindow {
                start_year: 2025,
                duration_years: 4,
            },
            ..Default::default()
        };
        s.treasury.initial_cash = d(initial_cash);
        s.roles.push(Role {
            id: "founder".into(),
            start_year: 2025,
            annual_cost_loaded: d(60_000),
            ..Default::default()
        });
        s.products.push(Product {
            id: "p1".into(),
            launch_year: 2027,
            unit_cost: d(300),
            price_ht: d(1_000),
            sales: SalesPlan::Flat {
                volumes: [(2027, d(100)), (2028, d(300))].into_iter().collect(),
            },
            ..Default::default()
        });
        s
    }

    #[test]
    fn funding_need_and_break_even() {
        let p = project(&startup(20_000));
        // 2 years at -60k from 20k cash, then +10k, then +150k
        assert_eq!(p.metrics.min_treasury, d(-100_000));
        assert_eq!(p.metrics.min_treasury_month, Some(YearMonth::new(2026, 12)));
        assert_eq!(p.metrics.funding_need, d(100_000));
        assert_eq!(p.metrics.coverage_ratio, Decimal::ONE);
        assert_eq!(p.metrics.break_even_year, Some(2027));
        assert_eq!(p.metrics.cumulative_break_even_year, Some(2028));
        assert_eq!(p.metrics.closing_treasury, d(60_000));
        assert_eq!(p.treasury_years.len(), 4);
        assert!(p.metrics.dilution.is_none());
    }

    #[test]
    fn excluded_funding_still_reports_need() {
        let mut s = startup(20_000);
        s.funding_rounds.push(FundingRound {
            id: "seed".into(),
            amount: d(1_500_000),
            pre_money_valuation: d(4_000_000),
            year: 2025,
            quarter: Quarter::Q2,
            ..Default::default()
        });
        let with_funding = project(&s);
        assert!(with_funding.metrics.min_treasury > Decimal::ZERO);
        assert_eq!(with_funding.metrics.funding_need, d(100_000));
        assert_eq!(with_funding.metrics.coverage_ratio, d(15));
        let dil = with_funding.metrics.dilution.clone().unwrap();
        assert_eq!(dil.post_money, d(5_500_000));

        s.treasury.exclude_funding = true;
        let without = project(&s);
        assert_eq!(without.metrics.min_treasury, d(-100_000));
        assert_eq!(without.metrics.funding_need, d(100_000));
        assert_eq!(without.metrics.total_raise, d(1_500_000));
    }

    #[test]
    fn valuations_follow_configured_methods() {
        let mut s = startup(0);
        s.valuation.methods = vec![
            ValuationMethod::RevenueMultiple {
                multiple: d(2),
                basis: ValuationBasis::Projected { year: 2028 },
            },
            ValuationMethod::EbitdaMultiple {
                multiple: d(10),
                basis: ValuationBasis::Projected { year: 2028 },
            },
        ];
        let p = project(&s);
        assert_eq!(p.valuations.len(), 2);
        assert_eq!(p.valuations[0].value, d(600_000));
        // 300k revenue - 90k cogs - 60k payroll
        assert_eq!(p.valuations[1].value, d(1_500_000));
    }

    #[test]
    fn missing_start_fields_do_not_abort() {
        let s: Scenario = serde_json::from_str(
            r#"{"opex":{"detailed":{"expenses":[{"id":"rent","base_annual_cost":"1000",
                "evolution":{"growth_rate":{"rate":"0.1"}}}]}}}"#,
        )
        .unwrap();
        let p = project(&s);
        assert_eq!(p.monthly.len(), 60);
        assert!(p.annual.iter().all(|a| a.opex == d(1_000)));

        let mut s = Scenario::default();
        s.loans.push(plan_core::LoanConfig {
            id: "bank".into(),
            principal: d(100_000),
            annual_rate: Decimal::new(6, 2),
            end: YearMonth::new(2029, 12),
            ..Default::default()
        });
        let p = project(&s);
        assert!(p.monthly.iter().all(|m| m.loan_payments == d(500)));
        assert_eq!(p.metrics.closing_treasury, d(-30_000));
    }

    #[test]
    fn oversized_window_is_bounded() {
        let mut s = startup(0);
        s.window.duration_years = 4_000_000_000;
        let p = project(&s);
        assert_eq!(p.annual.len(), 50);
        assert_eq!(p.monthly.len(), 600);
    }

    #[test]
    fn projection_serializes() {
        let p = project(&startup(10_000));
        let json = serde_json::to_string(&p).unwrap();
        let back: Projection = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }

    proptest! {
        #[test]
        fn lowering_cash_never_lowers_need(cash in 0i64..500_000, cut in 0i64..500_000) {
            let high = project(&startup(cash)).metrics.funding_need;
            let low = project(&startup(cash - cut)).metrics.funding_need;
            prop_assert!(low >= high);
        }
    }
}
