//! Annual aggregation of the scenario.
//!
//! One [`AnnualRecord`] per year of the planning window. Volumes are
//! rounded to whole units after the volume adjustment and before any price
//! is applied; COGS uses the same rounded units at unit cost.

use crate::bom::effective_unit_cost;
use crate::money::{checked_pow, round_units};
use plan_core::{
    Evolution, Expense, OpexPlan, Product, Role, SalesPlan, Scenario, ScenarioAdjustment, Year,
    UNCATEGORIZED,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Category used for the single amount of the simple OPEX mode.
pub const GENERAL_OPEX: &str = "general";

/// Per-year totals of the income statement.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnualRecord {
    pub year: Year,
    pub units_sold: Decimal,
    pub revenue: Decimal,
    pub revenue_by_category: BTreeMap<String, Decimal>,
    pub cogs: Decimal,
    pub gross_margin: Decimal,
    pub payroll: Decimal,
    pub headcount: u32,
    pub opex: Decimal,
    pub opex_by_category: BTreeMap<String, Decimal>,
    /// Revenue minus COGS, payroll and OPEX.
    pub ebitda: Decimal,
    /// Development cost of products launching this year.
    pub capex: Decimal,
    pub depreciation: Decimal,
    pub ebit: Decimal,
}

/// Units and unit price of one sales line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SalesLine {
    pub units: Decimal,
    pub price: Decimal,
}

/// Sales lines of a product in `year`, adjustments applied.
pub fn sales_lines(product: &Product, year: Year, adj: &ScenarioAdjustment) -> Vec<SalesLine> {
    if year < product.launch_year {
        return vec![];
    }
    let units = |v: &Decimal| round_units(*v * (Decimal::ONE + adj.volume)).max(Decimal::ZERO);
    let price = |p: Decimal| p * (Decimal::ONE + adj.price);
    match &product.sales {
        SalesPlan::Flat { volumes } => volumes
            .get(&year)
            .map(|v| SalesLine {
                units: units(v),
                price: price(product.price_ht),
            })
            .into_iter()
            .collect(),
        SalesPlan::ByChannel { channels } => channels
            .values()
            .filter_map(|plan| {
                plan.volumes.get(&year).map(|v| SalesLine {
                    units: units(v),
                    price: price(plan.price.unwrap_or(product.price_ht)),
                })
            })
            .collect(),
    }
}

/// Revenue of a product in `year`.
pub fn product_revenue(product: &Product, year: Year, adj: &ScenarioAdjustment) -> Decimal {
    sales_lines(product, year, adj)
        .iter()
        .map(|l| l.units * l.price)
        .sum()
}

/// Units sold by a product in `year`.
pub fn product_units(product: &Product, year: Year, adj: &ScenarioAdjustment) -> Decimal {
    sales_lines(product, year, adj).iter().map(|l| l.units).sum()
}

/// Payroll and headcount of roles started by `year`.
pub fn payroll(roles: &[Role], year: Year) -> (Decimal, u32) {
    roles
        .iter()
        .filter(|r| r.start_year <= year)
        .fold((Decimal::ZERO, 0), |(cost, n), r| {
            (cost + r.annual_cost_loaded, n + 1)
        })
}

/// `base * (1 + rate)^years`, `None` on overflow.
fn compound(base: Decimal, rate: Decimal, years: u32) -> Option<Decimal> {
    base.checked_mul(checked_pow(Decimal::ONE + rate, years)?)
}

/// Unadjusted amount of one expense in `year`.
///
/// Growth that overflows Decimal holds the base amount.
pub fn expense_amount(expense: &Expense, year: Year, revenue: Decimal) -> Decimal {
    if year < expense.start_year {
        return Decimal::ZERO;
    }
    match &expense.evolution {
        Evolution::Flat => expense.base_annual_cost,
        Evolution::GrowthRate { rate } => {
            let elapsed = u32::try_from(year - expense.start_year).unwrap_or(0);
            compound(expense.base_annual_cost, *rate, elapsed).unwrap_or_else(|| {
                warn!(expense = %expense.id, year, "growth out of range, held at base");
                expense.base_annual_cost
            })
        }
        Evolution::LinkedToRevenue { ratio } => revenue * *ratio,
        Evolution::Step { steps } => steps
            .range(..=year)
            .next_back()
            .map(|(_, v)| *v)
            .unwrap_or(expense.base_annual_cost),
    }
}

/// OPEX of `year` by category, adjustment applied.
pub fn opex_by_category(
    plan: &OpexPlan,
    first_year: Year,
    year: Year,
    revenue: Decimal,
    adj: &ScenarioAdjustment,
) -> BTreeMap<String, Decimal> {
    let scale = Decimal::ONE + adj.opex;
    let mut out = BTreeMap::new();
    match plan {
        OpexPlan::Simple {
            base_annual,
            growth_rate,
        } => {
            let elapsed = u32::try_from(year - first_year).unwrap_or(0);
            let grown = compound(*base_annual, *growth_rate, elapsed).unwrap_or_else(|| {
                warn!(year, "simple opex growth out of range, held at base");
                *base_annual
            });
            let amount = grown * scale;
            out.insert(GENERAL_OPEX.to_string(), amount);
        }
        OpexPlan::Detailed { expenses } => {
            for e in expenses {
                let amount = expense_amount(e, year, revenue) * scale;
                if amount.is_zero() {
                    continue;
                }
                let key = e.category.clone().unwrap_or_else(|| UNCATEGORIZED.to_string());
                *out.entry(key).or_default() += amount;
            }
        }
    }
    out
}

/// Yearly depreciation of a product's development cost.
///
/// Straight line over `dev_amortization_years` from launch; zero years
/// expenses the whole cost in the launch year.
pub fn depreciation(product: &Product, year: Year) -> Decimal {
    let years = product.dev_amortization_years;
    if years == 0 {
        return if year == product.launch_year {
            product.dev_cost
        } else {
            Decimal::ZERO
        };
    }
    let end = product.launch_year + years as i32;
    if year >= product.launch_year && year < end {
        product.dev_cost / Decimal::from(years)
    } else {
        Decimal::ZERO
    }
}

/// Aggregate one year of the scenario.
pub fn aggregate_year(scenario: &Scenario, year: Year) -> AnnualRecord {
    let adj = &scenario.adjustment;
    let mut rec = AnnualRecord {
        year,
        ..Default::default()
    };

    for p in &scenario.products {
        let lines = sales_lines(p, year, adj);
        if !lines.is_empty() {
            let revenue: Decimal = lines.iter().map(|l| l.units * l.price).sum();
            let units: Decimal = lines.iter().map(|l| l.units).sum();
            rec.units_sold += units;
            rec.revenue += revenue;
            rec.cogs += units * effective_unit_cost(p);
            *rec
                .revenue_by_category
                .entry(scenario.product_category(p))
                .or_default() += revenue;
        }
        if p.launch_year == year {
            rec.capex += p.dev_cost;
        }
        rec.depreciation += depreciation(p, year);
    }

    let (staff_cost, headcount) = payroll(&scenario.roles, year);
    rec.payroll = staff_cost;
    rec.headcount = headcount;

    rec.opex_by_category = opex_by_category(
        &scenario.opex,
        scenario.window.start_year,
        year,
        rec.revenue,
        adj,
    );
    rec.opex = rec.opex_by_category.values().copied().sum();

    rec.gross_margin = rec.revenue - rec.cogs;
    rec.ebitda = rec.gross_margin - rec.payroll - rec.opex;
    rec.ebit = rec.ebitda - rec.depreciation;
    rec
}

/// Aggregate every year of the planning window.
pub fn aggregate_years(scenario: &Scenario) -> Vec<AnnualRecord> {
    let out: Vec<AnnualRecord> = scenario
        .window
        .years()
        .map(|y| aggregate_year(scenario, y))
        .collect();
    debug!(
        years = out.len(),
        products = scenario.products.len(),
        roles = scenario.roles.len(),
        "annual aggregation done"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use plan_core::{Channel, ChannelPlan, PlanningWindow};
    use proptest::prelude::*;

    fn d(v: i64) -> Decimal {
        Decimal::new(v, 0)
    }

    fn flat_product(launch: Year, volumes: &[(Year, i64)]) -> Product {
        Product {
            id: "p1".into(),
            name: "Widget".into(),
            launch_year: launch,
            unit_cost: d(400),
            price_ht: d(1000),
            sales: SalesPlan::Flat {
                volumes: volumes.iter().map(|&(y, v)| (y, d(v))).collect(),
            },
            ..Default::default()
        }
    }

    fn scenario() -> Scenario {
        Scenario {
            window: PlanningWindow {
                start_year: 2025,
                duration_years: 3,
            },
            ..Default::default()
        }
    }

    #[test]
    fn revenue_and_cogs_from_flat_volumes() {
        let mut s = scenario();
        s.products.push(flat_product(2026, &[(2025, 50), (2026, 100)]));
        let years = aggregate_years(&s);
        assert_eq!(years.len(), 3);
        // volume before launch is ignored
        assert_eq!(years[0].revenue, Decimal::ZERO);
        assert_eq!(years[1].revenue, d(100_000));
        assert_eq!(years[1].cogs, d(40_000));
        assert_eq!(years[1].gross_margin, d(60_000));
        assert_eq!(years[2].revenue, Decimal::ZERO);
    }

    #[test]
    fn volume_is_rounded_before_price() {
        let p = flat_product(2025, &[(2025, 3)]);
        let adj = ScenarioAdjustment {
            volume: Decimal::new(15, 2),
            price: Decimal::new(10, 2),
            ..Default::default()
        };
        // 3 * 1.15 = 3.45 -> 3 units, priced 1100
        assert_eq!(product_units(&p, 2025, &adj), d(3));
        assert_eq!(product_revenue(&p, 2025, &adj), d(3300));
    }

    #[test]
    fn cogs_ignores_price_adjustment() {
        let mut s = scenario();
        s.products.push(flat_product(2025, &[(2025, 10)]));
        s.adjustment.price = Decimal::new(50, 2);
        let y = aggregate_year(&s, 2025);
        assert_eq!(y.revenue, d(15_000));
        assert_eq!(y.cogs, d(4_000));
    }

    #[test]
    fn channel_price_falls_back_to_price_ht() {
        let mut p = flat_product(2025, &[]);
        let mut channels = BTreeMap::new();
        channels.insert(
            Channel::B2C,
            ChannelPlan {
                price: None,
                volumes: [(2025, d(10))].into_iter().collect(),
            },
        );
        channels.insert(
            Channel::OEM,
            ChannelPlan {
                price: Some(d(600)),
                volumes: [(2025, d(100))].into_iter().collect(),
            },
        );
        p.sales = SalesPlan::ByChannel { channels };
        let adj = ScenarioAdjustment::default();
        assert_eq!(product_revenue(&p, 2025, &adj), d(10 * 1000 + 100 * 600));
        assert_eq!(product_units(&p, 2025, &adj), d(110));
    }

    #[test]
    fn empty_volumes_give_zero_revenue() {
        let p = flat_product(2025, &[]);
        assert_eq!(
            product_revenue(&p, 2025, &ScenarioAdjustment::default()),
            Decimal::ZERO
        );
    }

    #[test]
    fn payroll_counts_started_roles() {
        let roles = vec![
            Role {
                id: "ceo".into(),
                start_year: 2025,
                annual_cost_loaded: d(90_000),
                ..Default::default()
            },
            Role {
                id: "eng".into(),
                start_year: 2027,
                annual_cost_loaded: d(70_000),
                ..Default::default()
            },
        ];
        assert_eq!(payroll(&roles, 2024), (Decimal::ZERO, 0));
        assert_eq!(payroll(&roles, 2026), (d(90_000), 1));
        assert_eq!(payroll(&roles, 2027), (d(160_000), 2));
    }

    #[test]
    fn expense_evolution_modes() {
        let base = Expense {
            id: "rent".into(),
            base_annual_cost: d(10_000),
            start_year: 2025,
            ..Default::default()
        };
        assert_eq!(expense_amount(&base, 2024, d(0)), Decimal::ZERO);
        assert_eq!(expense_amount(&base, 2030, d(0)), d(10_000));

        let growth = Expense {
            evolution: Evolution::GrowthRate {
                rate: Decimal::new(10, 2),
            },
            ..base.clone()
        };
        assert_eq!(expense_amount(&growth, 2027, d(0)), d(12_100));

        let linked = Expense {
            evolution: Evolution::LinkedToRevenue {
                ratio: Decimal::new(5, 2),
            },
            ..base.clone()
        };
        assert_eq!(expense_amount(&linked, 2026, d(200_000)), d(10_000));

        let step = Expense {
            evolution: Evolution::Step {
                steps: [(2026, d(15_000)), (2028, d(20_000))].into_iter().collect(),
            },
            ..base
        };
        assert_eq!(expense_amount(&step, 2025, d(0)), d(10_000));
        assert_eq!(expense_amount(&step, 2027, d(0)), d(15_000));
        assert_eq!(expense_amount(&step, 2029, d(0)), d(20_000));
    }

    #[test]
    fn growth_from_missing_start_year_holds_base() {
        // start_year left at 0 compounds over two millennia
        let e = Expense {
            id: "rent".into(),
            base_annual_cost: d(1_000),
            evolution: Evolution::GrowthRate {
                rate: Decimal::new(1, 1),
            },
            ..Default::default()
        };
        assert_eq!(expense_amount(&e, 2025, d(0)), d(1_000));

        let mut s = scenario();
        s.opex = OpexPlan::Detailed { expenses: vec![e] };
        let years = aggregate_years(&s);
        assert!(years.iter().all(|r| r.opex == d(1_000)));
    }

    #[test]
    fn detailed_opex_breakdown_and_adjustment() {
        let mut s = scenario();
        s.adjustment.opex = Decimal::new(10, 2);
        s.opex = OpexPlan::Detailed {
            expenses: vec![
                Expense {
                    id: "rent".into(),
                    category: Some("premises".into()),
                    base_annual_cost: d(10_000),
                    start_year: 2025,
                    ..Default::default()
                },
                Expense {
                    id: "ads".into(),
                    base_annual_cost: d(5_000),
                    start_year: 2026,
                    ..Default::default()
                },
            ],
        };
        let y0 = aggregate_year(&s, 2025);
        assert_eq!(y0.opex, d(11_000));
        assert_eq!(y0.opex_by_category.get(UNCATEGORIZED), None);
        let y1 = aggregate_year(&s, 2026);
        assert_eq!(y1.opex, d(16_500));
        assert_eq!(y1.opex_by_category[UNCATEGORIZED], Decimal::new(5_500, 0));
    }

    #[test]
    fn simple_opex_compounds_from_window_start() {
        let mut s = scenario();
        s.opex = OpexPlan::Simple {
            base_annual: d(100_000),
            growth_rate: Decimal::new(5, 2),
        };
        let years = aggregate_years(&s);
        assert_eq!(years[0].opex, d(100_000));
        assert_eq!(years[2].opex, d(110_250));
        assert_eq!(years[2].opex_by_category[GENERAL_OPEX], d(110_250));
    }

    #[test]
    fn capex_and_depreciation() {
        let mut p = flat_product(2026, &[]);
        p.dev_cost = d(90_000);
        p.dev_amortization_years = 3;
        assert_eq!(depreciation(&p, 2025), Decimal::ZERO);
        assert_eq!(depreciation(&p, 2026), d(30_000));
        assert_eq!(depreciation(&p, 2028), d(30_000));
        assert_eq!(depreciation(&p, 2029), Decimal::ZERO);

        let mut s = scenario();
        s.products.push(p);
        let y = aggregate_year(&s, 2026);
        assert_eq!(y.capex, d(90_000));
        assert_eq!(y.ebit, y.ebitda - d(30_000));
    }

    proptest! {
        #[test]
        fn revenue_scales_with_price(units in 0i64..10_000, price in 1i64..100_000) {
            let mut p = flat_product(2025, &[(2025, units)]);
            p.price_ht = Decimal::new(price, 2);
            let r = product_revenue(&p, 2025, &ScenarioAdjustment::default());
            prop_assert_eq!(r, Decimal::new(units, 0) * Decimal::new(price, 2));
        }
    }
}
