#![deny(warnings)]

//! Headless CLI: load or build a scenario, run the projection and print the
//! annual table with the treasury metrics.

use anyhow::{bail, Context, Result};
use chrono::Datelike;
use persistence::{FileStore, SavedState};
use plan_core::*;
use plan_econ::bom::price_ttc;
use plan_runtime::{project, Projection};
use rust_decimal::Decimal;
use std::path::Path;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default, PartialEq)]
struct Args {
    scenario: Option<String>,
    years: Option<u32>,
    start_year: Option<Year>,
    preset: Option<ScenarioKind>,
    exclude_funding: bool,
    cache_dir: Option<String>,
    db: Option<String>,
    user: Option<String>,
}

fn parse_preset(s: &str) -> Option<ScenarioKind> {
    match s {
        "base" => Some(ScenarioKind::Base),
        "optimistic" => Some(ScenarioKind::Optimistic),
        "pessimistic" => Some(ScenarioKind::Pessimistic),
        _ => None,
    }
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Args {
    let mut out = Args::default();
    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--scenario" => out.scenario = it.next(),
            "--years" => out.years = it.next().and_then(|s| s.parse().ok()),
            "--start-year" => out.start_year = it.next().and_then(|s| s.parse().ok()),
            "--preset" => out.preset = it.next().as_deref().and_then(parse_preset),
            "--exclude-funding" => out.exclude_funding = true,
            "--cache-dir" => out.cache_dir = it.next(),
            "--db" => out.db = it.next(),
            "--user" => out.user = it.next(),
            _ => {}
        }
    }
    out
}

fn d(v: i64) -> Decimal {
    Decimal::new(v, 0)
}

/// A small hardware startup: one launch, a seed round and a bank loan.
fn sample_scenario(start_year: Year) -> Scenario {
    let y = start_year;
    let device = Product {
        id: ProductId::from("device"),
        name: "Device".to_string(),
        category: Some("hardware".to_string()),
        launch_year: y + 1,
        dev_cost: d(120_000),
        dev_amortization_years: 3,
        unit_cost: d(180),
        price_ht: d(490),
        vat_rate: Decimal::new(20, 2),
        sales: SalesPlan::Flat {
            volumes: [(y + 1, d(400)), (y + 2, d(1_500)), (y + 3, d(3_000)), (y + 4, d(4_500))]
                .into_iter()
                .collect(),
        },
        bom: None,
    };
    let roles = [("cto", "CTO", y, 70_000), ("eng1", "Engineer", y, 55_000), ("sales1", "Sales", y + 1, 50_000)]
        .into_iter()
        .map(|(id, title, start, cost)| Role {
            id: id.to_string(),
            title: title.to_string(),
            department: None,
            start_year: start,
            annual_cost_loaded: d(cost),
        })
        .collect();

    Scenario {
        name: "sample".to_string(),
        window: PlanningWindow {
            start_year: y,
            duration_years: 5,
        },
        categories: vec!["hardware".to_string()],
        products: vec![device],
        roles,
        opex: OpexPlan::Simple {
            base_annual: d(60_000),
            growth_rate: Decimal::new(5, 2),
        },
        funding_rounds: vec![FundingRound {
            id: "seed".to_string(),
            name: "Seed".to_string(),
            amount: d(400_000),
            oc_ratio: Decimal::new(25, 2),
            pre_money_valuation: d(1_600_000),
            year: y,
            quarter: Quarter::Q2,
        }],
        loans: vec![LoanConfig {
            id: "bank".to_string(),
            name: "Bank loan".to_string(),
            principal: d(100_000),
            annual_rate: Decimal::new(45, 3),
            start: YearMonth::new(y, 1),
            end: YearMonth::new(y + 4, 12),
            disburse: true,
            ..Default::default()
        }],
        payment_terms: PaymentTerms {
            customer: vec![
                PaymentTerm {
                    delay_months: 1,
                    percentage: d(70),
                },
                PaymentTerm {
                    delay_months: 2,
                    percentage: d(30),
                },
            ],
            supplier: vec![PaymentTerm {
                delay_months: 1,
                percentage: d(100),
            }],
        },
        treasury: TreasuryConfig {
            initial_cash: d(50_000),
            exclude_funding: false,
        },
        valuation: ValuationConfig {
            historical: Default::default(),
            methods: vec![ValuationMethod::RevenueMultiple {
                multiple: d(2),
                basis: ValuationBasis::Projected { year: y + 4 },
            }],
        },
        ..Default::default()
    }
}

fn load_scenario_file(path: &str) -> Result<Scenario> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let scenario = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&text).with_context(|| format!("parsing {path}"))?,
        "json" => serde_json::from_str(&text).with_context(|| format!("parsing {path}"))?,
        other => bail!("unsupported scenario format {other:?}, expected yaml or json"),
    };
    Ok(scenario)
}

fn apply_overrides(scenario: &mut Scenario, args: &Args) {
    if let Some(years) = args.years {
        if years > MAX_DURATION_YEARS {
            warn!(years, max = MAX_DURATION_YEARS, "--years capped");
        }
        scenario.window.duration_years = years.min(MAX_DURATION_YEARS);
    }
    if let Some(start) = args.start_year {
        scenario.window.start_year = start;
    }
    if let Some(kind) = args.preset {
        scenario.adjustment = ScenarioAdjustment::preset(kind);
    }
    if args.exclude_funding {
        scenario.treasury.exclude_funding = true;
    }
}

fn money(v: Decimal) -> String {
    v.round_dp(0).to_string()
}

/// One display line per product with its price before and after VAT.
fn product_lines(scenario: &Scenario) -> Vec<String> {
    scenario
        .products
        .iter()
        .map(|p| {
            format!(
                "Product | {}: {} HT | {} TTC (VAT {}%)",
                p.id.0,
                p.price_ht.round_dp(2),
                price_ttc(p).round_dp(2),
                (p.vat_rate * Decimal::ONE_HUNDRED).normalize()
            )
        })
        .collect()
}

fn print_report(p: &Projection) {
    println!(
        "{:>6} {:>8} {:>14} {:>14} {:>14} {:>14} {:>14} {:>14}",
        "year", "units", "revenue", "cogs", "payroll", "opex", "ebitda", "cash"
    );
    for (a, t) in p.annual.iter().zip(&p.treasury_years) {
        println!(
            "{:>6} {:>8} {:>14} {:>14} {:>14} {:>14} {:>14} {:>14}",
            a.year,
            a.units_sold.to_string(),
            money(a.revenue),
            money(a.cogs),
            money(a.payroll),
            money(a.opex),
            money(a.ebitda),
            money(t.treasury_end)
        );
    }
    let m = &p.metrics;
    let month = m
        .min_treasury_month
        .map(|ym| format!("{}-{:02}", ym.year, ym.month))
        .unwrap_or_else(|| "-".to_string());
    let year = |y: Option<Year>| y.map(|y| y.to_string()).unwrap_or_else(|| "-".to_string());
    println!(
        "Treasury | min: {} ({}) | closing: {} | need: {} | raised: {} | coverage: {}",
        money(m.min_treasury),
        month,
        money(m.closing_treasury),
        money(m.funding_need),
        money(m.total_raise),
        m.coverage_ratio.round_dp(2)
    );
    println!(
        "Break-even | annual: {} | cumulative: {}",
        year(m.break_even_year),
        year(m.cumulative_break_even_year)
    );
    if let Some(dil) = &m.dilution {
        println!(
            "Dilution | post-money: {} | equity: {} | OC: {} | dilution: {}%",
            money(dil.post_money),
            money(dil.equity_raised),
            money(dil.oc_raised),
            (dil.dilution * Decimal::ONE_HUNDRED).round_dp(1)
        );
    }
    for v in &p.valuations {
        println!("Valuation | {}: {}", v.method, money(v.value));
    }
}

fn persist(scenario: &Scenario, args: &Args) -> Result<()> {
    let user = args.user.as_deref().unwrap_or("default");
    if let Some(dir) = &args.cache_dir {
        let store = FileStore::new(dir);
        persistence::save_scenario(&store, user, scenario)?;
        info!(dir = %dir, user, "scenario cached");
    }
    if let Some(url) = &args.db {
        let saved = SavedState::new(scenario.clone(), chrono::Utc::now());
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async {
            let pool = persistence::init_db(url).await?;
            persistence::save_user_state(&pool, user, &saved).await?;
            Ok::<_, persistence::StoreError>(())
        })?;
        info!(url = %url, user, "scenario saved");
    }
    Ok(())
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let args = parse_args(std::env::args().skip(1));
    info!(?args, git_sha = env!("GIT_SHA"), "starting CLI");

    let mut scenario = match &args.scenario {
        Some(path) => load_scenario_file(path)?,
        None => sample_scenario(args.start_year.unwrap_or_else(|| chrono::Utc::now().year())),
    };
    apply_overrides(&mut scenario, &args);

    for issue in validate_scenario(&scenario) {
        warn!(%issue, "scenario issue");
    }

    let projection = project(&scenario);
    println!(
        "Scenario {} | {}..{} | products: {} | roles: {}",
        scenario.name,
        scenario.window.start_year,
        scenario.window.start_year + scenario.window.duration_years as i32 - 1,
        scenario.products.len(),
        scenario.roles.len()
    );
    for line in product_lines(&scenario) {
        println!("{line}");
    }
    print_report(&projection);
    persist(&scenario, &args)?;
    Ok(())
}
