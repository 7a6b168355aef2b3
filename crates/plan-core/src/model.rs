//! Scenario input types.
//!
//! Every type has a canonical empty value (`Default`) and deserializes with
//! `#[serde(default)]`, so partially filled documents load without call-site
//! fallbacks.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Calendar year.
pub type Year = i32;

/// Bucket used when a category is missing or no longer registered.
pub const UNCATEGORIZED: &str = "uncategorized";

/// Identifier of a product, referenced by CAPEX tranches.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub String);

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        ProductId(s.to_string())
    }
}

/// Sales channels with their own price and volume plans.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// Direct to consumer.
    B2C,
    /// Business customers.
    B2B,
    /// White-label / OEM partners.
    OEM,
}

/// Price and per-year volume for one channel.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelPlan {
    /// Channel price before VAT; `None` falls back to the product's `price_ht`.
    pub price: Option<Decimal>,
    /// Units sold per year.
    pub volumes: BTreeMap<Year, Decimal>,
}

/// How a product's volumes are planned.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalesPlan {
    /// One volume per year at `price_ht`.
    Flat { volumes: BTreeMap<Year, Decimal> },
    /// Volumes split across channels, each with an optional price.
    ByChannel { channels: BTreeMap<Channel, ChannelPlan> },
}

impl Default for SalesPlan {
    fn default() -> Self {
        SalesPlan::Flat {
            volumes: BTreeMap::new(),
        }
    }
}

/// One line of a bill of materials.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BomLine {
    pub component: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Fraction of extra parts lost in assembly, e.g. 0.02.
    pub scrap_rate: Decimal,
}

/// Bill of materials used to derive a unit cost.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bom {
    pub lines: Vec<BomLine>,
    /// Per-unit assembly and test cost.
    pub assembly_cost: Decimal,
}

/// A product sold by the company.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Product category; stale references resolve to [`UNCATEGORIZED`].
    pub category: Option<String>,
    /// First year with sales. Earlier volumes are ignored.
    pub launch_year: Year,
    /// Development cost, paid as CAPEX.
    pub dev_cost: Decimal,
    /// Depreciation period of the development cost; 0 expenses it at launch.
    pub dev_amortization_years: u32,
    /// Unit cost used for COGS when no BOM is attached.
    pub unit_cost: Decimal,
    /// Price before VAT.
    pub price_ht: Decimal,
    /// VAT rate, e.g. 0.20.
    pub vat_rate: Decimal,
    pub sales: SalesPlan,
    pub bom: Option<Bom>,
}

/// A hire contributing to payroll from its start year.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Role {
    pub id: String,
    pub title: String,
    pub department: Option<String>,
    pub start_year: Year,
    /// Fully loaded annual cost (salary plus employer charges).
    pub annual_cost_loaded: Decimal,
}

/// Rule driving an expense's value over the years.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Evolution {
    /// Base amount every year.
    #[default]
    Flat,
    /// Base compounded yearly from the expense start year.
    GrowthRate { rate: Decimal },
    /// Ratio of the same year's revenue.
    LinkedToRevenue { ratio: Decimal },
    /// Amount of the latest step at or before the year, base before the first step.
    Step { steps: BTreeMap<Year, Decimal> },
}

/// A detailed operating expense line.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Expense {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub base_annual_cost: Decimal,
    pub start_year: Year,
    pub evolution: Evolution,
}

/// Operating expense planning mode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpexPlan {
    /// One base amount compounded by a growth rate from the first planned year.
    Simple {
        base_annual: Decimal,
        growth_rate: Decimal,
    },
    /// Independent expense lines.
    Detailed { expenses: Vec<Expense> },
}

impl Default for OpexPlan {
    fn default() -> Self {
        OpexPlan::Detailed { expenses: vec![] }
    }
}

/// Calendar quarter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Quarter {
    #[default]
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    /// First calendar month of the quarter (1-based).
    pub fn first_month(self) -> u32 {
        match self {
            Quarter::Q1 => 1,
            Quarter::Q2 => 4,
            Quarter::Q3 => 7,
            Quarter::Q4 => 10,
        }
    }
}

/// A funding round. Part of the raise may be convertible bonds (OC).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FundingRound {
    pub id: String,
    pub name: String,
    /// Total raise, equity plus convertible.
    pub amount: Decimal,
    /// Share of `amount` raised as convertible bonds, in [0, 1].
    pub oc_ratio: Decimal,
    pub pre_money_valuation: Decimal,
    pub year: Year,
    pub quarter: Quarter,
}

/// A calendar month (`month` is 1-based).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: Year,
    pub month: u32,
}

impl Default for YearMonth {
    fn default() -> Self {
        YearMonth { year: 0, month: 1 }
    }
}

impl YearMonth {
    pub fn new(year: Year, month: u32) -> Self {
        YearMonth { year, month }
    }

    /// Months elapsed since January of `origin_year`; negative before it.
    pub fn offset_from(self, origin_year: Year) -> i64 {
        (i64::from(self.year) - i64::from(origin_year)) * 12 + i64::from(self.month) - 1
    }

    /// Inverse of [`YearMonth::offset_from`].
    pub fn from_offset(origin_year: Year, offset: i64) -> Self {
        let year = i64::from(origin_year) + offset.div_euclid(12);
        let month = offset.rem_euclid(12) as u32 + 1;
        YearMonth {
            year: year as Year,
            month,
        }
    }
}

/// How a loan's payment is determined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanMode {
    /// Constant annuity from principal, rate and term.
    #[default]
    Calculated,
    /// `fixed_payment` charged every period.
    Fixed,
}

/// Repayment frequency.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanFrequency {
    #[default]
    Monthly,
    Quarterly,
    Annual,
}

impl LoanFrequency {
    pub fn months_per_period(self) -> u32 {
        match self {
            LoanFrequency::Monthly => 1,
            LoanFrequency::Quarterly => 3,
            LoanFrequency::Annual => 12,
        }
    }

    pub fn periods_per_year(self) -> u32 {
        12 / self.months_per_period()
    }
}

/// A bank loan repaid on a schedule between `start` and `end` (inclusive).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoanConfig {
    pub id: String,
    pub name: String,
    pub mode: LoanMode,
    pub principal: Decimal,
    /// Nominal annual interest rate, e.g. 0.045.
    pub annual_rate: Decimal,
    pub fixed_payment: Decimal,
    pub start: YearMonth,
    pub end: YearMonth,
    pub frequency: LoanFrequency,
    /// Book the principal as an inflow in the start month.
    pub disburse: bool,
}

/// Monthly deviations from a flat split, keyed by month index 0..=11.
///
/// An empty profile is uniform.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalityProfile {
    pub deviations: BTreeMap<u8, Decimal>,
}

/// Seasonality curves applied to the monthly split.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Seasonality {
    /// Applies to revenue and to COGS, which follow sold volumes.
    pub revenue: SeasonalityProfile,
    pub opex: SeasonalityProfile,
}

/// Share of an amount settled `delay_months` after it is incurred.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentTerm {
    pub delay_months: u32,
    /// Percentage in [0, 100].
    pub percentage: Decimal,
}

/// Payment terms; an empty list settles everything in the month incurred.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentTerms {
    /// Collection of revenue.
    pub customer: Vec<PaymentTerm>,
    /// Payment of COGS purchases.
    pub supplier: Vec<PaymentTerm>,
}

/// Part of a product's development cost paid in a given month.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapexTranche {
    pub year: Year,
    /// Calendar month, 1-based.
    pub month: u32,
    /// Percentage of `dev_cost`, in [0, 100].
    pub percentage: Decimal,
}

/// CAPEX tranches per product.
pub type CapexSchedule = BTreeMap<ProductId, Vec<CapexTranche>>;

/// Cash position settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreasuryConfig {
    pub initial_cash: Decimal,
    /// Leave funding rounds out of the cash ledger.
    pub exclude_funding: bool,
}

/// Longest planning window the engine expands.
pub const MAX_DURATION_YEARS: u32 = 50;

/// Years covered by the projection.
///
/// Durations above [`MAX_DURATION_YEARS`] are truncated to it, and years past
/// `i32::MAX` are dropped.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningWindow {
    pub start_year: Year,
    pub duration_years: u32,
}

impl Default for PlanningWindow {
    fn default() -> Self {
        PlanningWindow {
            start_year: 2025,
            duration_years: 5,
        }
    }
}

impl PlanningWindow {
    /// Number of years actually expanded.
    pub fn span(&self) -> u32 {
        let span = self.duration_years.min(MAX_DURATION_YEARS);
        let room = i64::from(Year::MAX) - i64::from(self.start_year) + 1;
        u32::try_from(room.clamp(0, i64::from(span))).unwrap_or(0)
    }

    pub fn years(&self) -> impl Iterator<Item = Year> {
        let start = self.start_year;
        let span = i32::try_from(self.span()).unwrap_or(0);
        (0..span).map(move |i| start + i)
    }

    pub fn months(&self) -> usize {
        self.span() as usize * 12
    }

    pub fn contains(&self, year: Year) -> bool {
        let end = i64::from(self.start_year) + i64::from(self.span());
        year >= self.start_year && i64::from(year) < end
    }
}

/// Named what-if presets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    Base,
    Optimistic,
    Pessimistic,
}

/// Multipliers applied on top of the planned figures (0.1 = +10%).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioAdjustment {
    pub volume: Decimal,
    pub price: Decimal,
    pub opex: Decimal,
}

impl ScenarioAdjustment {
    pub fn preset(kind: ScenarioKind) -> Self {
        match kind {
            ScenarioKind::Base => ScenarioAdjustment::default(),
            ScenarioKind::Optimistic => ScenarioAdjustment {
                volume: Decimal::new(20, 2),
                price: Decimal::new(5, 2),
                opex: Decimal::new(-5, 2),
            },
            ScenarioKind::Pessimistic => ScenarioAdjustment {
                volume: Decimal::new(-30, 2),
                price: Decimal::new(-10, 2),
                opex: Decimal::new(10, 2),
            },
        }
    }
}

/// Reported figures of a closed year.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Actuals {
    pub revenue: Decimal,
    pub ebitda: Decimal,
}

/// Which year's figures a multiple applies to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationBasis {
    /// Reported actuals.
    Historical { year: Year },
    /// A projected year.
    Projected { year: Year },
    /// Mean of projected years `from..=to`.
    Average { from: Year, to: Year },
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DcfParams {
    pub discount_rate: Decimal,
    pub terminal_growth: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorecardFactor {
    pub name: String,
    /// Weight as a fraction; weights should sum to 1.
    pub weight: Decimal,
    /// Comparison to the average peer, 1.0 = par.
    pub score: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorecardParams {
    /// Average pre-money valuation of comparable companies.
    pub base_valuation: Decimal,
    pub factors: Vec<ScorecardFactor>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BerkusParams {
    pub sound_idea: Decimal,
    pub prototype: Decimal,
    pub quality_team: Decimal,
    pub strategic_relationships: Decimal,
    pub product_rollout: Decimal,
    /// Cap applied to each factor; zero means uncapped.
    pub max_per_factor: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskFactor {
    pub name: String,
    /// Score in -2..=2, clamped when evaluated.
    pub score: i8,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskFactorParams {
    pub base_valuation: Decimal,
    /// Value added or removed per score point.
    pub step: Decimal,
    pub factors: Vec<RiskFactor>,
}

/// One valuation method with its own parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationMethod {
    RevenueMultiple {
        multiple: Decimal,
        basis: ValuationBasis,
    },
    EbitdaMultiple {
        multiple: Decimal,
        basis: ValuationBasis,
    },
    Dcf(DcfParams),
    Scorecard(ScorecardParams),
    Berkus(BerkusParams),
    RiskFactor(RiskFactorParams),
}

impl ValuationMethod {
    pub fn label(&self) -> &'static str {
        match self {
            ValuationMethod::RevenueMultiple { .. } => "revenue_multiple",
            ValuationMethod::EbitdaMultiple { .. } => "ebitda_multiple",
            ValuationMethod::Dcf(_) => "dcf",
            ValuationMethod::Scorecard(_) => "scorecard",
            ValuationMethod::Berkus(_) => "berkus",
            ValuationMethod::RiskFactor(_) => "risk_factor",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValuationConfig {
    pub historical: BTreeMap<Year, Actuals>,
    pub methods: Vec<ValuationMethod>,
}

/// The complete planning state owned by one user session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub name: String,
    pub window: PlanningWindow,
    pub adjustment: ScenarioAdjustment,
    /// Registered product categories. Empty accepts any category.
    pub categories: Vec<String>,
    pub products: Vec<Product>,
    pub roles: Vec<Role>,
    pub opex: OpexPlan,
    pub funding_rounds: Vec<FundingRound>,
    pub loans: Vec<LoanConfig>,
    pub seasonality: Seasonality,
    pub payment_terms: PaymentTerms,
    pub capex_payments: CapexSchedule,
    pub treasury: TreasuryConfig,
    pub valuation: ValuationConfig,
}

impl Scenario {
    /// Category bucket of a product, resolving stale references.
    pub fn product_category(&self, product: &Product) -> String {
        match product.category.as_deref() {
            Some(c) if self.categories.is_empty() || self.categories.iter().any(|k| k == c) => {
                c.to_string()
            }
            _ => UNCATEGORIZED.to_string(),
        }
    }

    pub fn product(&self, id: &ProductId) -> Option<&Product> {
        self.products.iter().find(|p| &p.id == id)
    }
}
