//! Monthly treasury ledger.
//!
//! Expands the annual aggregates into `duration_years * 12` contiguous
//! months. Revenue and COGS follow the revenue seasonality, OPEX its own
//! curve and payroll a flat split. Collections and supplier payments are
//! delayed by the payment terms; loan payments, CAPEX tranches and funding
//! rounds land in their own months. Balances are never clamped.

use plan_core::{
    CapexSchedule, FundingRound, LoanConfig, PaymentTerms, PlanningWindow, Product, Scenario,
    Seasonality, SeasonalityProfile, Year, YearMonth,
};
use plan_econ::capex::capex_payments;
use plan_econ::{distribute_annual, loan_payments, AnnualRecord, PaymentSchedule};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// One month of the cash ledger.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTreasury {
    pub year: Year,
    /// Calendar month, 1-based.
    pub month: u32,
    /// Revenue earned this month.
    pub revenue: Decimal,
    /// COGS incurred this month.
    pub cogs: Decimal,
    /// Revenue cashed this month after customer terms.
    pub collections: Decimal,
    /// COGS paid this month after supplier terms.
    pub supplier_payments: Decimal,
    pub payroll: Decimal,
    pub opex: Decimal,
    pub capex_payments: Decimal,
    pub loan_payments: Decimal,
    pub loan_proceeds: Decimal,
    pub funding_injection: Decimal,
    pub net_cash_flow: Decimal,
    pub treasury_start: Decimal,
    pub treasury_end: Decimal,
}

impl MonthlyTreasury {
    pub fn year_month(&self) -> YearMonth {
        YearMonth::new(self.year, self.month)
    }

    /// Cash flow before financing (funding rounds and loan proceeds).
    pub fn operating_cash_flow(&self) -> Decimal {
        self.net_cash_flow - self.funding_injection - self.loan_proceeds
    }
}

/// Yearly fold of the ledger.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TreasuryYear {
    pub year: Year,
    pub revenue: Decimal,
    pub cogs: Decimal,
    pub collections: Decimal,
    pub supplier_payments: Decimal,
    pub payroll: Decimal,
    pub opex: Decimal,
    pub capex_payments: Decimal,
    pub loan_payments: Decimal,
    pub loan_proceeds: Decimal,
    pub funding_injection: Decimal,
    pub net_cash_flow: Decimal,
    pub operating_cash_flow: Decimal,
    /// Balance at the end of the year's last month.
    pub treasury_end: Decimal,
}

/// Everything the ledger reads.
#[derive(Clone, Copy, Debug)]
pub struct TreasuryInputs<'a> {
    pub window: &'a PlanningWindow,
    pub annual: &'a [AnnualRecord],
    pub initial_cash: Decimal,
    pub exclude_funding: bool,
    pub funding_rounds: &'a [FundingRound],
    pub seasonality: &'a Seasonality,
    pub payment_terms: &'a PaymentTerms,
    pub loans: &'a [LoanConfig],
    pub products: &'a [Product],
    pub capex_schedule: &'a CapexSchedule,
}

impl<'a> TreasuryInputs<'a> {
    pub fn from_scenario(scenario: &'a Scenario, annual: &'a [AnnualRecord]) -> Self {
        TreasuryInputs {
            window: &scenario.window,
            annual,
            initial_cash: scenario.treasury.initial_cash,
            exclude_funding: scenario.treasury.exclude_funding,
            funding_rounds: &scenario.funding_rounds,
            seasonality: &scenario.seasonality,
            payment_terms: &scenario.payment_terms,
            loans: &scenario.loans,
            products: &scenario.products,
            capex_schedule: &scenario.capex_payments,
        }
    }
}

/// Amounts booked on fixed dates, indexed by month offset in the window.
#[derive(Default)]
struct DatedFlows {
    capex: Vec<Decimal>,
    loan_payments: Vec<Decimal>,
    loan_proceeds: Vec<Decimal>,
    funding: Vec<Decimal>,
}

impl DatedFlows {
    fn new(months: usize) -> Self {
        DatedFlows {
            capex: vec![Decimal::ZERO; months],
            loan_payments: vec![Decimal::ZERO; months],
            loan_proceeds: vec![Decimal::ZERO; months],
            funding: vec![Decimal::ZERO; months],
        }
    }
}

fn month_index(window: &PlanningWindow, ym: YearMonth) -> Option<usize> {
    let offset = ym.offset_from(window.start_year);
    usize::try_from(offset)
        .ok()
        .filter(|&i| i < window.months())
}

fn book(series: &mut [Decimal], window: &PlanningWindow, ym: YearMonth, amount: Decimal) {
    if let Some(i) = month_index(window, ym) {
        series[i] += amount;
    }
}

fn dated_flows(inputs: &TreasuryInputs<'_>) -> DatedFlows {
    let window = inputs.window;
    let mut flows = DatedFlows::new(window.months());

    for loan in inputs.loans {
        for (due, payment) in loan_payments(loan) {
            book(&mut flows.loan_payments, window, due, payment);
        }
        if loan.disburse {
            book(&mut flows.loan_proceeds, window, loan.start, loan.principal);
        }
    }

    for product in inputs.products {
        let tranches = inputs
            .capex_schedule
            .get(&product.id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        for (due, amount) in capex_payments(product, tranches) {
            book(&mut flows.capex, window, due, amount);
        }
    }

    if !inputs.exclude_funding {
        for round in inputs.funding_rounds {
            let due = YearMonth::new(round.year, round.quarter.first_month());
            book(&mut flows.funding, window, due, round.amount);
        }
    }
    flows
}

/// Build the monthly ledger.
pub fn project_monthly(inputs: &TreasuryInputs<'_>) -> Vec<MonthlyTreasury> {
    let window = inputs.window;
    let by_year: BTreeMap<Year, &AnnualRecord> =
        inputs.annual.iter().map(|r| (r.year, r)).collect();
    let flows = dated_flows(inputs);
    let flat = SeasonalityProfile::default();

    let mut receivables = PaymentSchedule::new();
    let mut payables = PaymentSchedule::new();
    let mut balance = inputs.initial_cash;
    let mut out = Vec::with_capacity(window.months());

    for (y_idx, year) in window.years().enumerate() {
        let (rev_total, cogs_total, payroll_total, opex_total) = by_year
            .get(&year)
            .map(|r| (r.revenue, r.cogs, r.payroll, r.opex))
            .unwrap_or_default();
        let revenue = distribute_annual(rev_total, &inputs.seasonality.revenue);
        let cogs = distribute_annual(cogs_total, &inputs.seasonality.revenue);
        let payroll = distribute_annual(payroll_total, &flat);
        let opex = distribute_annual(opex_total, &inputs.seasonality.opex);

        for m in 0..12 {
            let idx = y_idx * 12 + m;
            receivables.schedule(idx, revenue[m], &inputs.payment_terms.customer);
            payables.schedule(idx, cogs[m], &inputs.payment_terms.supplier);

            let collections = receivables.settle(idx);
            let supplier_payments = payables.settle(idx);
            let net_cash_flow = collections - supplier_payments - payroll[m] - opex[m]
                - flows.capex[idx]
                - flows.loan_payments[idx]
                + flows.loan_proceeds[idx]
                + flows.funding[idx];

            let treasury_start = balance;
            balance += net_cash_flow;
            out.push(MonthlyTreasury {
                year,
                month: m as u32 + 1,
                revenue: revenue[m],
                cogs: cogs[m],
                collections,
                supplier_payments,
                payroll: payroll[m],
                opex: opex[m],
                capex_payments: flows.capex[idx],
                loan_payments: flows.loan_payments[idx],
                loan_proceeds: flows.loan_proceeds[idx],
                funding_injection: flows.funding[idx],
                net_cash_flow,
                treasury_start,
                treasury_end: balance,
            });
        }
    }

    debug!(
        months = out.len(),
        uncollected = %receivables.outstanding(),
        unpaid = %payables.outstanding(),
        closing = %balance,
        "monthly treasury built"
    );
    out
}

/// Fold the ledger into calendar years.
pub fn yearly_treasury(monthly: &[MonthlyTreasury]) -> Vec<TreasuryYear> {
    let mut out: Vec<TreasuryYear> = Vec::new();
    for m in monthly {
        if out.last().map(|y| y.year) != Some(m.year) {
            out.push(TreasuryYear {
                year: m.year,
                ..Default::default()
            });
        }
        if let Some(y) = out.last_mut() {
            y.revenue += m.revenue;
            y.cogs += m.cogs;
            y.collections += m.collections;
            y.supplier_payments += m.supplier_payments;
            y.payroll += m.payroll;
            y.opex += m.opex;
            y.capex_payments += m.capex_payments;
            y.loan_payments += m.loan_payments;
            y.loan_proceeds += m.loan_proceeds;
            y.funding_injection += m.funding_injection;
            y.net_cash_flow += m.net_cash_flow;
            y.operating_cash_flow += m.operating_cash_flow();
            y.treasury_end = m.treasury_end;
        }
    }
    out
}
