#![deny(warnings)]

//! Financial calculators for the planner.
//!
//! Pure functions over the scenario model:
//! - Annual aggregation of revenue, COGS, payroll, OPEX, CAPEX and depreciation
//! - Seasonality split of annual totals into months
//! - Payment-term scheduling of incurred amounts
//! - Loan amortization and CAPEX tranche timing
//! - Funding need, dilution, break-even and valuation methods
//!
//! None of these return errors: missing or inconsistent inputs degrade to
//! zero or to a documented fallback.

pub mod annual;
pub mod bom;
pub mod capex;
pub mod funding;
pub mod loan;
pub mod money;
pub mod seasonality;
pub mod terms;
pub mod valuation;

pub use annual::{aggregate_years, AnnualRecord};
pub use funding::{break_even_year, coverage_ratio, dilution, funding_need, BreakEvenBasis, Dilution};
pub use loan::{amortization_schedule, loan_payments, periodic_payment, AmortizationRow};
pub use seasonality::{coefficients, distribute_annual};
pub use terms::PaymentSchedule;
pub use valuation::{evaluate, ValuationResult};
