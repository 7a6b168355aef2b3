//! Scenario consistency checks.
//!
//! The projection never rejects a scenario. These issues are reported
//! alongside it so the user can fix inputs that were computed as given.

use crate::model::*;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

/// A scenario inconsistency worth surfacing to the user.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationIssue {
    /// Payment term percentages do not add up to 100.
    #[error("{side} payment terms sum to {total}% instead of 100%")]
    PaymentTermsSum { side: &'static str, total: Decimal },
    /// CAPEX tranches allocate more than the development cost.
    #[error("capex tranches of product {product} sum to {total}% (above 100%)")]
    CapexOverAllocated { product: String, total: Decimal },
    /// CAPEX tranches reference a product that does not exist.
    #[error("capex tranches reference unknown product {0}")]
    UnknownProduct(String),
    /// Month outside 1..=12.
    #[error("invalid calendar month {month} in {context}")]
    InvalidMonth { context: String, month: u32 },
    /// Loan repayment ends before it starts.
    #[error("loan {0} ends before it starts")]
    LoanDatesInverted(String),
    /// Monetary input below zero.
    #[error("negative amount in {0}")]
    NegativeMoney(String),
    /// Projection covers no month.
    #[error("planning window has zero years")]
    EmptyWindow,
    /// Seasonality key outside 0..=11.
    #[error("seasonality month index {0} is outside 0..=11")]
    SeasonalityIndex(u8),
    /// Two entities share an id.
    #[error("duplicate id: {0}")]
    DuplicateId(String),
    /// Product category is not registered.
    #[error("product {product} references unknown category {category}")]
    UnknownCategory { product: String, category: String },
    /// Convertible share outside [0, 1].
    #[error("round {0} has a convertible ratio outside [0, 1]")]
    InvalidOcRatio(String),
    /// Window longer than the engine expands; the tail is dropped.
    #[error("planning window of {0} years exceeds the {max} year limit", max = MAX_DURATION_YEARS)]
    WindowTooLong(u32),
    /// A dated input starts outside the planning window, usually a missing field.
    #[error("{context} starts in {year}, outside the planning window")]
    StartOutsideWindow { context: String, year: Year },
}

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

fn terms_total(terms: &[PaymentTerm]) -> Decimal {
    terms.iter().map(|t| t.percentage).sum()
}

fn check_money(issues: &mut Vec<ValidationIssue>, context: impl Into<String>, value: Decimal) {
    if value < Decimal::ZERO {
        issues.push(ValidationIssue::NegativeMoney(context.into()));
    }
}

fn check_ids<'a>(issues: &mut Vec<ValidationIssue>, ids: impl Iterator<Item = &'a str>) {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            issues.push(ValidationIssue::DuplicateId(id.to_string()));
        }
    }
}

/// Collect every issue found in `scenario`, in a stable order.
pub fn validate_scenario(scenario: &Scenario) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if scenario.window.duration_years == 0 {
        issues.push(ValidationIssue::EmptyWindow);
    }
    if scenario.window.duration_years > MAX_DURATION_YEARS {
        issues.push(ValidationIssue::WindowTooLong(scenario.window.duration_years));
    }
    let window = &scenario.window;

    check_ids(&mut issues, scenario.products.iter().map(|p| p.id.0.as_str()));
    for p in &scenario.products {
        let ctx = format!("product {}", p.id.0);
        check_money(&mut issues, ctx.clone(), p.dev_cost);
        check_money(&mut issues, ctx.clone(), p.unit_cost);
        check_money(&mut issues, ctx, p.price_ht);
        if let Some(c) = &p.category {
            if scenario.product_category(p) == UNCATEGORIZED && c != UNCATEGORIZED {
                issues.push(ValidationIssue::UnknownCategory {
                    product: p.id.0.clone(),
                    category: c.clone(),
                });
            }
        }
    }

    check_ids(&mut issues, scenario.roles.iter().map(|r| r.id.as_str()));
    for r in &scenario.roles {
        check_money(&mut issues, format!("role {}", r.id), r.annual_cost_loaded);
    }

    match &scenario.opex {
        OpexPlan::Simple { base_annual, .. } => {
            check_money(&mut issues, "simple opex", *base_annual)
        }
        OpexPlan::Detailed { expenses } => {
            check_ids(&mut issues, expenses.iter().map(|e| e.id.as_str()));
            for e in expenses {
                check_money(&mut issues, format!("expense {}", e.id), e.base_annual_cost);
                if !window.contains(e.start_year) {
                    issues.push(ValidationIssue::StartOutsideWindow {
                        context: format!("expense {}", e.id),
                        year: e.start_year,
                    });
                }
            }
        }
    }

    for (side, terms) in [
        ("customer", &scenario.payment_terms.customer),
        ("supplier", &scenario.payment_terms.supplier),
    ] {
        if terms.is_empty() {
            continue;
        }
        let total = terms_total(terms);
        if total != HUNDRED {
            issues.push(ValidationIssue::PaymentTermsSum { side, total });
        }
    }

    for (id, tranches) in &scenario.capex_payments {
        if scenario.product(id).is_none() {
            issues.push(ValidationIssue::UnknownProduct(id.0.clone()));
        }
        let total: Decimal = tranches.iter().map(|t| t.percentage).sum();
        if total > HUNDRED {
            issues.push(ValidationIssue::CapexOverAllocated {
                product: id.0.clone(),
                total,
            });
        }
        for t in tranches {
            if !(1..=12).contains(&t.month) {
                issues.push(ValidationIssue::InvalidMonth {
                    context: format!("capex tranche of {}", id.0),
                    month: t.month,
                });
            }
        }
    }

    for loan in &scenario.loans {
        for ym in [loan.start, loan.end] {
            if !(1..=12).contains(&ym.month) {
                issues.push(ValidationIssue::InvalidMonth {
                    context: format!("loan {}", loan.id),
                    month: ym.month,
                });
            }
        }
        if loan.end < loan.start {
            issues.push(ValidationIssue::LoanDatesInverted(loan.id.clone()));
        }
        if !window.contains(loan.start.year) {
            issues.push(ValidationIssue::StartOutsideWindow {
                context: format!("loan {}", loan.id),
                year: loan.start.year,
            });
        }
        check_money(&mut issues, format!("loan {}", loan.id), loan.principal);
    }

    for round in &scenario.funding_rounds {
        check_money(&mut issues, format!("round {}", round.id), round.amount);
        if round.oc_ratio < Decimal::ZERO || round.oc_ratio > Decimal::ONE {
            issues.push(ValidationIssue::InvalidOcRatio(round.id.clone()));
        }
    }

    for profile in [&scenario.seasonality.revenue, &scenario.seasonality.opex] {
        for &idx in profile.deviations.keys() {
            if idx > 11 {
                issues.push(ValidationIssue::SeasonalityIndex(idx));
            }
        }
    }

    debug!(issues = issues.len(), "scenario validated");
    issues
}
