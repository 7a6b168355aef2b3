#![deny(warnings)]

//! Core scenario model for the financial planner.
//!
//! This crate defines the serializable inputs of a planning scenario
//! (products, hires, expenses, loans, funding rounds, timing configs) with
//! canonical empty values, plus the validation report surfaced to users and
//! the tab permission matrix consulted by the presentation layer.

pub mod access;
pub mod model;
pub mod validate;

pub use access::{AppRole, PermissionMatrix, PermissionProvider, TabPermission};
pub use model::*;
pub use validate::{validate_scenario, ValidationIssue};
