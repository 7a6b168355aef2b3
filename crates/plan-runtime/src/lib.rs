#![deny(warnings)]

//! Projection runtime: the monthly treasury ledger and the full recompute
//! of a scenario into annual, monthly and summary outputs.
//!
//! The whole tree is recomputed in one synchronous pass; [`Projector`]
//! skips the pass when handed the same scenario instance again.

pub mod projection;
pub mod projector;
pub mod treasury;

pub use projection::{project, Projection, ProjectionMetrics};
pub use projector::{update_scenario, Projector};
pub use treasury::{project_monthly, yearly_treasury, MonthlyTreasury, TreasuryInputs, TreasuryYear};
