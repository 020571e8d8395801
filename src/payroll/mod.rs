//! Payroll run orchestration.
//!
//! This module contains the run state machine, the claim table that keeps
//! a run to one calculation at a time, and the per-employee calculation the
//! orchestrator fans out.

mod claim;
mod employee;
mod orchestrator;
mod store;

pub use claim::{ClaimTable, RunClaim};
pub use employee::{CalculationContext, RunScope, failed_entry};
pub use orchestrator::{CalculationOutcome, PayrollOrchestrator};
pub use store::{RunRecord, RunStore};
