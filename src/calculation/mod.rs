//! Calculation and rounding engine.
//!
//! This module turns a resolved contribution config and a base into rounded
//! employer and employee amounts, and folds an employee's amounts into net
//! pay. Every function returns the audit step describing its decision.

mod contribution;
mod net_pay;
mod rounding;

pub use contribution::{ContributionResult, calculate_contribution};
pub use net_pay::{NetPayResult, calculate_net_pay};
pub use rounding::{
    MONEY_SCALE, RoundingPolicy, StandardRounding, ThresholdRounding, rounding_policy,
};
