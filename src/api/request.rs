//! Request types for the payroll engine API.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::PayPeriod;

/// Query string of `POST /imports`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportQuery {
    /// The source domain, e.g. `housing_fund`.
    pub source_type: String,
    /// The name of the uploaded file.
    pub filename: String,
}

/// Request body for `POST /runs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRunRequest {
    /// The pay period, `YYYY-MM` or `YYYYMM`.
    pub pay_period: PayPeriod,
    /// The as-of date for rule resolution; defaults to the period start.
    #[serde(default)]
    pub effective_date: Option<NaiveDate>,
}

/// Request body for `POST /runs/{id}/calculate`. The body may be omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalculateRequest {
    /// Recalculate a run that already holds a calculation.
    #[serde(default)]
    pub recompute: bool,
}
