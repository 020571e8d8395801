//! Staging records and import batches.
//!
//! A [`StagingRecord`] is one raw imported row after mapping and coercion.
//! Records are created by ingestion, then only their validation status,
//! validation issues and matched employee change.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PayrollError;

/// The contribution domain a source file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Occupational annuity export.
    Annuity,
    /// Housing provident fund export.
    HousingFund,
    /// Individual income tax export.
    Tax,
}

impl FromStr for SourceType {
    type Err = PayrollError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "annuity" => Ok(SourceType::Annuity),
            "housing_fund" => Ok(SourceType::HousingFund),
            "tax" => Ok(SourceType::Tax),
            other => Err(PayrollError::ValidationError {
                field: "source_type".to_string(),
                message: format!("unknown source type '{other}'"),
            }),
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceType::Annuity => "annuity",
            SourceType::HousingFund => "housing_fund",
            SourceType::Tax => "tax",
        })
    }
}

/// Lifecycle of a staging record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    /// Not yet validated.
    Pending,
    /// Passed structural and type checks.
    Valid,
    /// Failed at least one check; excluded downstream.
    Invalid,
    /// Resolved to exactly one employee.
    Matched,
    /// Valid but no single employee could be resolved.
    Unmatched,
}

/// One recorded problem with a staging record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// The canonical field or raw column concerned.
    pub field: String,
    /// Machine-readable reason code.
    pub code: String,
    /// Human-readable reason.
    pub reason: String,
}

impl ValidationIssue {
    /// Records an error against a field.
    pub fn from_error(field: impl Into<String>, error: &PayrollError) -> Self {
        Self {
            field: field.into(),
            code: error.reason_code().to_string(),
            reason: error.to_string(),
        }
    }
}

/// A coerced value for a canonical field outside the fixed staging columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A fixed-point decimal.
    Decimal(Decimal),
    /// A calendar date.
    Date(NaiveDate),
    /// Free text.
    Text(String),
}

/// One imported row for a contribution domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagingRecord {
    /// Unique identifier.
    pub id: Uuid,
    /// The domain of the source file.
    pub source_type: SourceType,
    /// 18-character identity card number.
    pub id_card_number: String,
    /// The pay period the row belongs to, as written in the source.
    pub pay_period_identifier: String,
    /// Employee name as written in the source.
    pub employee_name: String,
    /// Salary the contribution base derives from.
    pub contribution_base_salary: Option<Decimal>,
    /// Contribution base.
    pub contribution_base: Option<Decimal>,
    /// Employer rate.
    pub employer_rate: Option<Decimal>,
    /// Employer contribution reported by the source.
    pub employer_contribution: Option<Decimal>,
    /// Employee rate.
    pub employee_rate: Option<Decimal>,
    /// Employee contribution reported by the source.
    pub employee_contribution: Option<Decimal>,
    /// Taxable income (tax exports).
    pub taxable_income: Option<Decimal>,
    /// Income tax withheld (tax exports).
    pub income_tax: Option<Decimal>,
    /// Mapped canonical fields without a dedicated column.
    #[serde(default)]
    pub extra: BTreeMap<String, FieldValue>,
    /// Source file name.
    pub source_filename: String,
    /// 1-based position of the row in the source file.
    pub row_number: usize,
    /// SHA-256 of the raw row content.
    pub content_hash: String,
    /// When the row was imported.
    pub import_timestamp: DateTime<Utc>,
    /// The batch that produced this row.
    pub import_batch_id: Uuid,
    /// Current validation status.
    pub validation_status: ValidationStatus,
    /// Problems found, in the order they were found.
    pub validation_errors: Vec<ValidationIssue>,
    /// The employee this row resolved to, once matched.
    pub employee_id: Option<String>,
}

impl StagingRecord {
    /// The contribution base this row supplies: the explicit base, falling
    /// back to the base salary.
    pub fn effective_base(&self) -> Option<Decimal> {
        self.contribution_base.or(self.contribution_base_salary)
    }
}

/// Groups the staging records produced by one ingestion invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportBatch {
    /// Generated identifier.
    pub id: Uuid,
    /// The domain of the source file.
    pub source_type: SourceType,
    /// Source file name.
    pub source_filename: String,
    /// SHA-256 over all row content hashes, in order.
    pub file_hash: String,
    /// When the batch was created.
    pub imported_at: DateTime<Utc>,
    /// Number of staging records attributed to this batch.
    pub row_count: usize,
}
