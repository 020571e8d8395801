//! Error types for the payroll engine.
//!
//! This module provides strongly-typed errors using the `thiserror` crate
//! for every failure the ingestion, matching, rule resolution and payroll run
//! components can report. Row-level and employee-level variants are recorded
//! as data by their callers; run-level variants are surfaced to the caller.

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{ContributionType, RunStatus};

/// The main error type for the payroll engine.
///
/// Every variant carries the offending identifier (column, row, employee,
/// run) and maps to a stable machine-readable code through
/// [`PayrollError::reason_code`].
///
/// # Example
///
/// ```
/// use payroll_engine::error::PayrollError;
///
/// let error = PayrollError::UnmappedField {
///     column: "Unknown Column".to_string(),
/// };
/// assert_eq!(error.to_string(), "No field mapping for source column 'Unknown Column'");
/// assert_eq!(error.reason_code(), "UNMAPPED_FIELD");
/// ```
#[derive(Debug, Error)]
pub enum PayrollError {
    /// A raw column had no mapping and is not configured as ignorable.
    #[error("No field mapping for source column '{column}'")]
    UnmappedField {
        /// The raw column label.
        column: String,
    },

    /// A value failed a structural or type-coercion check.
    #[error("Invalid value for field '{field}': {message}")]
    ValidationError {
        /// The canonical field (or raw column) that failed.
        field: String,
        /// A description of what was wrong.
        message: String,
    },

    /// More than one employee matched a staging record.
    #[error("Ambiguous match on {key}: {candidates} candidate employees")]
    AmbiguousMatch {
        /// The matching key that produced several candidates.
        key: String,
        /// The number of candidates found.
        candidates: usize,
    },

    /// No employee matched a staging record, or no matched staging record
    /// exists for an employee that needs one.
    #[error("No matching record for {key}")]
    UnmatchedRecord {
        /// The matching key that produced no candidates.
        key: String,
    },

    /// No active effective-dated rule covers the date.
    #[error(
        "No applicable {contribution_type} rule for personnel category '{category}' on {date}"
    )]
    NoApplicableRule {
        /// The personnel category being resolved.
        category: String,
        /// The contribution type being resolved.
        contribution_type: ContributionType,
        /// The evaluation date.
        date: NaiveDate,
    },

    /// A calculation is already in flight for the run.
    #[error("Payroll run {run_id} already has a calculation in flight")]
    RunBusy {
        /// The run identifier.
        run_id: Uuid,
    },

    /// The run is paid and can no longer be recalculated or changed.
    #[error("Payroll run {run_id} is paid and locked")]
    RunLocked {
        /// The run identifier.
        run_id: Uuid,
    },

    /// The requested payroll run does not exist.
    #[error("Payroll run not found: {run_id}")]
    RunNotFound {
        /// The run identifier.
        run_id: Uuid,
    },

    /// The requested import batch does not exist.
    #[error("Import batch not found: {batch_id}")]
    BatchNotFound {
        /// The batch identifier.
        batch_id: Uuid,
    },

    /// A run state transition is not permitted from the current status.
    #[error("Payroll run {run_id} cannot {action} while {status}")]
    InvalidTransition {
        /// The run identifier.
        run_id: Uuid,
        /// The action that was attempted.
        action: String,
        /// The status the run was in.
        status: RunStatus,
    },

    /// A field mapping with the same canonical target already exists.
    #[error("Target field '{target_name}' is already mapped")]
    DuplicateTargetField {
        /// The duplicated canonical field name.
        target_name: String,
    },

    /// A rule with the same natural key already exists.
    #[error("Duplicate rule for category '{category}' and '{key}' effective {effective_date}")]
    DuplicateRule {
        /// The personnel category.
        category: String,
        /// The contribution config id or type the rule collides on.
        key: String,
        /// The shared effective date.
        effective_date: NaiveDate,
    },

    /// A rule's interval overlaps an existing active rule for the same pair.
    #[error("Rule for category '{category}' and config '{config_id}' overlaps an existing rule")]
    OverlappingRule {
        /// The personnel category.
        category: String,
        /// The contribution config id.
        config_id: String,
    },

    /// A rule referenced a contribution config that does not exist.
    #[error("Unknown contribution config: {config_id}")]
    UnknownContributionConfig {
        /// The missing config id.
        config_id: String,
    },

    /// The employee master has no gross pay for the employee and period.
    #[error("No compensation for employee '{employee_id}' in period {period}")]
    CompensationNotFound {
        /// The employee identifier.
        employee_id: String,
        /// The pay period identifier.
        period: String,
    },

    /// Per-employee calculation exceeded the configured timeout.
    #[error("Calculation for employee '{employee_id}' timed out after {timeout_ms}ms")]
    CalculationTimeout {
        /// The employee identifier.
        employee_id: String,
        /// The configured timeout in milliseconds.
        timeout_ms: u64,
    },

    /// Per-employee calculation task ended without a result.
    #[error("Calculation task for employee '{employee_id}' failed: {message}")]
    CalculationTaskFailed {
        /// The employee identifier.
        employee_id: String,
        /// A description of the failure.
        message: String,
    },

    /// The raw source file could not be read as CSV.
    #[error("Failed to parse source file '{filename}': {message}")]
    CsvParse {
        /// The source filename.
        filename: String,
        /// A description of the parse error.
        message: String,
    },

    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Configuration file could not be parsed.
    #[error("Failed to parse configuration file '{path}': {message}")]
    ConfigParseError {
        /// The path to the file that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },
}

impl PayrollError {
    /// Returns the stable, machine-readable code for this error.
    pub fn reason_code(&self) -> &'static str {
        match self {
            PayrollError::UnmappedField { .. } => "UNMAPPED_FIELD",
            PayrollError::ValidationError { .. } => "VALIDATION_ERROR",
            PayrollError::AmbiguousMatch { .. } => "AMBIGUOUS_MATCH",
            PayrollError::UnmatchedRecord { .. } => "UNMATCHED_RECORD",
            PayrollError::NoApplicableRule { .. } => "NO_APPLICABLE_RULE",
            PayrollError::RunBusy { .. } => "RUN_BUSY",
            PayrollError::RunLocked { .. } => "RUN_LOCKED",
            PayrollError::RunNotFound { .. } => "RUN_NOT_FOUND",
            PayrollError::BatchNotFound { .. } => "BATCH_NOT_FOUND",
            PayrollError::InvalidTransition { .. } => "INVALID_TRANSITION",
            PayrollError::DuplicateTargetField { .. } => "DUPLICATE_TARGET_FIELD",
            PayrollError::DuplicateRule { .. } => "DUPLICATE_RULE",
            PayrollError::OverlappingRule { .. } => "OVERLAPPING_RULE",
            PayrollError::UnknownContributionConfig { .. } => "UNKNOWN_CONTRIBUTION_CONFIG",
            PayrollError::CompensationNotFound { .. } => "COMPENSATION_NOT_FOUND",
            PayrollError::CalculationTimeout { .. } => "CALCULATION_TIMEOUT",
            PayrollError::CalculationTaskFailed { .. } => "CALCULATION_TASK_FAILED",
            PayrollError::CsvParse { .. } => "CSV_PARSE_ERROR",
            PayrollError::ConfigNotFound { .. } => "CONFIG_NOT_FOUND",
            PayrollError::ConfigParseError { .. } => "CONFIG_PARSE_ERROR",
        }
    }
}

/// A type alias for Results that return PayrollError.
pub type PayrollResult<T> = Result<T, PayrollError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmapped_field_displays_column() {
        let error = PayrollError::UnmappedField {
            column: "Bonus".to_string(),
        };
        assert_eq!(error.to_string(), "No field mapping for source column 'Bonus'");
    }

    #[test]
    fn test_no_applicable_rule_displays_category_type_and_date() {
        let error = PayrollError::NoApplicableRule {
            category: "contract".to_string(),
            contribution_type: ContributionType::HousingFund,
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        };
        assert_eq!(
            error.to_string(),
            "No applicable housing_fund rule for personnel category 'contract' on 2024-03-01"
        );
    }

    #[test]
    fn test_invalid_transition_displays_status() {
        let run_id = Uuid::nil();
        let error = PayrollError::InvalidTransition {
            run_id,
            action: "approve".to_string(),
            status: RunStatus::Draft,
        };
        assert_eq!(
            error.to_string(),
            format!("Payroll run {run_id} cannot approve while draft")
        );
    }

    #[test]
    fn test_config_parse_error_displays_path_and_message() {
        let error = PayrollError::ConfigParseError {
            path: "/config/bad.yaml".to_string(),
            message: "invalid YAML syntax".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to parse configuration file '/config/bad.yaml': invalid YAML syntax"
        );
    }

    #[test]
    fn test_reason_codes_for_run_level_errors() {
        let run_id = Uuid::new_v4();
        assert_eq!(PayrollError::RunBusy { run_id }.reason_code(), "RUN_BUSY");
        assert_eq!(PayrollError::RunLocked { run_id }.reason_code(), "RUN_LOCKED");
        assert_eq!(
            PayrollError::RunNotFound { run_id }.reason_code(),
            "RUN_NOT_FOUND"
        );
    }

    #[test]
    fn test_reason_codes_for_record_level_errors() {
        let ambiguous = PayrollError::AmbiguousMatch {
            key: "id_card_number".to_string(),
            candidates: 2,
        };
        let unmatched = PayrollError::UnmatchedRecord {
            key: "employee_name".to_string(),
        };
        assert_eq!(ambiguous.reason_code(), "AMBIGUOUS_MATCH");
        assert_eq!(unmatched.reason_code(), "UNMATCHED_RECORD");
    }

    #[test]
    fn test_errors_implement_std_error() {
        fn assert_error<T: std::error::Error + Send + Sync + 'static>() {}
        assert_error::<PayrollError>();
    }

    #[test]
    fn test_error_propagation_with_question_mark() {
        fn returns_unmapped() -> PayrollResult<()> {
            Err(PayrollError::UnmappedField {
                column: "x".to_string(),
            })
        }

        fn propagates_error() -> PayrollResult<()> {
            returns_unmapped()?;
            Ok(())
        }

        assert!(propagates_error().is_err());
    }
}
