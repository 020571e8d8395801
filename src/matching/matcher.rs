//! Staging record to employee matching.

use std::sync::Arc;

use tracing::debug;

use super::EmployeeDirectory;
use crate::error::{PayrollError, PayrollResult};
use crate::models::{Employee, PayPeriod, StagingRecord, ValidationIssue, ValidationStatus};

const MATCH_ISSUE_CODES: [&str; 2] = ["UNMATCHED_RECORD", "AMBIGUOUS_MATCH"];

/// Resolves staging records onto employees.
///
/// The identity card number is tried first. When it finds nobody, the
/// employee name is tried among employees employed during the record's pay
/// period. Several candidates on either key never resolve.
#[derive(Clone)]
pub struct EmployeeMatcher {
    directory: Arc<dyn EmployeeDirectory>,
}

impl EmployeeMatcher {
    /// Creates a matcher over a directory.
    pub fn new(directory: Arc<dyn EmployeeDirectory>) -> Self {
        Self { directory }
    }

    /// Finds the single employee a record refers to.
    pub fn match_record(&self, record: &StagingRecord) -> PayrollResult<Employee> {
        let by_card = self.directory.find_by_id_card(&record.id_card_number);
        if let Some(employee) = single(by_card, || {
            format!("id_card_number {}", record.id_card_number)
        })? {
            return Ok(employee);
        }

        let period: PayPeriod = record.pay_period_identifier.parse().map_err(|_| {
            PayrollError::ValidationError {
                field: "pay_period_identifier".to_string(),
                message: format!("'{}' is not a pay period", record.pay_period_identifier),
            }
        })?;
        let by_name: Vec<Employee> = self
            .directory
            .find_by_name(&record.employee_name)
            .into_iter()
            .filter(|employee| employee.is_employed_during(&period))
            .collect();

        single(by_name, || {
            format!("employee_name '{}' in {}", record.employee_name, period)
        })?
        .ok_or_else(|| PayrollError::UnmatchedRecord {
            key: format!(
                "id_card_number {} or employee_name '{}' in {}",
                record.id_card_number, record.employee_name, period
            ),
        })
    }

    /// Matches a valid or unmatched record in place.
    ///
    /// On success the record becomes `matched` with the employee id; on
    /// failure it becomes `unmatched` with the reason appended to its
    /// validation issues. Records in any other status are left untouched.
    /// Returns the status the record ends in.
    pub fn apply(&self, record: &mut StagingRecord) -> ValidationStatus {
        if !matches!(
            record.validation_status,
            ValidationStatus::Valid | ValidationStatus::Unmatched
        ) {
            return record.validation_status;
        }

        record
            .validation_errors
            .retain(|issue| !MATCH_ISSUE_CODES.contains(&issue.code.as_str()));

        match self.match_record(record) {
            Ok(employee) => {
                debug!(
                    row_number = record.row_number,
                    employee_id = %employee.id,
                    "Matched staging record"
                );
                record.employee_id = Some(employee.id);
                record.validation_status = ValidationStatus::Matched;
            }
            Err(error) => {
                debug!(
                    row_number = record.row_number,
                    reason = error.reason_code(),
                    "Staging record left unmatched"
                );
                record.employee_id = None;
                record
                    .validation_errors
                    .push(ValidationIssue::from_error("employee", &error));
                record.validation_status = ValidationStatus::Unmatched;
            }
        }
        record.validation_status
    }
}

fn single(
    mut candidates: Vec<Employee>,
    key: impl FnOnce() -> String,
) -> PayrollResult<Option<Employee>> {
    match candidates.len() {
        0 | 1 => Ok(candidates.pop()),
        count => Err(PayrollError::AmbiguousMatch {
            key: key(),
            candidates: count,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::InMemoryEmployeeDirectory;
    use crate::models::SourceType;
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn employee(id: &str, card: Option<&str>, name: &str, start: NaiveDate) -> Employee {
        Employee {
            id: id.to_string(),
            id_card_number: card.map(str::to_string),
            name: name.to_string(),
            personnel_category_id: "staff".to_string(),
            employment_start: start,
            employment_end: None,
            monthly_gross_pay: Decimal::new(800000, 2),
        }
    }

    fn record(card: &str, name: &str, period: &str) -> StagingRecord {
        StagingRecord {
            id: Uuid::new_v4(),
            source_type: SourceType::HousingFund,
            id_card_number: card.to_string(),
            pay_period_identifier: period.to_string(),
            employee_name: name.to_string(),
            contribution_base_salary: None,
            contribution_base: None,
            employer_rate: None,
            employer_contribution: None,
            employee_rate: None,
            employee_contribution: None,
            taxable_income: None,
            income_tax: None,
            extra: BTreeMap::new(),
            source_filename: "hf.csv".to_string(),
            row_number: 1,
            content_hash: String::new(),
            import_timestamp: Utc::now(),
            import_batch_id: Uuid::nil(),
            validation_status: ValidationStatus::Valid,
            validation_errors: vec![],
            employee_id: None,
        }
    }

    const CARD_A: &str = "110101199001011234";
    const CARD_B: &str = "110101199202022345";
    const CARD_X: &str = "31010119850505999X";

    fn jan() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn matcher(employees: Vec<Employee>) -> EmployeeMatcher {
        EmployeeMatcher::new(Arc::new(InMemoryEmployeeDirectory::new(employees)))
    }

    #[test]
    fn test_match_by_id_card() {
        let matcher = matcher(vec![
            employee("emp_001", Some(CARD_A), "Li Wei", jan()),
            employee("emp_002", Some(CARD_B), "Li Wei", jan()),
        ]);
        let mut record = record(CARD_A, "Someone Else", "2024-03");

        assert_eq!(matcher.apply(&mut record), ValidationStatus::Matched);
        assert_eq!(record.employee_id.as_deref(), Some("emp_001"));
        assert!(record.validation_errors.is_empty());
    }

    #[test]
    fn test_fall_back_to_name_and_period() {
        let matcher = matcher(vec![employee("emp_001", None, "Li Wei", jan())]);
        let mut record = record(CARD_X, "Li Wei", "2024-03");

        assert_eq!(matcher.apply(&mut record), ValidationStatus::Matched);
        assert_eq!(record.employee_id.as_deref(), Some("emp_001"));
    }

    #[test]
    fn test_name_fallback_ignores_employees_outside_period() {
        let later = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let matcher = matcher(vec![employee("emp_001", None, "Li Wei", later)]);
        let mut record = record(CARD_X, "Li Wei", "2024-03");

        assert_eq!(matcher.apply(&mut record), ValidationStatus::Unmatched);
        assert_eq!(record.validation_errors[0].code, "UNMATCHED_RECORD");
        assert!(record.employee_id.is_none());
    }

    #[test]
    fn test_two_name_candidates_never_picks() {
        let matcher = matcher(vec![
            employee("emp_001", None, "Li Wei", jan()),
            employee("emp_002", None, "Li Wei", jan()),
        ]);
        let mut record = record(CARD_X, "Li Wei", "2024-03");

        match matcher.match_record(&record).unwrap_err() {
            PayrollError::AmbiguousMatch { candidates, .. } => assert_eq!(candidates, 2),
            other => panic!("Expected AmbiguousMatch, got {:?}", other),
        }
        assert_eq!(matcher.apply(&mut record), ValidationStatus::Unmatched);
        assert_eq!(record.validation_errors[0].code, "AMBIGUOUS_MATCH");
        assert!(record.employee_id.is_none());
    }

    #[test]
    fn test_duplicate_id_card_is_ambiguous() {
        let matcher = matcher(vec![
            employee("emp_001", Some(CARD_A), "Li Wei", jan()),
            employee("emp_002", Some(CARD_A), "Wang Fang", jan()),
        ]);
        let record = record(CARD_A, "Li Wei", "2024-03");
        assert_eq!(
            matcher.match_record(&record).unwrap_err().reason_code(),
            "AMBIGUOUS_MATCH"
        );
    }

    #[test]
    fn test_invalid_records_are_not_matched() {
        let matcher = matcher(vec![employee("emp_001", Some(CARD_A), "Li Wei", jan())]);
        let mut record = record(CARD_A, "Li Wei", "2024-03");
        record.validation_status = ValidationStatus::Invalid;

        assert_eq!(matcher.apply(&mut record), ValidationStatus::Invalid);
        assert!(record.employee_id.is_none());
    }

    #[test]
    fn test_rematch_replaces_previous_match_issue() {
        let directory = Arc::new(InMemoryEmployeeDirectory::new(vec![]));
        let matcher = EmployeeMatcher::new(directory.clone());
        let mut record = record(CARD_A, "Li Wei", "2024-03");

        assert_eq!(matcher.apply(&mut record), ValidationStatus::Unmatched);
        assert_eq!(matcher.apply(&mut record), ValidationStatus::Unmatched);
        assert_eq!(record.validation_errors.len(), 1);

        directory.upsert(employee("emp_001", Some(CARD_A), "Li Wei", jan()));
        assert_eq!(matcher.apply(&mut record), ValidationStatus::Matched);
        assert!(record.validation_errors.is_empty());
    }

    #[test]
    fn test_outcome_does_not_depend_on_processing_order() {
        let matcher = matcher(vec![
            employee("emp_001", Some(CARD_A), "Li Wei", jan()),
            employee("emp_002", None, "Wang Fang", jan()),
            employee("emp_003", None, "Zhao Lei", jan()),
            employee("emp_004", None, "Zhao Lei", jan()),
        ]);
        let records: Vec<StagingRecord> = [
            (CARD_A, "Li Wei"),
            (CARD_X, "Wang Fang"),
            (CARD_X, "Zhao Lei"),
            (CARD_B, "Nobody"),
            (CARD_A, "Li Wei"),
        ]
        .into_iter()
        .enumerate()
        .map(|(index, (card, name))| {
            let mut record = record(card, name, "2024-03");
            record.row_number = index + 1;
            record
        })
        .collect();

        let outcomes = |ordered: Vec<StagingRecord>| {
            let mut by_row: BTreeMap<usize, (ValidationStatus, Option<String>)> = BTreeMap::new();
            for mut record in ordered {
                let status = matcher.apply(&mut record);
                by_row.insert(record.row_number, (status, record.employee_id));
            }
            by_row
        };

        let forward = outcomes(records.clone());
        let reversed = outcomes(records.into_iter().rev().collect());

        assert_eq!(forward, reversed);
        assert_eq!(forward[&1], (ValidationStatus::Matched, Some("emp_001".to_string())));
        assert_eq!(forward[&2], (ValidationStatus::Matched, Some("emp_002".to_string())));
        assert_eq!(forward[&3], (ValidationStatus::Unmatched, None));
        assert_eq!(forward[&4], (ValidationStatus::Unmatched, None));
        assert_eq!(forward[&5], forward[&1]);
    }
}
