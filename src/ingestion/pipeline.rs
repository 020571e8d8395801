//! The staging ingestion pipeline.

use std::io::Read;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::coerce::coerce_value;
use super::parser::{RawRow, file_hash, parse_csv};
use super::store::{AppendOutcome, StagingStore};
use crate::config::IngestionSettings;
use crate::error::{PayrollError, PayrollResult};
use crate::mapping::{FieldMappingCatalog, FieldMappingSet, ResolvedField};
use crate::matching::EmployeeMatcher;
use crate::models::{
    FieldMapping, FieldValue, ImportBatch, PayPeriod, SourceType, StagingRecord, ValidationIssue,
    ValidationStatus,
};

/// Length of a national identity card number.
pub const ID_CARD_LENGTH: usize = 18;

/// One validation problem reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    /// The source row.
    pub row_number: usize,
    /// The field or column concerned.
    pub field: String,
    /// Machine-readable reason code.
    pub code: String,
    /// Human-readable reason.
    pub reason: String,
}

/// Summary of one ingestion.
///
/// `valid` counts rows that passed validation, whether or not they then
/// matched an employee; `matched` and `unmatched` split it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// The batch the rows belong to. For a duplicate file, the earlier batch.
    pub batch_id: Uuid,
    /// True when an identical file had already been ingested.
    pub duplicate: bool,
    /// Rows read from the source.
    pub total_rows: usize,
    /// Rows that passed validation.
    pub valid: usize,
    /// Rows that failed validation.
    pub invalid: usize,
    /// Valid rows resolved to an employee.
    pub matched: usize,
    /// Valid rows not resolved to an employee.
    pub unmatched: usize,
    /// Rows skipped because they were already stored.
    pub skipped_duplicates: usize,
    /// The first problems found, in row order.
    pub errors: Vec<RowError>,
}

/// Summary of re-running matching over a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RematchReport {
    /// The batch.
    pub batch_id: Uuid,
    /// Previously unmatched rows that now match.
    pub newly_matched: usize,
    /// Rows still unmatched.
    pub still_unmatched: usize,
}

/// Turns raw source files into validated, matched staging records.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use payroll_engine::config::IngestionSettings;
/// use payroll_engine::ingestion::{Ingestor, StagingStore};
/// use payroll_engine::mapping::{FieldMappingCatalog, FieldMappingSet};
/// use payroll_engine::matching::{EmployeeMatcher, InMemoryEmployeeDirectory};
/// use payroll_engine::models::{DataType, FieldMapping, SourceType};
///
/// let mappings = FieldMappingSet::build(
///     vec![
///         FieldMapping::new("ID No.", "id_card_number", DataType::Text { max_len: Some(18) }),
///         FieldMapping::new("Period", "pay_period_identifier", DataType::Text { max_len: None }),
///         FieldMapping::new("Name", "employee_name", DataType::Text { max_len: None }),
///     ],
///     Vec::new(),
/// )
/// .unwrap();
/// let ingestor = Ingestor::new(
///     Arc::new(FieldMappingCatalog::new(mappings)),
///     EmployeeMatcher::new(Arc::new(InMemoryEmployeeDirectory::default())),
///     Arc::new(StagingStore::new()),
///     IngestionSettings::default(),
/// );
///
/// let csv = "ID No.,Period,Name\n110101199001011234,2024-03,Li Wei\nshort,2024-03,Wang Fang\n";
/// let report = ingestor
///     .ingest(SourceType::HousingFund, "hf.csv", csv.as_bytes())
///     .unwrap();
/// assert_eq!(report.total_rows, 2);
/// assert_eq!(report.valid, 1);
/// assert_eq!(report.unmatched, 1);
/// assert_eq!(report.invalid, 1);
/// ```
pub struct Ingestor {
    catalog: Arc<FieldMappingCatalog>,
    matcher: EmployeeMatcher,
    store: Arc<StagingStore>,
    settings: IngestionSettings,
}

impl Ingestor {
    /// Creates an ingestor.
    pub fn new(
        catalog: Arc<FieldMappingCatalog>,
        matcher: EmployeeMatcher,
        store: Arc<StagingStore>,
        settings: IngestionSettings,
    ) -> Self {
        Self {
            catalog,
            matcher,
            store,
            settings,
        }
    }

    /// The store records are written to.
    pub fn store(&self) -> &Arc<StagingStore> {
        &self.store
    }

    /// Ingests a CSV source file.
    pub fn ingest<R: Read>(
        &self,
        source_type: SourceType,
        filename: &str,
        reader: R,
    ) -> PayrollResult<IngestReport> {
        let rows = parse_csv(filename, reader)?;
        Ok(self.ingest_rows(source_type, filename, rows))
    }

    /// Ingests rows that have already been split into cells.
    ///
    /// Each row is resolved, checked, coerced and stamped independently;
    /// rows that pass are matched to employees. The batch is then appended
    /// to the store in one step.
    pub fn ingest_rows(&self, source_type: SourceType, filename: &str, rows: Vec<RawRow>) -> IngestReport {
        let mappings = self.catalog.snapshot();
        let batch_id = Uuid::new_v4();
        let imported_at = Utc::now();

        let records: Vec<StagingRecord> = rows
            .iter()
            .map(|row| {
                let mut record =
                    build_record(&mappings, row, source_type, filename, batch_id, imported_at);
                self.matcher.apply(&mut record);
                record
            })
            .collect();

        let batch = ImportBatch {
            id: batch_id,
            source_type,
            source_filename: filename.to_string(),
            file_hash: file_hash(records.iter().map(|record| record.content_hash.as_str())),
            imported_at,
            row_count: 0,
        };

        match self.store.append_batch(batch, records.clone()) {
            AppendOutcome::DuplicateFile { batch_id } => {
                info!(
                    batch_id = %batch_id,
                    filename,
                    "Identical file already ingested, nothing stored"
                );
                IngestReport {
                    batch_id,
                    duplicate: true,
                    total_rows: rows.len(),
                    valid: 0,
                    invalid: 0,
                    matched: 0,
                    unmatched: 0,
                    skipped_duplicates: rows.len(),
                    errors: Vec::new(),
                }
            }
            AppendOutcome::Stored {
                batch_id,
                skipped_rows,
            } => {
                let stored: Vec<&StagingRecord> = records
                    .iter()
                    .filter(|record| !skipped_rows.contains(&record.row_number))
                    .collect();
                let report = self.summarize(batch_id, rows.len(), &stored, skipped_rows.len());
                info!(
                    batch_id = %batch_id,
                    source_type = %source_type,
                    filename,
                    total = report.total_rows,
                    valid = report.valid,
                    invalid = report.invalid,
                    matched = report.matched,
                    unmatched = report.unmatched,
                    skipped = report.skipped_duplicates,
                    "Ingested source file"
                );
                if report.invalid > 0 {
                    warn!(batch_id = %batch_id, invalid = report.invalid, "Rows failed validation");
                }
                report
            }
        }
    }

    /// Re-runs matching for the unmatched records of a batch, for use after
    /// the employee master changes.
    pub fn rematch(&self, batch_id: Uuid) -> PayrollResult<RematchReport> {
        if self.store.batch(batch_id).is_none() {
            return Err(PayrollError::BatchNotFound { batch_id });
        }

        let mut newly_matched = 0;
        let mut still_unmatched = 0;
        self.store.update_batch(batch_id, |record| {
            if record.validation_status != ValidationStatus::Unmatched {
                return;
            }
            match self.matcher.apply(record) {
                ValidationStatus::Matched => newly_matched += 1,
                _ => still_unmatched += 1,
            }
        });

        info!(batch_id = %batch_id, newly_matched, still_unmatched, "Rematched batch");
        Ok(RematchReport {
            batch_id,
            newly_matched,
            still_unmatched,
        })
    }

    fn summarize(
        &self,
        batch_id: Uuid,
        total_rows: usize,
        stored: &[&StagingRecord],
        skipped_duplicates: usize,
    ) -> IngestReport {
        let count = |status| {
            stored
                .iter()
                .filter(|record| record.validation_status == status)
                .count()
        };
        let matched = count(ValidationStatus::Matched);
        let unmatched = count(ValidationStatus::Unmatched);
        let invalid = count(ValidationStatus::Invalid);
        let errors = stored
            .iter()
            .flat_map(|record| {
                record.validation_errors.iter().map(|issue| RowError {
                    row_number: record.row_number,
                    field: issue.field.clone(),
                    code: issue.code.clone(),
                    reason: issue.reason.clone(),
                })
            })
            .take(self.settings.max_error_details)
            .collect();

        IngestReport {
            batch_id,
            duplicate: false,
            total_rows,
            valid: stored.len() - invalid,
            invalid,
            matched,
            unmatched,
            skipped_duplicates,
            errors,
        }
    }
}

fn build_record(
    mappings: &FieldMappingSet,
    row: &RawRow,
    source_type: SourceType,
    filename: &str,
    batch_id: Uuid,
    imported_at: DateTime<Utc>,
) -> StagingRecord {
    let mut record = StagingRecord {
        id: Uuid::new_v4(),
        source_type,
        id_card_number: String::new(),
        pay_period_identifier: String::new(),
        employee_name: String::new(),
        contribution_base_salary: None,
        contribution_base: None,
        employer_rate: None,
        employer_contribution: None,
        employee_rate: None,
        employee_contribution: None,
        taxable_income: None,
        income_tax: None,
        extra: Default::default(),
        source_filename: filename.to_string(),
        row_number: row.row_number,
        content_hash: row.content_hash(),
        import_timestamp: imported_at,
        import_batch_id: batch_id,
        validation_status: ValidationStatus::Pending,
        validation_errors: Vec::new(),
        employee_id: None,
    };

    if let Some(read_error) = &row.read_error {
        let error = PayrollError::ValidationError {
            field: read_error.field.clone(),
            message: format!("row {}: {}", row.row_number, read_error.message),
        };
        record
            .validation_errors
            .push(ValidationIssue::from_error(read_error.field.as_str(), &error));
    }

    let mut mapped: Vec<(&FieldMapping, &str)> = Vec::new();
    for (label, value) in &row.cells {
        match mappings.resolve(label) {
            Ok(ResolvedField::Mapped(mapping)) => mapped.push((mapping, value.as_str())),
            Ok(ResolvedField::Ignored) => {}
            Err(error) => record
                .validation_errors
                .push(ValidationIssue::from_error(label.trim(), &error)),
        }
    }

    let raw_key = |target: &str| {
        mapped
            .iter()
            .find(|(mapping, _)| mapping.target_name == target)
            .map(|(_, value)| value.trim())
            .unwrap_or_default()
    };
    record.id_card_number = raw_key("id_card_number").to_uppercase();
    record.pay_period_identifier = raw_key("pay_period_identifier").to_string();
    record.employee_name = raw_key("employee_name").to_string();
    let structural = structural_issues(&record);
    record.validation_errors.extend(structural);

    for (mapping, value) in &mapped {
        if is_key_field(&mapping.target_name) {
            continue;
        }
        let target = mapping.target_name.as_str();
        let result = coerce_value(target, value, mapping.data_type)
            .and_then(|coerced| assign(&mut record, target, coerced));
        if let Err(error) = result {
            record
                .validation_errors
                .push(ValidationIssue::from_error(target, &error));
        }
    }

    record.validation_status = if record.validation_errors.is_empty() {
        ValidationStatus::Valid
    } else {
        ValidationStatus::Invalid
    };
    record
}

fn is_key_field(target: &str) -> bool {
    matches!(
        target,
        "id_card_number" | "pay_period_identifier" | "employee_name"
    )
}

fn structural_issues(record: &StagingRecord) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut reject = |field: &str, message: String| {
        let error = PayrollError::ValidationError {
            field: field.to_string(),
            message,
        };
        issues.push(ValidationIssue::from_error(field, &error));
    };

    let id_length = record.id_card_number.chars().count();
    if id_length != ID_CARD_LENGTH {
        reject(
            "id_card_number",
            format!("expected {ID_CARD_LENGTH} characters, found {id_length}"),
        );
    }
    if record.pay_period_identifier.is_empty() {
        reject("pay_period_identifier", "is required".to_string());
    } else if record.pay_period_identifier.parse::<PayPeriod>().is_err() {
        reject(
            "pay_period_identifier",
            format!("'{}' is not a pay period", record.pay_period_identifier),
        );
    }
    if record.employee_name.is_empty() {
        reject("employee_name", "is required".to_string());
    }
    issues
}

fn assign(record: &mut StagingRecord, target: &str, value: Option<FieldValue>) -> PayrollResult<()> {
    let slot = match target {
        "contribution_base_salary" => &mut record.contribution_base_salary,
        "contribution_base" => &mut record.contribution_base,
        "employer_rate" => &mut record.employer_rate,
        "employer_contribution" => &mut record.employer_contribution,
        "employee_rate" => &mut record.employee_rate,
        "employee_contribution" => &mut record.employee_contribution,
        "taxable_income" => &mut record.taxable_income,
        "income_tax" => &mut record.income_tax,
        _ => {
            if let Some(value) = value {
                record.extra.insert(target.to_string(), value);
            }
            return Ok(());
        }
    };

    *slot = match value {
        None => None,
        Some(FieldValue::Decimal(amount)) => Some(amount),
        Some(other) => {
            return Err(PayrollError::ValidationError {
                field: target.to_string(),
                message: format!("expected a decimal, found {other:?}"),
            });
        }
    };
    Ok(())
}
