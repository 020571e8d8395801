//! Append-only staging store.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use uuid::Uuid;

use crate::models::{ImportBatch, PayPeriod, SourceType, StagingRecord, ValidationStatus};

type RowKey = (SourceType, String, usize, String);
type FileKey = (SourceType, String, String);

/// The outcome of appending a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The batch was stored.
    Stored {
        /// The new batch.
        batch_id: Uuid,
        /// Row numbers skipped because their idempotency key was already stored.
        skipped_rows: Vec<usize>,
    },
    /// An identical file was already ingested; nothing was stored.
    DuplicateFile {
        /// The earlier batch.
        batch_id: Uuid,
    },
}

#[derive(Debug, Default)]
struct StoreInner {
    records: Vec<StagingRecord>,
    batches: HashMap<Uuid, ImportBatch>,
    row_keys: HashSet<RowKey>,
    file_keys: HashMap<FileKey, Uuid>,
}

/// Staging records and import batches.
///
/// Records are only ever appended. A batch is appended atomically together
/// with its idempotency checks, so concurrent ingestions of the same file
/// store it once.
#[derive(Debug, Default)]
pub struct StagingStore {
    inner: RwLock<StoreInner>,
}

impl StagingStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a batch and its records.
    ///
    /// If a batch with the same source type, filename and file hash exists,
    /// nothing is stored. Otherwise records whose (source type, filename, row
    /// number, content hash) key is already stored are skipped, the rest are appended, and the
    /// batch's row count is set to the number appended.
    pub fn append_batch(&self, mut batch: ImportBatch, records: Vec<StagingRecord>) -> AppendOutcome {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        let file_key = (
            batch.source_type,
            batch.source_filename.clone(),
            batch.file_hash.clone(),
        );
        if let Some(&batch_id) = inner.file_keys.get(&file_key) {
            return AppendOutcome::DuplicateFile { batch_id };
        }

        let mut skipped_rows = Vec::new();
        let mut appended = 0;
        for record in records {
            let key = (
                record.source_type,
                record.source_filename.clone(),
                record.row_number,
                record.content_hash.clone(),
            );
            if !inner.row_keys.insert(key) {
                skipped_rows.push(record.row_number);
                continue;
            }
            inner.records.push(record);
            appended += 1;
        }

        let batch_id = batch.id;
        batch.row_count = appended;
        inner.file_keys.insert(file_key, batch_id);
        inner.batches.insert(batch_id, batch);
        AppendOutcome::Stored {
            batch_id,
            skipped_rows,
        }
    }

    /// Looks up a batch.
    pub fn batch(&self, batch_id: Uuid) -> Option<ImportBatch> {
        self.read().batches.get(&batch_id).cloned()
    }

    /// The records of a batch, in row order.
    pub fn records_for_batch(&self, batch_id: Uuid) -> Vec<StagingRecord> {
        self.read()
            .records
            .iter()
            .filter(|record| record.import_batch_id == batch_id)
            .cloned()
            .collect()
    }

    /// Applies `update` to every record of a batch under one write lock.
    pub fn update_batch(&self, batch_id: Uuid, mut update: impl FnMut(&mut StagingRecord)) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner
            .records
            .iter_mut()
            .filter(|record| record.import_batch_id == batch_id)
            .for_each(|record| update(record));
    }

    /// The most recently imported matched record for an employee, period
    /// and source domain.
    pub fn latest_matched(
        &self,
        employee_id: &str,
        period: &PayPeriod,
        source_type: SourceType,
    ) -> Option<StagingRecord> {
        self.read()
            .records
            .iter()
            .rev()
            .find(|record| {
                record.validation_status == ValidationStatus::Matched
                    && record.source_type == source_type
                    && record.employee_id.as_deref() == Some(employee_id)
                    && record
                        .pay_period_identifier
                        .parse::<PayPeriod>()
                        .is_ok_and(|record_period| record_period == *period)
            })
            .cloned()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    /// True if no records are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::collections::BTreeMap;

    fn batch(filename: &str, file_hash: &str) -> ImportBatch {
        batch_of(SourceType::HousingFund, filename, file_hash)
    }

    fn batch_of(source_type: SourceType, filename: &str, file_hash: &str) -> ImportBatch {
        ImportBatch {
            id: Uuid::new_v4(),
            source_type,
            source_filename: filename.to_string(),
            file_hash: file_hash.to_string(),
            imported_at: Utc::now(),
            row_count: 0,
        }
    }

    fn record(batch: &ImportBatch, row_number: usize, hash: &str, base: i64) -> StagingRecord {
        StagingRecord {
            id: Uuid::new_v4(),
            source_type: batch.source_type,
            id_card_number: "110101199001011234".to_string(),
            pay_period_identifier: "2024-03".to_string(),
            employee_name: "Li Wei".to_string(),
            contribution_base_salary: None,
            contribution_base: Some(Decimal::new(base, 0)),
            employer_rate: None,
            employer_contribution: None,
            employee_rate: None,
            employee_contribution: None,
            taxable_income: None,
            income_tax: None,
            extra: BTreeMap::new(),
            source_filename: batch.source_filename.clone(),
            row_number,
            content_hash: hash.to_string(),
            import_timestamp: batch.imported_at,
            import_batch_id: batch.id,
            validation_status: ValidationStatus::Matched,
            validation_errors: vec![],
            employee_id: Some("emp_001".to_string()),
        }
    }

    #[test]
    fn test_identical_file_is_stored_once() {
        let store = StagingStore::new();
        let first = batch("hf.csv", "abc");
        let first_id = first.id;
        let records = vec![record(&first, 1, "r1", 8000)];
        assert!(matches!(
            store.append_batch(first, records),
            AppendOutcome::Stored { .. }
        ));

        let second = batch("hf.csv", "abc");
        let records = vec![record(&second, 1, "r1", 8000)];
        assert_eq!(
            store.append_batch(second, records),
            AppendOutcome::DuplicateFile { batch_id: first_id }
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_same_file_under_another_source_type_is_a_new_batch() {
        let store = StagingStore::new();
        let annuity = batch_of(SourceType::Annuity, "upload.csv", "abc");
        let annuity_id = annuity.id;
        let records = vec![record(&annuity, 1, "r1", 8000)];
        store.append_batch(annuity, records);

        let housing = batch_of(SourceType::HousingFund, "upload.csv", "abc");
        let housing_id = housing.id;
        let records = vec![record(&housing, 1, "r1", 8000)];
        match store.append_batch(housing, records) {
            AppendOutcome::Stored {
                batch_id,
                skipped_rows,
            } => {
                assert_eq!(batch_id, housing_id);
                assert_ne!(batch_id, annuity_id);
                assert!(skipped_rows.is_empty());
            }
            other => panic!("Expected Stored, got {:?}", other),
        }
        assert_eq!(store.len(), 2);

        let period = "2024-03".parse().unwrap();
        assert!(store
            .latest_matched("emp_001", &period, SourceType::HousingFund)
            .is_some());
    }

    #[test]
    fn test_known_rows_are_skipped_new_rows_appended() {
        let store = StagingStore::new();
        let first = batch("hf.csv", "v1");
        let records = vec![record(&first, 1, "r1", 8000)];
        store.append_batch(first, records);

        let second = batch("hf.csv", "v2");
        let second_id = second.id;
        let records = vec![record(&second, 1, "r1", 8000), record(&second, 2, "r2", 9000)];
        match store.append_batch(second, records) {
            AppendOutcome::Stored {
                batch_id,
                skipped_rows,
            } => {
                assert_eq!(batch_id, second_id);
                assert_eq!(skipped_rows, vec![1]);
            }
            other => panic!("Expected Stored, got {:?}", other),
        }
        assert_eq!(store.batch(second_id).unwrap().row_count, 1);
        assert_eq!(store.records_for_batch(second_id).len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_latest_matched_prefers_latest_import() {
        let store = StagingStore::new();
        let first = batch("hf.csv", "v1");
        let records = vec![record(&first, 1, "r1", 8000)];
        store.append_batch(first, records);
        let second = batch("hf-correction.csv", "v2");
        let records = vec![record(&second, 1, "r1", 8500)];
        store.append_batch(second, records);

        let period = "2024-03".parse().unwrap();
        let latest = store
            .latest_matched("emp_001", &period, SourceType::HousingFund)
            .unwrap();
        assert_eq!(latest.contribution_base, Some(Decimal::new(8500, 0)));

        assert!(store
            .latest_matched("emp_001", &period, SourceType::Annuity)
            .is_none());
        assert!(store
            .latest_matched("emp_001", &"2024-04".parse().unwrap(), SourceType::HousingFund)
            .is_none());
    }

    #[test]
    fn test_update_batch_touches_only_that_batch() {
        let store = StagingStore::new();
        let first = batch("a.csv", "1");
        let first_id = first.id;
        let records = vec![record(&first, 1, "r1", 1)];
        store.append_batch(first, records);
        let second = batch("b.csv", "2");
        let records = vec![record(&second, 1, "r1", 2)];
        store.append_batch(second, records);

        store.update_batch(first_id, |record| {
            record.validation_status = ValidationStatus::Unmatched
        });

        let period = "2024-03".parse().unwrap();
        let latest = store
            .latest_matched("emp_001", &period, SourceType::HousingFund)
            .unwrap();
        assert_eq!(latest.contribution_base, Some(Decimal::new(2, 0)));
        assert_eq!(
            store.records_for_batch(first_id)[0].validation_status,
            ValidationStatus::Unmatched
        );
    }
}
