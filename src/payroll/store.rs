//! In-memory run and entry storage.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockWriteGuard};

use uuid::Uuid;

use crate::error::{PayrollError, PayrollResult};
use crate::models::{PayrollEntry, PayrollRun};

/// A run together with the entries it owns.
#[derive(Debug, Clone)]
pub struct RunRecord {
    /// The run.
    pub run: PayrollRun,
    /// Entries of the last completed calculation.
    pub entries: Vec<PayrollEntry>,
}

/// Runs keyed by id.
#[derive(Debug, Default)]
pub struct RunStore {
    runs: RwLock<HashMap<Uuid, RunRecord>>,
}

impl RunStore {
    /// Inserts a new run with no entries.
    pub fn insert(&self, run: PayrollRun) {
        self.write().insert(
            run.id,
            RunRecord {
                run,
                entries: Vec::new(),
            },
        );
    }

    /// Reads a run and its entries through `read`.
    pub fn with_record<T>(
        &self,
        run_id: Uuid,
        read: impl FnOnce(&RunRecord) -> T,
    ) -> PayrollResult<T> {
        let runs = self.runs.read().unwrap_or_else(PoisonError::into_inner);
        runs.get(&run_id)
            .map(read)
            .ok_or(PayrollError::RunNotFound { run_id })
    }

    /// Updates a run and its entries through `update` under the write lock.
    pub fn update<T>(
        &self,
        run_id: Uuid,
        update: impl FnOnce(&mut RunRecord) -> PayrollResult<T>,
    ) -> PayrollResult<T> {
        let mut runs = self.write();
        let record = runs
            .get_mut(&run_id)
            .ok_or(PayrollError::RunNotFound { run_id })?;
        update(record)
    }

    /// All runs, oldest first.
    pub fn runs(&self) -> Vec<PayrollRun> {
        let runs = self.runs.read().unwrap_or_else(PoisonError::into_inner);
        let mut all: Vec<PayrollRun> = runs.values().map(|record| record.run.clone()).collect();
        all.sort_by_key(|run| (run.created_at, run.id));
        all
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, RunRecord>> {
        self.runs.write().unwrap_or_else(PoisonError::into_inner)
    }
}
