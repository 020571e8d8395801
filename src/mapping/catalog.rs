//! Shared, refreshable mapping table.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use crate::error::PayrollResult;
use crate::models::FieldMapping;

use super::FieldMappingSet;

/// Holds the current mapping table and hands out immutable snapshots.
///
/// Each ingestion takes one snapshot at its start and resolves every row
/// against it, so administrative edits never change mappings mid-file.
#[derive(Debug, Default)]
pub struct FieldMappingCatalog {
    current: RwLock<Arc<FieldMappingSet>>,
}

impl FieldMappingCatalog {
    /// Wraps an initial mapping table.
    pub fn new(set: FieldMappingSet) -> Self {
        Self {
            current: RwLock::new(Arc::new(set)),
        }
    }

    /// Returns the current mapping table.
    pub fn snapshot(&self) -> Arc<FieldMappingSet> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Adds a mapping, publishing a new table for later snapshots.
    pub fn insert(&self, mapping: FieldMapping) -> PayrollResult<()> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = FieldMappingSet::clone(&current);
        let target = mapping.target_name.clone();
        next.insert(mapping)?;
        *current = Arc::new(next);
        info!(target_name = %target, mappings = current.len(), "Field mapping added");
        Ok(())
    }
}
