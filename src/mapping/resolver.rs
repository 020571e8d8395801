//! Field mapping lookup.
//!
//! [`FieldMappingSet`] is an immutable-after-build index over the mapping
//! table: exact lookup by raw column label, uniqueness of canonical targets,
//! and the set of columns that are skipped without error.

use std::collections::{HashMap, HashSet};

use crate::error::{PayrollError, PayrollResult};
use crate::models::FieldMapping;

/// The outcome of resolving a raw column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResolvedField<'a> {
    /// The column maps onto a canonical field.
    Mapped(&'a FieldMapping),
    /// The column is configured as ignorable.
    Ignored,
}

/// An indexed set of field mappings.
///
/// # Example
///
/// ```
/// use payroll_engine::mapping::{FieldMappingSet, ResolvedField};
/// use payroll_engine::models::{DataType, FieldMapping};
///
/// let mut set = FieldMappingSet::default();
/// set.insert(FieldMapping::new("ID No.", "id_card_number", DataType::Text { max_len: Some(18) }))
///     .unwrap();
/// set.ignore_column("Seq");
///
/// match set.resolve("ID No.").unwrap() {
///     ResolvedField::Mapped(mapping) => assert_eq!(mapping.target_name, "id_card_number"),
///     ResolvedField::Ignored => unreachable!(),
/// }
/// assert_eq!(set.resolve("Seq").unwrap(), ResolvedField::Ignored);
/// assert!(set.resolve("Bonus").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct FieldMappingSet {
    mappings: Vec<FieldMapping>,
    by_source: HashMap<String, usize>,
    by_target: HashMap<String, usize>,
    ignored: HashSet<String>,
}

impl FieldMappingSet {
    /// Builds a set from configured mappings and ignorable columns.
    ///
    /// Fails on the first mapping that violates target uniqueness or maps
    /// an already-mapped source column to a different target.
    pub fn build(
        mappings: impl IntoIterator<Item = FieldMapping>,
        ignored_columns: impl IntoIterator<Item = String>,
    ) -> PayrollResult<Self> {
        let mut set = Self::default();
        for mapping in mappings {
            set.insert(mapping)?;
        }
        for column in ignored_columns {
            set.ignore_column(column);
        }
        Ok(set)
    }

    /// Adds a mapping.
    ///
    /// Several source labels may share one target through aliases, but a
    /// target appears at most once in the table and a source label resolves
    /// to exactly one target.
    pub fn insert(&mut self, mapping: FieldMapping) -> PayrollResult<()> {
        if self.by_target.contains_key(&mapping.target_name) {
            return Err(PayrollError::DuplicateTargetField {
                target_name: mapping.target_name,
            });
        }
        for source in mapping.source_names() {
            if let Some(&existing) = self.by_source.get(source) {
                return Err(PayrollError::ValidationError {
                    field: source.to_string(),
                    message: format!(
                        "source column already maps to '{}'",
                        self.mappings[existing].target_name
                    ),
                });
            }
        }

        let index = self.mappings.len();
        for source in mapping.source_names() {
            self.by_source.insert(source.to_string(), index);
        }
        self.by_target.insert(mapping.target_name.clone(), index);
        self.mappings.push(mapping);
        Ok(())
    }

    /// Marks a raw column as skippable.
    pub fn ignore_column(&mut self, column: impl Into<String>) {
        self.ignored.insert(column.into());
    }

    /// Resolves a raw column label.
    ///
    /// Lookup is exact apart from surrounding whitespace, which spreadsheet
    /// exports routinely leave on header cells.
    pub fn resolve(&self, source_name: &str) -> PayrollResult<ResolvedField<'_>> {
        let key = source_name.trim();
        if let Some(&index) = self.by_source.get(key) {
            return Ok(ResolvedField::Mapped(&self.mappings[index]));
        }
        if self.ignored.contains(key) {
            return Ok(ResolvedField::Ignored);
        }
        Err(PayrollError::UnmappedField {
            column: key.to_string(),
        })
    }

    /// Looks up the mapping for a canonical field.
    pub fn by_target(&self, target_name: &str) -> Option<&FieldMapping> {
        self.by_target
            .get(target_name)
            .map(|&index| &self.mappings[index])
    }

    /// Number of mappings.
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// True if there are no mappings.
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}
