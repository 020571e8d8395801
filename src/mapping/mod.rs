//! Field mapping resolution.
//!
//! Translates raw source column labels into canonical field names and their
//! semantic types. Lookups are pure and run against an in-memory snapshot
//! taken when an ingestion starts.

mod catalog;
mod resolver;

pub use catalog::FieldMappingCatalog;
pub use resolver::{FieldMappingSet, ResolvedField};
