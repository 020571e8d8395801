//! Staging ingestion pipeline.
//!
//! Raw source files are parsed, each column resolved through a field
//! mapping snapshot, each row checked and coerced, and valid rows matched to
//! employees before the batch is appended to the [`StagingStore`].

mod coerce;
mod parser;
mod pipeline;
mod store;

pub use coerce::coerce_value;
pub use parser::{RawRow, RowReadError, file_hash, parse_csv};
pub use pipeline::{ID_CARD_LENGTH, IngestReport, Ingestor, RematchReport, RowError};
pub use store::{AppendOutcome, StagingStore};
