//! CSV source parsing.

use std::io::Read;

use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::{PayrollError, PayrollResult};

/// One raw source row: header labels paired with the row's cell text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// 1-based position among the data rows of the file.
    pub row_number: usize,
    /// `(column label, cell text)` pairs in column order.
    pub cells: Vec<(String, String)>,
    /// Set when the row could not be read as text. Such a row is staged as
    /// invalid; its cells hold whatever could be recovered.
    pub read_error: Option<RowReadError>,
}

/// Why a source row could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowReadError {
    /// The column concerned, or `row` when the whole record was unreadable.
    pub field: String,
    /// What went wrong.
    pub message: String,
}

impl RawRow {
    /// Creates a row from label/value pairs.
    pub fn new<L, V>(row_number: usize, cells: impl IntoIterator<Item = (L, V)>) -> Self
    where
        L: Into<String>,
        V: Into<String>,
    {
        Self {
            row_number,
            cells: cells
                .into_iter()
                .map(|(label, value)| (label.into(), value.into()))
                .collect(),
            read_error: None,
        }
    }

    /// Marks the row as unreadable.
    pub fn with_read_error(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.read_error = Some(RowReadError {
            field: field.into(),
            message: message.into(),
        });
        self
    }

    /// SHA-256 hex digest of the row content.
    ///
    /// Labels and values are separated with ASCII unit and record
    /// separators so that shifting text between cells changes the digest.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for (label, value) in &self.cells {
            hasher.update(label.as_bytes());
            hasher.update([0x1f]);
            hasher.update(value.as_bytes());
            hasher.update([0x1e]);
        }
        hex::encode(hasher.finalize())
    }
}

/// SHA-256 hex digest over a sequence of row hashes.
pub fn file_hash<'a>(row_hashes: impl IntoIterator<Item = &'a str>) -> String {
    let mut hasher = Sha256::new();
    for row_hash in row_hashes {
        hasher.update(row_hash.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

/// Parses a CSV document with a header row into raw rows.
///
/// Cells are trimmed. Rows with more cells than the header carry the
/// surplus under positional labels (`column_7`), which then fail to
/// resolve; rows with fewer cells simply lack the trailing columns.
///
/// Only an unreadable header fails the whole document. A data row with a
/// cell that is not valid UTF-8 comes back flagged through
/// [`RawRow::read_error`] with its text decoded lossily. A record the
/// reader itself rejects is returned as an empty flagged row and ends the
/// document.
pub fn parse_csv<R: Read>(filename: &str, reader: R) -> PayrollResult<Vec<RawRow>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers: Vec<String> = csv_reader
        .headers()
        .map_err(|error| PayrollError::CsvParse {
            filename: filename.to_string(),
            message: error.to_string(),
        })?
        .iter()
        .map(|header| header.trim_start_matches('\u{feff}').to_string())
        .collect();
    let label = |column: usize| {
        headers
            .get(column)
            .cloned()
            .unwrap_or_else(|| format!("column_{}", column + 1))
    };

    let mut rows = Vec::new();
    for (index, record) in csv_reader.byte_records().enumerate() {
        let row_number = index + 1;
        let record = match record {
            Ok(record) => record,
            Err(error) => {
                warn!(filename, row_number, %error, "Unreadable CSV record, stopping");
                let unreadable = RawRow::new(row_number, Vec::<(String, String)>::new())
                    .with_read_error("row", error.to_string());
                rows.push(unreadable);
                break;
            }
        };

        let mut undecodable = None;
        let cells: Vec<(String, String)> = record
            .iter()
            .enumerate()
            .map(|(column, bytes)| {
                let value = match std::str::from_utf8(bytes) {
                    Ok(text) => text.to_string(),
                    Err(_) => {
                        if undecodable.is_none() {
                            undecodable = Some(column);
                        }
                        String::from_utf8_lossy(bytes).into_owned()
                    }
                };
                (label(column), value)
            })
            .collect();

        let row = RawRow::new(row_number, cells);
        rows.push(match undecodable {
            Some(column) => row.with_read_error(label(column), "cell is not valid UTF-8"),
            None => row,
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv_rows() {
        let csv = "ID No.,Name,Base\n110101199001011234, Li Wei ,8000\n310101198505059990,Wang Fang,9000\n";
        let rows = parse_csv("hf.csv", csv.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row_number, 1);
        assert_eq!(rows[1].row_number, 2);
        assert_eq!(rows[0].cells[1], ("Name".to_string(), "Li Wei".to_string()));
    }

    #[test]
    fn test_surplus_cells_get_positional_labels() {
        let csv = "A,B\n1,2,3\n4\n";
        let rows = parse_csv("x.csv", csv.as_bytes()).unwrap();

        assert_eq!(rows[0].cells[2].0, "column_3");
        assert_eq!(rows[1].cells.len(), 1);
    }

    #[test]
    fn test_byte_order_mark_is_stripped() {
        let csv = "\u{feff}ID No.,Name\n1,2\n";
        let rows = parse_csv("x.csv", csv.as_bytes()).unwrap();
        assert_eq!(rows[0].cells[0].0, "ID No.");
    }

    #[test]
    fn test_invalid_utf8_header_is_a_parse_error() {
        let bytes: &[u8] = b"A,\xff\xfe\n1,2\n";
        match parse_csv("bad.csv", bytes).unwrap_err() {
            PayrollError::CsvParse { filename, .. } => assert_eq!(filename, "bad.csv"),
            other => panic!("Expected CsvParse, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_utf8_cell_flags_only_its_row() {
        let bytes: &[u8] = b"A,B\n1,ok\n2,\xff\xfe\n3,fine\n";
        let rows = parse_csv("bad.csv", bytes).unwrap();

        assert_eq!(rows.len(), 3);
        assert!(rows[0].read_error.is_none());
        assert!(rows[2].read_error.is_none());
        match &rows[1].read_error {
            Some(error) => assert_eq!(error.field, "B"),
            None => panic!("Expected row 2 to be flagged, got {:?}", rows[1]),
        }
        assert_eq!(rows[1].cells[0], ("A".to_string(), "2".to_string()));
    }

    #[test]
    fn test_content_hash_depends_on_cell_boundaries() {
        let a = RawRow::new(1, [("Name", "Li Wei"), ("Base", "8000")]);
        let b = RawRow::new(1, [("Name", "Li Wei8"), ("Base", "000")]);
        let same = RawRow::new(7, [("Name", "Li Wei"), ("Base", "8000")]);

        assert_ne!(a.content_hash(), b.content_hash());
        assert_eq!(a.content_hash(), same.content_hash());
        assert_eq!(a.content_hash().len(), 64);
    }

    #[test]
    fn test_file_hash_is_order_sensitive() {
        assert_ne!(file_hash(["a", "b"]), file_hash(["b", "a"]));
        assert_eq!(file_hash(["a", "b"]), file_hash(["a", "b"]));
    }
}
