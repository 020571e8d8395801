//! Field mapping model.
//!
//! A [`FieldMapping`] ties a raw source column label to a canonical field
//! and the semantic type its values are coerced to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The semantic type of a canonical field.
///
/// Parsed from the SQL-style descriptors used in mapping tables:
///
/// ```
/// use payroll_engine::models::DataType;
///
/// assert_eq!("NUMERIC(15,2)".parse::<DataType>().unwrap(),
///            DataType::Decimal { precision: 15, scale: 2 });
/// assert_eq!("varchar(18)".parse::<DataType>().unwrap(),
///            DataType::Text { max_len: Some(18) });
/// assert_eq!("DATE".parse::<DataType>().unwrap(), DataType::Date);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DataType {
    /// Free text with an optional maximum length in characters.
    Text {
        /// Maximum number of characters, if bounded.
        max_len: Option<usize>,
    },
    /// A calendar date.
    Date,
    /// A fixed-point decimal.
    Decimal {
        /// Total number of significant digits.
        precision: u32,
        /// Number of fractional digits.
        scale: u32,
    },
}

/// Error returned when a type descriptor cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidDataType(pub String);

impl fmt::Display for InvalidDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown data type descriptor '{}'", self.0)
    }
}

impl std::error::Error for InvalidDataType {}

impl FromStr for DataType {
    type Err = InvalidDataType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        let invalid = || InvalidDataType(s.trim().to_string());

        let (name, args) = match normalized.split_once('(') {
            Some((name, rest)) => {
                let args = rest.strip_suffix(')').ok_or_else(invalid)?;
                (name.trim(), Some(args))
            }
            None => (normalized.as_str(), None),
        };

        match (name, args) {
            ("TEXT", None) | ("VARCHAR", None) => Ok(DataType::Text { max_len: None }),
            ("VARCHAR", Some(len)) | ("CHAR", Some(len)) => {
                let max_len = len.trim().parse().map_err(|_| invalid())?;
                Ok(DataType::Text {
                    max_len: Some(max_len),
                })
            }
            ("DATE", None) => Ok(DataType::Date),
            ("NUMERIC", Some(args)) | ("DECIMAL", Some(args)) => {
                let (precision, scale) = args.split_once(',').ok_or_else(invalid)?;
                let precision: u32 = precision.trim().parse().map_err(|_| invalid())?;
                let scale: u32 = scale.trim().parse().map_err(|_| invalid())?;
                if scale > precision || precision > 28 {
                    return Err(invalid());
                }
                Ok(DataType::Decimal { precision, scale })
            }
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for DataType {
    type Error = InvalidDataType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DataType> for String {
    fn from(value: DataType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Text { max_len: None } => write!(f, "TEXT"),
            DataType::Text { max_len: Some(len) } => write!(f, "VARCHAR({len})"),
            DataType::Date => write!(f, "DATE"),
            DataType::Decimal { precision, scale } => write!(f, "NUMERIC({precision},{scale})"),
        }
    }
}

/// Maps one raw source column onto a canonical field.
///
/// Identity is an opaque generated key; `target_name` is unique across all
/// mappings. Several raw labels reach the same target through `aliases`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Opaque generated identifier.
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// The raw column label as it appears in source files.
    pub source_name: String,
    /// Further raw labels that resolve to the same target.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// The canonical field name.
    pub target_name: String,
    /// The semantic type values are coerced to.
    pub data_type: DataType,
    /// Whether the field feeds further derivation.
    #[serde(default)]
    pub is_intermediate: bool,
    /// Whether the field is a terminal output field.
    #[serde(default)]
    pub is_final: bool,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
}

impl FieldMapping {
    /// Creates a mapping with a fresh identifier and no flags set.
    pub fn new(
        source_name: impl Into<String>,
        target_name: impl Into<String>,
        data_type: DataType,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_name: source_name.into(),
            aliases: Vec::new(),
            target_name: target_name.into(),
            data_type,
            is_intermediate: false,
            is_final: false,
            description: String::new(),
        }
    }

    /// Adds a further raw label for the same target.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// The primary source label followed by its aliases.
    pub fn source_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.source_name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}
