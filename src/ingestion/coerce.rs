//! Coercion of raw cell text into typed values.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::{PayrollError, PayrollResult};
use crate::models::{DataType, FieldValue};

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

/// Coerces a raw cell into the mapped type.
///
/// Blank cells coerce to `None`. Decimals may carry thousands separators;
/// a decimal is rejected when it cannot be represented in the declared
/// precision and scale without losing digits, and is otherwise returned at
/// the declared scale.
///
/// # Examples
///
/// ```
/// use payroll_engine::ingestion::coerce_value;
/// use payroll_engine::models::{DataType, FieldValue};
/// use rust_decimal::Decimal;
///
/// let amount = DataType::Decimal { precision: 15, scale: 2 };
/// assert_eq!(
///     coerce_value("employee_contribution", "1,234.5", amount).unwrap(),
///     Some(FieldValue::Decimal(Decimal::new(123450, 2)))
/// );
/// assert!(coerce_value("employee_contribution", "12.345", amount).is_err());
/// assert_eq!(coerce_value("employee_contribution", "  ", amount).unwrap(), None);
/// ```
pub fn coerce_value(field: &str, raw: &str, data_type: DataType) -> PayrollResult<Option<FieldValue>> {
    let value = raw.trim();
    if value.is_empty() {
        return Ok(None);
    }
    let invalid = |message: String| PayrollError::ValidationError {
        field: field.to_string(),
        message,
    };

    match data_type {
        DataType::Text { max_len } => {
            let length = value.chars().count();
            match max_len {
                Some(max) if length > max => Err(invalid(format!(
                    "'{value}' has {length} characters, at most {max} allowed"
                ))),
                _ => Ok(Some(FieldValue::Text(value.to_string()))),
            }
        }
        DataType::Date => DATE_FORMATS
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
            .map(|date| Some(FieldValue::Date(date)))
            .ok_or_else(|| invalid(format!("'{value}' is not a date"))),
        DataType::Decimal { precision, scale } => {
            let cleaned = value.replace(',', "");
            let parsed = Decimal::from_str(&cleaned)
                .map_err(|_| invalid(format!("'{value}' is not a decimal number")))?;
            let normalized = parsed.normalize();
            if normalized.scale() > scale {
                return Err(invalid(format!(
                    "'{value}' has {} fractional digits, at most {scale} allowed",
                    normalized.scale()
                )));
            }
            let integer_limit = precision.saturating_sub(scale);
            let integer_digits = integer_digit_count(normalized);
            if integer_digits > integer_limit {
                return Err(invalid(format!(
                    "'{value}' has {integer_digits} integer digits, at most {integer_limit} allowed"
                )));
            }
            let mut rescaled = normalized;
            rescaled.rescale(scale);
            Ok(Some(FieldValue::Decimal(rescaled)))
        }
    }
}

fn integer_digit_count(value: Decimal) -> u32 {
    let integer = value.abs().trunc().to_string();
    integer.trim_start_matches('0').len() as u32
}
