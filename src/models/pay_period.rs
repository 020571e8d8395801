//! Pay period model.
//!
//! Payroll is run monthly. A [`PayPeriod`] is identified by its year and
//! month and renders as `YYYY-MM`; source exports that write the compact
//! `YYYYMM` form are accepted when parsing.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// A monthly pay period.
///
/// # Example
///
/// ```
/// use payroll_engine::models::PayPeriod;
/// use chrono::NaiveDate;
///
/// let period: PayPeriod = "2024-03".parse().unwrap();
/// assert_eq!(period.to_string(), "2024-03");
/// assert_eq!(period.start_date(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
/// assert_eq!(period.end_date(), NaiveDate::from_ymd_opt(2024, 3, 31).unwrap());
///
/// let compact: PayPeriod = "202403".parse().unwrap();
/// assert_eq!(compact, period);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PayPeriod {
    year: i32,
    month: u32,
}

/// Error returned when a pay period identifier cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidPayPeriod(pub String);

impl fmt::Display for InvalidPayPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid pay period identifier '{}', expected YYYY-MM", self.0)
    }
}

impl std::error::Error for InvalidPayPeriod {}

impl PayPeriod {
    /// Creates a pay period, returning `None` for an out-of-range month.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
    }

    /// The period containing the given date.
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The first day of the period.
    pub fn start_date(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// The last day of the period (inclusive).
    pub fn end_date(&self) -> NaiveDate {
        let (year, month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(year, month, 1)
            .and_then(|next| next.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }

    /// Checks if a given date falls within this pay period (inclusive).
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.start_date() && date <= self.end_date()
    }
}

impl FromStr for PayPeriod {
    type Err = InvalidPayPeriod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || InvalidPayPeriod(trimmed.to_string());

        let (year, month) = match trimmed.split_once('-') {
            Some((year, month)) => (year, month),
            None if trimmed.len() == 6 && trimmed.is_ascii() => trimmed.split_at(4),
            None => return Err(invalid()),
        };

        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).ok_or_else(invalid)
    }
}

impl TryFrom<String> for PayPeriod {
    type Error = InvalidPayPeriod;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PayPeriod> for String {
    fn from(value: PayPeriod) -> Self {
        value.to_string()
    }
}

impl fmt::Display for PayPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}
