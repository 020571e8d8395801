//! Employee model.
//!
//! Employees are owned by the employee master outside this engine. The
//! engine only reads them: matching resolves staging rows onto an
//! [`Employee`], and payroll runs use the personnel category and gross pay.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::PayPeriod;

/// Represents a canonical employee record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    /// Unique identifier for the employee.
    pub id: String,
    /// The 18-character national identity card number, when on file.
    #[serde(default)]
    pub id_card_number: Option<String>,
    /// The employee's full name as it appears on source exports.
    pub name: String,
    /// The personnel category used to select contribution rules.
    pub personnel_category_id: String,
    /// The date the employee started employment.
    pub employment_start: NaiveDate,
    /// The last day of employment, if the employee has left.
    #[serde(default)]
    pub employment_end: Option<NaiveDate>,
    /// Gross pay for a full month.
    pub monthly_gross_pay: Decimal,
}

impl Employee {
    /// Returns true if the employee was employed on any day of the period.
    ///
    /// # Examples
    ///
    /// ```
    /// use payroll_engine::models::{Employee, PayPeriod};
    /// use chrono::NaiveDate;
    /// use rust_decimal::Decimal;
    ///
    /// let employee = Employee {
    ///     id: "emp_001".to_string(),
    ///     id_card_number: None,
    ///     name: "Li Wei".to_string(),
    ///     personnel_category_id: "staff".to_string(),
    ///     employment_start: NaiveDate::from_ymd_opt(2024, 3, 20).unwrap(),
    ///     employment_end: None,
    ///     monthly_gross_pay: Decimal::new(800000, 2),
    /// };
    /// assert!(employee.is_employed_during(&"2024-03".parse::<PayPeriod>().unwrap()));
    /// assert!(!employee.is_employed_during(&"2024-02".parse::<PayPeriod>().unwrap()));
    /// ```
    pub fn is_employed_during(&self, period: &PayPeriod) -> bool {
        let started = self.employment_start <= period.end_date();
        let not_left = self
            .employment_end
            .is_none_or(|end| end >= period.start_date());
        started && not_left
    }
}
