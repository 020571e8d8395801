//! Read access to the employee master.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use rust_decimal::Decimal;

use crate::models::{Employee, PayPeriod};

/// Read-only view of canonical employees and their compensation.
pub trait EmployeeDirectory: Send + Sync {
    /// Every employee on file.
    fn employees(&self) -> Vec<Employee>;

    /// Employees whose identity card number equals `id_card_number`.
    fn find_by_id_card(&self, id_card_number: &str) -> Vec<Employee>;

    /// Employees whose name equals `name`.
    fn find_by_name(&self, name: &str) -> Vec<Employee>;

    /// Gross pay owed to the employee for the period, if any.
    fn compensation(&self, employee_id: &str, period: &PayPeriod) -> Option<Decimal>;

    /// Employees employed on at least one day of the period.
    fn employees_for(&self, period: &PayPeriod) -> Vec<Employee> {
        self.employees()
            .into_iter()
            .filter(|employee| employee.is_employed_during(period))
            .collect()
    }
}

/// An in-memory employee directory, loaded from configuration or built in
/// tests.
///
/// Compensation defaults to the employee's monthly gross pay for every
/// period they are employed in; per-period amounts override it.
#[derive(Debug, Default)]
pub struct InMemoryEmployeeDirectory {
    employees: RwLock<Vec<Employee>>,
    compensation: RwLock<HashMap<(String, PayPeriod), Decimal>>,
}

impl InMemoryEmployeeDirectory {
    /// Creates a directory over the given employees.
    pub fn new(employees: Vec<Employee>) -> Self {
        Self {
            employees: RwLock::new(employees),
            compensation: RwLock::new(HashMap::new()),
        }
    }

    /// Adds an employee, replacing any existing employee with the same id.
    pub fn upsert(&self, employee: Employee) {
        let mut employees = self
            .employees
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match employees.iter_mut().find(|existing| existing.id == employee.id) {
            Some(existing) => *existing = employee,
            None => employees.push(employee),
        }
    }

    /// Sets the gross pay for one employee and period.
    pub fn set_compensation(&self, employee_id: impl Into<String>, period: PayPeriod, amount: Decimal) {
        self.compensation
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((employee_id.into(), period), amount);
    }

    fn filtered(&self, predicate: impl Fn(&Employee) -> bool) -> Vec<Employee> {
        self.employees
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|employee| predicate(employee))
            .cloned()
            .collect()
    }
}

impl EmployeeDirectory for InMemoryEmployeeDirectory {
    fn employees(&self) -> Vec<Employee> {
        self.filtered(|_| true)
    }

    fn find_by_id_card(&self, id_card_number: &str) -> Vec<Employee> {
        self.filtered(|employee| employee.id_card_number.as_deref() == Some(id_card_number))
    }

    fn find_by_name(&self, name: &str) -> Vec<Employee> {
        self.filtered(|employee| employee.name == name)
    }

    fn compensation(&self, employee_id: &str, period: &PayPeriod) -> Option<Decimal> {
        let overridden = self
            .compensation
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(employee_id.to_string(), *period))
            .copied();
        if overridden.is_some() {
            return overridden;
        }
        self.filtered(|employee| employee.id == employee_id)
            .into_iter()
            .find(|employee| employee.is_employed_during(period))
            .map(|employee| employee.monthly_gross_pay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn employee(id: &str, name: &str, start: (i32, u32, u32), end: Option<(i32, u32, u32)>) -> Employee {
        let date = |(y, m, d): (i32, u32, u32)| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        Employee {
            id: id.to_string(),
            id_card_number: Some(format!("11010119900101{:0>4}", &id[id.len() - 3..])),
            name: name.to_string(),
            personnel_category_id: "staff".to_string(),
            employment_start: date(start),
            employment_end: end.map(date),
            monthly_gross_pay: dec("8000.00"),
        }
    }

    fn period(s: &str) -> PayPeriod {
        s.parse().unwrap()
    }

    #[test]
    fn test_employees_for_period() {
        let directory = InMemoryEmployeeDirectory::new(vec![
            employee("emp_001", "Li Wei", (2020, 1, 1), None),
            employee("emp_002", "Wang Fang", (2020, 1, 1), Some((2024, 2, 10))),
            employee("emp_003", "Zhao Lei", (2024, 4, 1), None),
        ]);

        let ids: Vec<_> = directory
            .employees_for(&period("2024-03"))
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["emp_001"]);
    }

    #[test]
    fn test_compensation_defaults_to_monthly_gross() {
        let directory =
            InMemoryEmployeeDirectory::new(vec![employee("emp_001", "Li Wei", (2024, 1, 1), None)]);
        assert_eq!(
            directory.compensation("emp_001", &period("2024-03")),
            Some(dec("8000.00"))
        );
        assert_eq!(directory.compensation("emp_001", &period("2023-12")), None);
        assert_eq!(directory.compensation("emp_999", &period("2024-03")), None);
    }

    #[test]
    fn test_compensation_override() {
        let directory =
            InMemoryEmployeeDirectory::new(vec![employee("emp_001", "Li Wei", (2024, 1, 1), None)]);
        directory.set_compensation("emp_001", period("2024-03"), dec("9500.50"));
        assert_eq!(
            directory.compensation("emp_001", &period("2024-03")),
            Some(dec("9500.50"))
        );
        assert_eq!(
            directory.compensation("emp_001", &period("2024-04")),
            Some(dec("8000.00"))
        );
    }

    #[test]
    fn test_upsert_replaces_by_id() {
        let directory =
            InMemoryEmployeeDirectory::new(vec![employee("emp_001", "Li Wei", (2024, 1, 1), None)]);
        let mut renamed = employee("emp_001", "Li Wei", (2024, 1, 1), None);
        renamed.name = "Li Wei (Jr)".to_string();
        directory.upsert(renamed);
        directory.upsert(employee("emp_002", "Wang Fang", (2024, 1, 1), None));

        assert_eq!(directory.employees().len(), 2);
        assert!(directory.find_by_name("Li Wei").is_empty());
        assert_eq!(directory.find_by_name("Li Wei (Jr)").len(), 1);
    }
}
