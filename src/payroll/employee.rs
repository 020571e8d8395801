//! Per-employee payroll calculation.
//!
//! Resolves every contribution type the employee's personnel category owes,
//! calculates each, and folds the rounded amounts into net pay. Pure with
//! respect to runs: the orchestrator decides what to do with the entry.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::calculation::{calculate_contribution, calculate_net_pay};
use crate::error::{PayrollError, PayrollResult};
use crate::ingestion::StagingStore;
use crate::matching::EmployeeDirectory;
use crate::models::{
    AuditStep, Employee, EntryFailure, EntryStatus, PayPeriod, PayrollEntry, SourceType,
};
use crate::rules::RuleBook;

/// Shared read-only inputs of a calculation.
#[derive(Clone)]
pub struct CalculationContext {
    /// Contribution configs and rules.
    pub rules: Arc<RuleBook>,
    /// The employee master.
    pub directory: Arc<dyn EmployeeDirectory>,
    /// Matched staging records supplying bases and income tax.
    pub staging: Arc<StagingStore>,
}

/// The run attributes an employee calculation needs.
#[derive(Debug, Clone, Copy)]
pub struct RunScope {
    /// The run.
    pub run_id: Uuid,
    /// The pay period.
    pub pay_period: PayPeriod,
    /// The as-of date for rule resolution.
    pub effective_date: NaiveDate,
}

impl CalculationContext {
    /// Calculates one employee's entry.
    ///
    /// Any error aborts this employee only; the caller records it with
    /// [`failed_entry`].
    pub fn calculate_employee(
        &self,
        scope: &RunScope,
        employee: &Employee,
    ) -> PayrollResult<PayrollEntry> {
        let gross_pay = self
            .directory
            .compensation(&employee.id, &scope.pay_period)
            .ok_or_else(|| PayrollError::CompensationNotFound {
                employee_id: employee.id.clone(),
                period: scope.pay_period.to_string(),
            })?;

        let mut audit_steps = vec![AuditStep {
            step_number: 1,
            rule_id: "gross_pay".to_string(),
            rule_name: "Gross Pay".to_string(),
            input: serde_json::json!({
                "employee_id": employee.id,
                "pay_period": scope.pay_period.to_string()
            }),
            output: serde_json::json!({
                "gross_pay": gross_pay.normalize().to_string()
            }),
            reasoning: format!(
                "Gross pay for {} in {} is {}",
                employee.id,
                scope.pay_period,
                gross_pay.normalize()
            ),
        }];

        let category = employee.personnel_category_id.as_str();
        let mut contributions = Vec::new();
        for contribution_type in self.rules.contribution_types_for(category) {
            let resolved = self
                .rules
                .resolve(category, contribution_type, scope.effective_date)?;
            let raw_base = match resolved.config.staged_source {
                Some(source) => self.staged_base(scope, employee, source)?,
                None => gross_pay,
            };
            let step_number = next_step(&audit_steps);
            let result =
                calculate_contribution(resolved.config, resolved.rule, raw_base, step_number);
            audit_steps.push(result.audit_step);
            contributions.push(result.line);
        }

        let income_tax = self
            .staging
            .latest_matched(&employee.id, &scope.pay_period, SourceType::Tax)
            .and_then(|record| record.income_tax)
            .unwrap_or(Decimal::ZERO);
        let net = calculate_net_pay(
            gross_pay,
            &contributions,
            income_tax,
            next_step(&audit_steps),
        );
        audit_steps.push(net.audit_step);

        Ok(PayrollEntry {
            id: Uuid::new_v4(),
            run_id: scope.run_id,
            employee_id: employee.id.clone(),
            status: EntryStatus::Calculated,
            gross_pay: net.gross_pay,
            contributions,
            income_tax: net.income_tax,
            total_deductions: net.total_deductions,
            net_pay: net.net_pay,
            failure: None,
            audit_steps,
            calculated_at: Utc::now(),
        })
    }

    fn staged_base(
        &self,
        scope: &RunScope,
        employee: &Employee,
        source: SourceType,
    ) -> PayrollResult<Decimal> {
        let record = self
            .staging
            .latest_matched(&employee.id, &scope.pay_period, source)
            .ok_or_else(|| PayrollError::UnmatchedRecord {
                key: format!(
                    "{source} record for employee '{}' in {}",
                    employee.id, scope.pay_period
                ),
            })?;
        record
            .effective_base()
            .ok_or_else(|| PayrollError::ValidationError {
                field: "contribution_base".to_string(),
                message: format!(
                    "{source} row {} of '{}' has no contribution base",
                    record.row_number, record.source_filename
                ),
            })
    }
}

fn next_step(steps: &[AuditStep]) -> u32 {
    steps.len() as u32 + 1
}

/// Builds the entry recorded for an employee whose calculation failed.
pub fn failed_entry(scope: &RunScope, employee_id: &str, error: &PayrollError) -> PayrollEntry {
    PayrollEntry {
        id: Uuid::new_v4(),
        run_id: scope.run_id,
        employee_id: employee_id.to_string(),
        status: EntryStatus::CalculationFailed,
        gross_pay: Decimal::ZERO,
        contributions: Vec::new(),
        income_tax: Decimal::ZERO,
        total_deductions: Decimal::ZERO,
        net_pay: Decimal::ZERO,
        failure: Some(EntryFailure {
            reason_code: error.reason_code().to_string(),
            message: error.to_string(),
        }),
        audit_steps: Vec::new(),
        calculated_at: Utc::now(),
    }
}
