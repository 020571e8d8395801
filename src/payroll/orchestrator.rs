//! Payroll run orchestration.
//!
//! The orchestrator owns the run state machine. A calculation claims the
//! run, fans out one blocking task per employee bounded by a timeout, and
//! commits the entries, totals and final status in a single write.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

use super::claim::{ClaimTable, RunClaim};
use super::employee::{CalculationContext, RunScope, failed_entry};
use super::store::{RunRecord, RunStore};
use crate::config::CalculationSettings;
use crate::error::{PayrollError, PayrollResult};
use crate::models::{
    EmployeeFailure, EntryStatus, PayPeriod, PayrollEntry, PayrollRun, RunStatus, RunTotals,
};

/// What a calculate request produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalculationOutcome {
    /// The run.
    pub run_id: Uuid,
    /// The run's status after the request.
    pub status: RunStatus,
    /// Totals over successful entries.
    pub totals: RunTotals,
    /// Employees that failed.
    pub failures: Vec<EmployeeFailure>,
    /// Number of completed calculations of the run.
    pub revision: u32,
    /// True when the stored result was returned without calculating.
    pub reused: bool,
}

impl CalculationOutcome {
    fn from_run(run: &PayrollRun, reused: bool) -> Self {
        Self {
            run_id: run.id,
            status: run.status,
            totals: run.totals.clone(),
            failures: run.failures.clone(),
            revision: run.revision,
            reused,
        }
    }
}

/// Creates, calculates and moves payroll runs through their lifecycle.
pub struct PayrollOrchestrator {
    runs: Arc<RunStore>,
    claims: Arc<ClaimTable>,
    context: CalculationContext,
    settings: CalculationSettings,
}

impl PayrollOrchestrator {
    /// Creates an orchestrator with no runs.
    pub fn new(context: CalculationContext, settings: CalculationSettings) -> Self {
        Self {
            runs: Arc::new(RunStore::default()),
            claims: Arc::new(ClaimTable::default()),
            context,
            settings,
        }
    }

    /// Creates a draft run. The effective date defaults to the first day of
    /// the period.
    pub fn create_run(&self, pay_period: PayPeriod, effective_date: Option<NaiveDate>) -> PayrollRun {
        let now = Utc::now();
        let run = PayrollRun {
            id: Uuid::new_v4(),
            pay_period,
            effective_date: effective_date.unwrap_or_else(|| pay_period.start_date()),
            status: RunStatus::Draft,
            totals: RunTotals::default(),
            failures: Vec::new(),
            revision: 0,
            created_at: now,
            updated_at: now,
        };
        info!(run_id = %run.id, pay_period = %pay_period, "Created payroll run");
        self.runs.insert(run.clone());
        run
    }

    /// Calculates a run.
    ///
    /// Draft and reverted runs are calculated. Calculated runs are
    /// recalculated only when `recompute` is set and otherwise return their
    /// stored outcome. A run that is calculating fails with `RunBusy`, an
    /// approved run with `InvalidTransition` and a paid run with
    /// `RunLocked`; none of these change the run.
    pub async fn calculate_run(&self, run_id: Uuid, recompute: bool) -> PayrollResult<CalculationOutcome> {
        let (claim, scope) = match self.claim_for_calculation(run_id, recompute)? {
            Claimed::Stored(outcome) => return Ok(outcome),
            Claimed::Fresh(claim, scope) => (claim, scope),
        };
        info!(run_id = %run_id, pay_period = %scope.pay_period, recompute, "Calculating payroll run");

        let entries = self.calculate_entries(&scope).await;

        let failures: Vec<EmployeeFailure> = entries
            .iter()
            .filter_map(|entry| {
                entry.failure.as_ref().map(|failure| EmployeeFailure {
                    employee_id: entry.employee_id.clone(),
                    reason_code: failure.reason_code.clone(),
                    message: failure.message.clone(),
                })
            })
            .collect();
        let totals = RunTotals::from_entries(&entries);
        let status = if failures.is_empty() {
            RunStatus::Calculated
        } else {
            RunStatus::CalculatedWithWarnings
        };

        let outcome = self.runs.update(claim.run_id(), move |record| {
            record.run.status = status;
            record.run.totals = totals;
            record.run.failures = failures;
            record.run.revision += 1;
            record.run.updated_at = Utc::now();
            record.entries = entries;
            Ok(CalculationOutcome::from_run(&record.run, false))
        })?;
        claim.complete();

        if outcome.failures.is_empty() {
            info!(run_id = %run_id, revision = outcome.revision, "Payroll run calculated");
        } else {
            warn!(
                run_id = %run_id,
                revision = outcome.revision,
                failed = outcome.failures.len(),
                "Payroll run calculated with warnings"
            );
        }
        Ok(outcome)
    }

    fn claim_for_calculation(&self, run_id: Uuid, recompute: bool) -> PayrollResult<Claimed> {
        self.runs.update(run_id, |record| {
            let status = record.run.status;
            match status {
                RunStatus::Paid => return Err(PayrollError::RunLocked { run_id }),
                RunStatus::Calculating => return Err(PayrollError::RunBusy { run_id }),
                _ if status.is_calculated() && !recompute => {
                    return Ok(Claimed::Stored(CalculationOutcome::from_run(&record.run, true)));
                }
                _ if !(status.accepts_calculation() || status.is_calculated()) => {
                    return Err(invalid_transition(run_id, "calculate", status));
                }
                _ => {}
            }

            if !self.claims.try_claim(run_id) {
                return Err(PayrollError::RunBusy { run_id });
            }
            let claim = RunClaim::new(run_id, self.claims.clone(), self.runs.clone());
            start_calculating(record);
            Ok(Claimed::Fresh(
                claim,
                RunScope {
                    run_id,
                    pay_period: record.run.pay_period,
                    effective_date: record.run.effective_date,
                },
            ))
        })
    }

    async fn calculate_entries(&self, scope: &RunScope) -> Vec<PayrollEntry> {
        let timeout_ms = self.settings.per_employee_timeout_ms;
        let employees = self.context.directory.employees_for(&scope.pay_period);

        let mut tasks = JoinSet::new();
        for (index, employee) in employees.into_iter().enumerate() {
            let context = self.context.clone();
            let scope = *scope;
            tasks.spawn(async move {
                let employee_id = employee.id.clone();
                let work = tokio::task::spawn_blocking(move || {
                    context.calculate_employee(&scope, &employee)
                });
                let result = match tokio::time::timeout(Duration::from_millis(timeout_ms), work).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(join_error)) => Err(PayrollError::CalculationTaskFailed {
                        employee_id: employee_id.clone(),
                        message: join_error.to_string(),
                    }),
                    Err(_) => Err(PayrollError::CalculationTimeout {
                        employee_id: employee_id.clone(),
                        timeout_ms,
                    }),
                };
                let entry = result.unwrap_or_else(|error| {
                    warn!(
                        run_id = %scope.run_id,
                        employee_id = %employee_id,
                        reason = error.reason_code(),
                        %error,
                        "Employee calculation failed"
                    );
                    failed_entry(&scope, &employee_id, &error)
                });
                (index, entry)
            });
        }

        let mut entries = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(indexed) => entries.push(indexed),
                Err(join_error) => warn!(run_id = %scope.run_id, %join_error, "Employee task lost"),
            }
        }
        entries.sort_by_key(|(index, _)| *index);
        entries.into_iter().map(|(_, entry)| entry).collect()
    }

    /// Approves a calculated run; its calculated entries become approved.
    pub fn approve(&self, run_id: Uuid) -> PayrollResult<PayrollRun> {
        let run = self.runs.update(run_id, |record| {
            let status = record.run.status;
            if status == RunStatus::Paid {
                return Err(PayrollError::RunLocked { run_id });
            }
            if !status.is_calculated() {
                return Err(invalid_transition(run_id, "approve", status));
            }
            record.run.status = RunStatus::Approved;
            record.run.updated_at = Utc::now();
            set_entry_status(record, EntryStatus::Calculated, EntryStatus::Approved);
            Ok(record.run.clone())
        })?;
        info!(run_id = %run_id, "Payroll run approved");
        Ok(run)
    }

    /// Reverts a calculated or approved run, discarding its entries.
    pub fn revert(&self, run_id: Uuid) -> PayrollResult<PayrollRun> {
        let run = self.runs.update(run_id, |record| {
            let status = record.run.status;
            match status {
                RunStatus::Paid => return Err(PayrollError::RunLocked { run_id }),
                RunStatus::Calculating => return Err(PayrollError::RunBusy { run_id }),
                _ if !status.is_revertible() => {
                    return Err(invalid_transition(run_id, "revert", status));
                }
                _ => {}
            }
            record.run.status = RunStatus::Reverted;
            record.run.totals = RunTotals::default();
            record.run.failures.clear();
            record.run.updated_at = Utc::now();
            record.entries.clear();
            Ok(record.run.clone())
        })?;
        info!(run_id = %run_id, "Payroll run reverted");
        Ok(run)
    }

    /// Marks an approved run as paid; its approved entries become paid.
    pub fn pay(&self, run_id: Uuid) -> PayrollResult<PayrollRun> {
        let run = self.runs.update(run_id, |record| {
            let status = record.run.status;
            match status {
                RunStatus::Paid => Err(PayrollError::RunLocked { run_id }),
                RunStatus::Approved => {
                    record.run.status = RunStatus::Paid;
                    record.run.updated_at = Utc::now();
                    set_entry_status(record, EntryStatus::Approved, EntryStatus::Paid);
                    Ok(record.run.clone())
                }
                _ => Err(invalid_transition(run_id, "pay", status)),
            }
        })?;
        info!(run_id = %run_id, "Payroll run paid");
        Ok(run)
    }

    /// Looks up a run.
    pub fn run(&self, run_id: Uuid) -> PayrollResult<PayrollRun> {
        self.runs.with_record(run_id, |record| record.run.clone())
    }

    /// The entries of a run's last completed calculation.
    pub fn entries(&self, run_id: Uuid) -> PayrollResult<Vec<PayrollEntry>> {
        self.runs.with_record(run_id, |record| record.entries.clone())
    }

    /// One employee's entry in a run, if the run has one.
    pub fn entry(&self, run_id: Uuid, employee_id: &str) -> PayrollResult<Option<PayrollEntry>> {
        self.runs.with_record(run_id, |record| {
            record
                .entries
                .iter()
                .find(|entry| entry.employee_id == employee_id)
                .cloned()
        })
    }

    /// All runs, oldest first.
    pub fn list_runs(&self) -> Vec<PayrollRun> {
        self.runs.runs()
    }

    /// Whether a calculation currently holds the run.
    pub fn is_calculating(&self, run_id: Uuid) -> bool {
        self.claims.is_claimed(run_id)
    }
}

enum Claimed {
    Stored(CalculationOutcome),
    Fresh(RunClaim, RunScope),
}

fn start_calculating(record: &mut RunRecord) {
    record.run.status = RunStatus::Calculating;
    record.run.totals = RunTotals::default();
    record.run.failures.clear();
    record.run.updated_at = Utc::now();
    record.entries.clear();
}

fn set_entry_status(record: &mut RunRecord, from: EntryStatus, to: EntryStatus) {
    record
        .entries
        .iter_mut()
        .filter(|entry| entry.status == from)
        .for_each(|entry| entry.status = to);
}

fn invalid_transition(run_id: Uuid, action: &str, status: RunStatus) -> PayrollError {
    PayrollError::InvalidTransition {
        run_id,
        action: action.to_string(),
        status,
    }
}
