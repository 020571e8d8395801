//! Payroll run and entry models.
//!
//! This module contains the [`PayrollRun`] and [`PayrollEntry`] types that
//! capture the outputs of a run calculation, including per-contribution
//! lines, totals, failures and audit steps.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ContributionType, PayPeriod, RoundingPolicyKind};

/// The status of a payroll run.
///
/// ```text
/// Draft ─► Calculating ─► Calculated ───────────────┐
///   ▲                  └► CalculatedWithWarnings ──┴► Approved ─► Paid
///   └──── Reverted ◄──────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created, not yet calculated.
    Draft,
    /// A calculation holds the run.
    Calculating,
    /// Every employee produced a calculated entry.
    Calculated,
    /// At least one employee entry failed.
    CalculatedWithWarnings,
    /// Approved for payment; no recomputation.
    Approved,
    /// Paid; terminal.
    Paid,
    /// Entries discarded; calculates like a draft.
    Reverted,
}

impl RunStatus {
    /// Whether a fresh calculation may start from this status.
    pub fn accepts_calculation(self) -> bool {
        matches!(self, RunStatus::Draft | RunStatus::Reverted)
    }

    /// Whether the run holds a completed calculation.
    pub fn is_calculated(self) -> bool {
        matches!(
            self,
            RunStatus::Calculated | RunStatus::CalculatedWithWarnings
        )
    }

    /// Whether the run may be reverted.
    pub fn is_revertible(self) -> bool {
        self.is_calculated() || self == RunStatus::Approved
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunStatus::Draft => "draft",
            RunStatus::Calculating => "calculating",
            RunStatus::Calculated => "calculated",
            RunStatus::CalculatedWithWarnings => "calculated_with_warnings",
            RunStatus::Approved => "approved",
            RunStatus::Paid => "paid",
            RunStatus::Reverted => "reverted",
        })
    }
}

/// The status of one employee's entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Work started for the employee.
    Pending,
    /// Entered by hand outside the calculation engine.
    Entry,
    /// Amounts computed.
    Calculated,
    /// The employee could not be calculated; see the failure.
    CalculationFailed,
    /// Approved with its run.
    Approved,
    /// Paid with its run.
    Paid,
}

/// A single step in the audit trace recording a calculation decision.
///
/// Each step captures the input, output, and reasoning for a rule application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStep {
    /// The sequential step number.
    pub step_number: u32,
    /// The unique identifier of the rule that was applied.
    pub rule_id: String,
    /// The human-readable name of the rule.
    pub rule_name: String,
    /// The input data for this step.
    pub input: serde_json::Value,
    /// The output data from this step.
    pub output: serde_json::Value,
    /// Human-readable explanation of the decision.
    pub reasoning: String,
}

/// One contribution type's amounts within an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionLine {
    /// The contribution type.
    pub contribution_type: ContributionType,
    /// The config the rule resolver selected.
    pub config_id: String,
    /// Effective date of the rule that selected the config.
    pub rule_effective_date: NaiveDate,
    /// The base after clamping to floor and cap.
    pub base: Decimal,
    /// Employer rate applied.
    pub employer_rate: Decimal,
    /// Employee rate applied.
    pub employee_rate: Decimal,
    /// Rounded employer amount.
    pub employer_amount: Decimal,
    /// Rounded employee amount; a deduction from gross pay.
    pub employee_amount: Decimal,
    /// The rounding policy applied.
    pub rounding: RoundingPolicyKind,
}

/// Why an employee's entry failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFailure {
    /// Machine-readable reason code.
    pub reason_code: String,
    /// Human-readable detail.
    pub message: String,
}

/// One employee's result within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollEntry {
    /// Unique identifier.
    pub id: Uuid,
    /// The run that owns this entry.
    pub run_id: Uuid,
    /// The employee.
    pub employee_id: String,
    /// Entry status.
    pub status: EntryStatus,
    /// Rounded gross pay.
    pub gross_pay: Decimal,
    /// Per-type contribution amounts.
    pub contributions: Vec<ContributionLine>,
    /// Rounded income tax withheld.
    pub income_tax: Decimal,
    /// Sum of employee contributions and income tax.
    pub total_deductions: Decimal,
    /// Gross pay less total deductions.
    pub net_pay: Decimal,
    /// Failure detail when the status is `CalculationFailed`.
    pub failure: Option<EntryFailure>,
    /// Audit trail of the decisions behind the amounts.
    pub audit_steps: Vec<AuditStep>,
    /// When the entry was produced.
    pub calculated_at: DateTime<Utc>,
}

impl PayrollEntry {
    /// Sum of employer-side contribution amounts.
    pub fn employer_total(&self) -> Decimal {
        self.contributions.iter().map(|c| c.employer_amount).sum()
    }

    /// Recomputes the deduction total from the stored rounded amounts.
    pub fn stored_deductions(&self) -> Decimal {
        self.contributions
            .iter()
            .map(|c| c.employee_amount)
            .sum::<Decimal>()
            + self.income_tax
    }

    /// Recomputes net pay from the stored rounded amounts.
    pub fn recomputed_net_pay(&self) -> Decimal {
        self.gross_pay - self.stored_deductions()
    }

    /// Whether the entry counts towards run totals.
    pub fn succeeded(&self) -> bool {
        self.status != EntryStatus::CalculationFailed && self.status != EntryStatus::Pending
    }
}

/// An employee the run could not calculate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeFailure {
    /// The employee.
    pub employee_id: String,
    /// Machine-readable reason code.
    pub reason_code: String,
    /// Human-readable detail.
    pub message: String,
}

/// Aggregated totals over a run's successful entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTotals {
    /// Sum of gross pay.
    pub total_gross_pay: Decimal,
    /// Sum of total deductions.
    pub total_deductions: Decimal,
    /// Sum of net pay.
    pub total_net_pay: Decimal,
    /// Sum of employer contributions.
    pub total_employer_contributions: Decimal,
}

impl RunTotals {
    /// Folds the successful entries into totals.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a PayrollEntry>) -> Self {
        entries
            .into_iter()
            .filter(|entry| entry.succeeded())
            .fold(Self::default(), |mut totals, entry| {
                totals.total_gross_pay += entry.gross_pay;
                totals.total_deductions += entry.total_deductions;
                totals.total_net_pay += entry.net_pay;
                totals.total_employer_contributions += entry.employer_total();
                totals
            })
    }
}

/// One calculation execution for a pay period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollRun {
    /// Unique identifier.
    pub id: Uuid,
    /// The pay period.
    pub pay_period: PayPeriod,
    /// The as-of date for rule resolution.
    pub effective_date: NaiveDate,
    /// Current status.
    pub status: RunStatus,
    /// Totals over successful entries.
    #[serde(flatten)]
    pub totals: RunTotals,
    /// Employees that failed in the last calculation.
    pub failures: Vec<EmployeeFailure>,
    /// Number of completed calculations.
    pub revision: u32,
    /// When the run was created.
    pub created_at: DateTime<Utc>,
    /// When the run last changed.
    pub updated_at: DateTime<Utc>,
}
