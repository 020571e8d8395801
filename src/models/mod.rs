//! Core data models for the payroll engine.
//!
//! This module contains all the domain models used throughout the engine.

mod contribution;
mod employee;
mod field_mapping;
mod pay_period;
mod payroll;
mod staging;

pub use contribution::{
    CategoryRule, ContributionConfig, ContributionType, EffectiveInterval, RoundingPolicyKind,
};
pub use employee::Employee;
pub use field_mapping::{DataType, FieldMapping, InvalidDataType};
pub use pay_period::{InvalidPayPeriod, PayPeriod};
pub use payroll::{
    AuditStep, ContributionLine, EmployeeFailure, EntryFailure, EntryStatus, PayrollEntry,
    PayrollRun, RunStatus, RunTotals,
};
pub use staging::{
    FieldValue, ImportBatch, SourceType, StagingRecord, ValidationIssue, ValidationStatus,
};
