//! Payroll contribution engine.
//!
//! This crate ingests raw contribution exports (annuity, housing fund and
//! income tax files) into an append-only staging store, matches their rows
//! to employees, resolves effective-dated contribution rules per personnel
//! category, and calculates payroll runs with rounded contribution amounts
//! and net pay.

#![warn(missing_docs)]

pub mod api;
pub mod calculation;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod mapping;
pub mod matching;
pub mod models;
pub mod payroll;
pub mod rules;
