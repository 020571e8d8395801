//! Configuration types for the payroll engine.
//!
//! This module contains the strongly-typed configuration structures that
//! are deserialized from YAML configuration files.

use serde::Deserialize;

use crate::models::{CategoryRule, ContributionConfig, Employee, FieldMapping};

/// Ingestion settings.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestionSettings {
    /// Maximum number of error details returned in an ingest report.
    #[serde(default = "default_max_error_details")]
    pub max_error_details: usize,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            max_error_details: default_max_error_details(),
        }
    }
}

fn default_max_error_details() -> usize {
    20
}

/// Calculation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CalculationSettings {
    /// Time allowed for one employee before it is counted as failed.
    #[serde(default = "default_per_employee_timeout_ms")]
    pub per_employee_timeout_ms: u64,
}

impl Default for CalculationSettings {
    fn default() -> Self {
        Self {
            per_employee_timeout_ms: default_per_employee_timeout_ms(),
        }
    }
}

fn default_per_employee_timeout_ms() -> u64 {
    5_000
}

/// Engine settings from engine.yaml.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    /// Log level/filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Ingestion settings.
    #[serde(default)]
    pub ingestion: IngestionSettings,
    /// Calculation settings.
    #[serde(default)]
    pub calculation: CalculationSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            ingestion: IngestionSettings::default(),
            calculation: CalculationSettings::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Field mapping file structure.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldMappingsConfig {
    /// Raw column labels that are skipped without error.
    #[serde(default)]
    pub ignored_columns: Vec<String>,
    /// Column mappings.
    pub mappings: Vec<FieldMapping>,
}

/// Contribution config file structure.
#[derive(Debug, Clone, Deserialize)]
pub struct ContributionsConfig {
    /// Contribution configs.
    pub contributions: Vec<ContributionConfig>,
}

/// Category rule file structure.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryRulesConfig {
    /// Effective-dated category rules.
    pub rules: Vec<CategoryRule>,
}

/// Employee master file structure.
#[derive(Debug, Clone, Deserialize)]
pub struct EmployeesConfig {
    /// Employees.
    pub employees: Vec<Employee>,
}
