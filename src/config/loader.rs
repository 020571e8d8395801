//! Configuration loading functionality.
//!
//! This module provides the [`ConfigLoader`] type for loading the engine's
//! settings, field mappings, contribution configs, category rules and
//! employee master from YAML files.

use std::fs;
use std::path::Path;

use crate::error::{PayrollError, PayrollResult};
use crate::mapping::FieldMappingSet;
use crate::models::Employee;
use crate::rules::RuleBook;

use super::types::{
    CategoryRulesConfig, ContributionsConfig, EmployeesConfig, EngineSettings,
    FieldMappingsConfig,
};

/// Loads and provides access to payroll engine configuration.
///
/// The `ConfigLoader` reads YAML configuration files from a directory and
/// validates them into the structures the pipeline runs on: field mappings
/// are indexed and checked for duplicate targets, and category rules are
/// checked against their configs and each other.
///
/// # Directory Structure
///
/// ```text
/// config/default/
/// ├── engine.yaml          # Log level, ingestion and calculation settings
/// ├── field_mappings.yaml  # Raw column to canonical field mappings
/// ├── contributions.yaml   # Contribution configs
/// ├── category_rules.yaml  # Effective-dated personnel category rules
/// └── employees.yaml       # Employee master (optional)
/// ```
///
/// # Example
///
/// ```no_run
/// use payroll_engine::config::ConfigLoader;
/// use payroll_engine::models::ContributionType;
/// use chrono::NaiveDate;
///
/// let loader = ConfigLoader::load("./config/default").unwrap();
///
/// let date = NaiveDate::from_ymd_opt(2024, 8, 1).unwrap();
/// let resolved = loader
///     .rule_book()
///     .resolve("staff", ContributionType::HousingFund, date)
///     .unwrap();
/// println!("Housing fund config: {}", resolved.config.name);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    settings: EngineSettings,
    field_mappings: FieldMappingSet,
    rule_book: RuleBook,
    employees: Vec<Employee>,
}

impl ConfigLoader {
    /// Loads configuration from the specified directory.
    ///
    /// # Returns
    ///
    /// Returns a `ConfigLoader` instance on success, or an error if:
    /// - Any required file is missing
    /// - Any file contains invalid YAML
    /// - Two mappings share a target field
    /// - A category rule references an unknown config, or overlaps or
    ///   duplicates another rule
    pub fn load<P: AsRef<Path>>(path: P) -> PayrollResult<Self> {
        let path = path.as_ref();

        let settings = Self::load_yaml::<EngineSettings>(&path.join("engine.yaml"))?;

        let mappings = Self::load_yaml::<FieldMappingsConfig>(&path.join("field_mappings.yaml"))?;
        let field_mappings = FieldMappingSet::build(mappings.mappings, mappings.ignored_columns)?;

        let contributions =
            Self::load_yaml::<ContributionsConfig>(&path.join("contributions.yaml"))?;
        let rules = Self::load_yaml::<CategoryRulesConfig>(&path.join("category_rules.yaml"))?;
        let rule_book = RuleBook::build(contributions.contributions, rules.rules)?;

        let employees_path = path.join("employees.yaml");
        let employees = if employees_path.exists() {
            Self::load_yaml::<EmployeesConfig>(&employees_path)?.employees
        } else {
            Vec::new()
        };

        Ok(Self {
            settings,
            field_mappings,
            rule_book,
            employees,
        })
    }

    /// Loads and parses a YAML file.
    fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> PayrollResult<T> {
        let path_str = path.display().to_string();

        let content = fs::read_to_string(path).map_err(|_| PayrollError::ConfigNotFound {
            path: path_str.clone(),
        })?;

        serde_yaml::from_str(&content).map_err(|e| PayrollError::ConfigParseError {
            path: path_str,
            message: e.to_string(),
        })
    }

    /// Returns the engine settings.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Returns the validated field mappings.
    pub fn field_mappings(&self) -> &FieldMappingSet {
        &self.field_mappings
    }

    /// Returns the validated contribution configs and rules.
    pub fn rule_book(&self) -> &RuleBook {
        &self.rule_book
    }

    /// Returns the employee master.
    pub fn employees(&self) -> &[Employee] {
        &self.employees
    }
}
