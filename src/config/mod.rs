//! Configuration loading and management for the payroll engine.
//!
//! This module provides functionality to load engine settings, field
//! mappings, contribution configs, category rules and the employee master
//! from a directory of YAML files.
//!
//! # Example
//!
//! ```no_run
//! use payroll_engine::config::ConfigLoader;
//!
//! let config = ConfigLoader::load("./config/default").unwrap();
//! println!("Loaded {} field mappings", config.field_mappings().len());
//! ```

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{
    CalculationSettings, CategoryRulesConfig, ContributionsConfig, EmployeesConfig,
    EngineSettings, FieldMappingsConfig, IngestionSettings,
};
