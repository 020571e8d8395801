//! Application state for the payroll engine API.
//!
//! This module wires the configured mapping table, employee master, rule
//! book and staging store into the services the handlers share.

use std::sync::Arc;

use crate::config::ConfigLoader;
use crate::ingestion::{Ingestor, StagingStore};
use crate::mapping::FieldMappingCatalog;
use crate::matching::{EmployeeDirectory, EmployeeMatcher, InMemoryEmployeeDirectory};
use crate::payroll::{CalculationContext, PayrollOrchestrator};

/// Shared application state.
///
/// Ingestion and calculation read the same staging store and employee
/// directory, so rows imported over HTTP feed the runs calculated over HTTP.
#[derive(Clone)]
pub struct AppState {
    ingestor: Arc<Ingestor>,
    orchestrator: Arc<PayrollOrchestrator>,
}

impl AppState {
    /// Builds the services from a loaded configuration.
    pub fn new(config: ConfigLoader) -> Self {
        let directory: Arc<dyn EmployeeDirectory> =
            Arc::new(InMemoryEmployeeDirectory::new(config.employees().to_vec()));
        let staging = Arc::new(StagingStore::new());
        let settings = config.settings().clone();

        let ingestor = Ingestor::new(
            Arc::new(FieldMappingCatalog::new(config.field_mappings().clone())),
            EmployeeMatcher::new(Arc::clone(&directory)),
            Arc::clone(&staging),
            settings.ingestion,
        );
        let context = CalculationContext {
            rules: Arc::new(config.rule_book().clone()),
            directory,
            staging,
        };

        Self {
            ingestor: Arc::new(ingestor),
            orchestrator: Arc::new(PayrollOrchestrator::new(context, settings.calculation)),
        }
    }

    /// The ingestion pipeline.
    pub fn ingestor(&self) -> &Ingestor {
        &self.ingestor
    }

    /// The run orchestrator.
    pub fn orchestrator(&self) -> &PayrollOrchestrator {
        &self.orchestrator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone + Send + Sync + 'static>() {}
        assert_clone::<AppState>();
    }

    #[test]
    fn test_state_shares_one_staging_store() {
        let config = ConfigLoader::load("./config/default").unwrap();
        let state = AppState::new(config);
        assert!(state.ingestor().store().is_empty());
        assert!(state.orchestrator().list_runs().is_empty());
    }
}
