//! HTTP API module for the payroll engine.
//!
//! This module exposes staging ingestion and the payroll run lifecycle as
//! REST endpoints.

mod handlers;
mod request;
mod response;
mod state;

pub use handlers::create_router;
pub use request::{CalculateRequest, CreateRunRequest, ImportQuery};
pub use response::{ApiError, ApiErrorResponse};
pub use state::AppState;
