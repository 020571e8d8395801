//! Response types for the payroll engine API.
//!
//! This module defines the error response structures and maps engine errors
//! onto HTTP status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::PayrollError;

/// API error response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional details about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Creates a new API error with details.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: Some(details.into()),
        }
    }

    /// Creates a malformed JSON error response.
    pub fn malformed_json(message: impl Into<String>) -> Self {
        Self::new("MALFORMED_JSON", message)
    }
}

/// API error with HTTP status code.
#[derive(Debug)]
pub struct ApiErrorResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The error body.
    pub error: ApiError,
}

impl ApiErrorResponse {
    /// A 400 response.
    pub fn bad_request(error: ApiError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error,
        }
    }

    /// A 404 response.
    pub fn not_found(code: &str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error: ApiError::new(code, message),
        }
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}

fn status_for(error: &PayrollError) -> StatusCode {
    match error {
        PayrollError::UnmappedField { .. }
        | PayrollError::ValidationError { .. }
        | PayrollError::CsvParse { .. } => StatusCode::BAD_REQUEST,
        PayrollError::RunNotFound { .. } | PayrollError::BatchNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        PayrollError::RunBusy { .. }
        | PayrollError::RunLocked { .. }
        | PayrollError::InvalidTransition { .. }
        | PayrollError::DuplicateTargetField { .. }
        | PayrollError::DuplicateRule { .. }
        | PayrollError::OverlappingRule { .. } => StatusCode::CONFLICT,
        PayrollError::AmbiguousMatch { .. }
        | PayrollError::UnmatchedRecord { .. }
        | PayrollError::NoApplicableRule { .. }
        | PayrollError::UnknownContributionConfig { .. }
        | PayrollError::CompensationNotFound { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        PayrollError::CalculationTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        PayrollError::CalculationTaskFailed { .. }
        | PayrollError::ConfigNotFound { .. }
        | PayrollError::ConfigParseError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<PayrollError> for ApiErrorResponse {
    fn from(error: PayrollError) -> Self {
        let status = status_for(&error);
        let code = error.reason_code();
        let api_error = match &error {
            PayrollError::RunBusy { .. } => ApiError::with_details(
                code,
                error.to_string(),
                "Retry once the calculation in flight has finished",
            ),
            PayrollError::RunLocked { .. } => ApiError::with_details(
                code,
                error.to_string(),
                "Paid runs cannot be recalculated, reverted or approved",
            ),
            PayrollError::ConfigNotFound { .. } | PayrollError::ConfigParseError { .. } => {
                ApiError::with_details("CONFIG_ERROR", "Configuration error", error.to_string())
            }
            _ => ApiError::new(code, error.to_string()),
        };
        ApiErrorResponse {
            status,
            error: api_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_api_error_serialization() {
        let error = ApiError::new("TEST_ERROR", "Test message");
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("\"code\":\"TEST_ERROR\""));
        assert!(json.contains("\"message\":\"Test message\""));
        assert!(!json.contains("details"));
    }

    #[test]
    fn test_run_busy_is_conflict() {
        let api_error: ApiErrorResponse = PayrollError::RunBusy {
            run_id: Uuid::nil(),
        }
        .into();
        assert_eq!(api_error.status, StatusCode::CONFLICT);
        assert_eq!(api_error.error.code, "RUN_BUSY");
        assert!(api_error.error.details.is_some());
    }

    #[test]
    fn test_run_not_found_is_404() {
        let api_error: ApiErrorResponse = PayrollError::RunNotFound {
            run_id: Uuid::nil(),
        }
        .into();
        assert_eq!(api_error.status, StatusCode::NOT_FOUND);
        assert_eq!(api_error.error.code, "RUN_NOT_FOUND");
    }

    #[test]
    fn test_csv_parse_is_bad_request() {
        let api_error: ApiErrorResponse = PayrollError::CsvParse {
            filename: "hf.csv".to_string(),
            message: "unequal lengths".to_string(),
        }
        .into();
        assert_eq!(api_error.status, StatusCode::BAD_REQUEST);
        assert!(api_error.error.message.contains("hf.csv"));
    }

    #[test]
    fn test_config_errors_are_collapsed() {
        let api_error: ApiErrorResponse = PayrollError::ConfigNotFound {
            path: "/etc/payroll/engine.yaml".to_string(),
        }
        .into();
        assert_eq!(api_error.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api_error.error.code, "CONFIG_ERROR");
        assert!(api_error.error.details.unwrap().contains("engine.yaml"));
    }
}
