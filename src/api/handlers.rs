//! HTTP request handlers for the payroll engine API.
//!
//! This module contains the handler functions for all API endpoints.

use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::PayrollResult;
use crate::ingestion::{IngestReport, RematchReport};
use crate::models::{ImportBatch, PayrollEntry, PayrollRun, SourceType, StagingRecord};
use crate::payroll::{CalculationOutcome, PayrollOrchestrator};

use super::request::{CalculateRequest, CreateRunRequest, ImportQuery};
use super::response::{ApiError, ApiErrorResponse};
use super::state::AppState;

type ApiResult<T> = Result<(StatusCode, Json<T>), ApiErrorResponse>;

/// Creates the API router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/imports", post(import_handler))
        .route("/imports/:batch_id", get(batch_handler))
        .route("/imports/:batch_id/rematch", post(rematch_handler))
        .route("/runs", post(create_run_handler).get(list_runs_handler))
        .route("/runs/:run_id", get(run_handler))
        .route("/runs/:run_id/entries", get(entries_handler))
        .route("/runs/:run_id/entries/:employee_id", get(entry_handler))
        .route("/runs/:run_id/calculate", post(calculate_handler))
        .route("/runs/:run_id/approve", post(approve_handler))
        .route("/runs/:run_id/revert", post(revert_handler))
        .route("/runs/:run_id/pay", post(pay_handler))
        .with_state(state)
}

/// A batch together with its staging records.
#[derive(Debug, Serialize)]
struct BatchDetails {
    batch: ImportBatch,
    records: Vec<StagingRecord>,
}

fn json_rejection(correlation_id: Uuid, rejection: JsonRejection) -> ApiErrorResponse {
    let error = match rejection {
        JsonRejection::JsonDataError(err) => {
            let body_text = err.body_text();
            warn!(correlation_id = %correlation_id, error = %body_text, "JSON data error");
            ApiError::new("VALIDATION_ERROR", body_text)
        }
        JsonRejection::JsonSyntaxError(err) => {
            warn!(correlation_id = %correlation_id, error = %err, "JSON syntax error");
            ApiError::malformed_json(format!("Invalid JSON syntax: {}", err))
        }
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::new("MISSING_CONTENT_TYPE", "Content-Type must be application/json")
        }
        _ => ApiError::malformed_json("Failed to parse request body"),
    };
    ApiErrorResponse::bad_request(error)
}

fn path_id(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, ApiErrorResponse> {
    path.map(|Path(id)| id)
        .map_err(|rejection| ApiErrorResponse::bad_request(ApiError::new("VALIDATION_ERROR", rejection.body_text())))
}

/// Handler for `POST /imports?source_type=&filename=`.
///
/// The request body is the raw CSV file. A file identical to one already
/// ingested under the same name answers 200 with the earlier batch; a new
/// batch answers 201.
async fn import_handler(
    State(state): State<AppState>,
    query: Result<Query<ImportQuery>, QueryRejection>,
    body: Bytes,
) -> ApiResult<IngestReport> {
    let correlation_id = Uuid::new_v4();
    let Query(query) = query.map_err(|rejection| {
        warn!(correlation_id = %correlation_id, error = %rejection.body_text(), "Bad import query");
        ApiErrorResponse::bad_request(ApiError::new("VALIDATION_ERROR", rejection.body_text()))
    })?;
    let source_type: SourceType = query.source_type.parse()?;
    info!(
        correlation_id = %correlation_id,
        source_type = %source_type,
        filename = %query.filename,
        bytes = body.len(),
        "Processing import request"
    );

    let start_time = Instant::now();
    let report = state
        .ingestor()
        .ingest(source_type, &query.filename, body.as_ref())
        .inspect_err(|err| warn!(correlation_id = %correlation_id, error = %err, "Import failed"))?;
    info!(
        correlation_id = %correlation_id,
        batch_id = %report.batch_id,
        total_rows = report.total_rows,
        invalid = report.invalid,
        unmatched = report.unmatched,
        duplicate = report.duplicate,
        duration_us = start_time.elapsed().as_micros(),
        "Import completed"
    );

    let status = if report.duplicate {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(report)))
}

/// Handler for `GET /imports/{batch_id}`.
async fn batch_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<BatchDetails> {
    let batch_id = path_id(path)?;
    let store = state.ingestor().store();
    let batch = store.batch(batch_id).ok_or_else(|| {
        ApiErrorResponse::not_found("BATCH_NOT_FOUND", format!("Import batch not found: {batch_id}"))
    })?;
    let records = store.records_for_batch(batch_id);
    Ok((StatusCode::OK, Json(BatchDetails { batch, records })))
}

/// Handler for `POST /imports/{batch_id}/rematch`.
async fn rematch_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<RematchReport> {
    let batch_id = path_id(path)?;
    let report = state.ingestor().rematch(batch_id)?;
    info!(
        batch_id = %batch_id,
        newly_matched = report.newly_matched,
        still_unmatched = report.still_unmatched,
        "Rematch completed"
    );
    Ok((StatusCode::OK, Json(report)))
}

/// Handler for `POST /runs`.
async fn create_run_handler(
    State(state): State<AppState>,
    payload: Result<Json<CreateRunRequest>, JsonRejection>,
) -> ApiResult<PayrollRun> {
    let correlation_id = Uuid::new_v4();
    let Json(request) = payload.map_err(|rejection| json_rejection(correlation_id, rejection))?;
    let run = state
        .orchestrator()
        .create_run(request.pay_period, request.effective_date);
    info!(correlation_id = %correlation_id, run_id = %run.id, "Run created");
    Ok((StatusCode::CREATED, Json(run)))
}

/// Handler for `GET /runs`.
async fn list_runs_handler(State(state): State<AppState>) -> ApiResult<Vec<PayrollRun>> {
    Ok((StatusCode::OK, Json(state.orchestrator().list_runs())))
}

/// Handler for `GET /runs/{run_id}`.
async fn run_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<PayrollRun> {
    let run_id = path_id(path)?;
    Ok((StatusCode::OK, Json(state.orchestrator().run(run_id)?)))
}

/// Handler for `GET /runs/{run_id}/entries`.
async fn entries_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Vec<PayrollEntry>> {
    let run_id = path_id(path)?;
    Ok((StatusCode::OK, Json(state.orchestrator().entries(run_id)?)))
}

/// Handler for `GET /runs/{run_id}/entries/{employee_id}`.
async fn entry_handler(
    State(state): State<AppState>,
    path: Result<Path<(Uuid, String)>, PathRejection>,
) -> ApiResult<PayrollEntry> {
    let Path((run_id, employee_id)) = path.map_err(|rejection| {
        ApiErrorResponse::bad_request(ApiError::new("VALIDATION_ERROR", rejection.body_text()))
    })?;
    let entry = state
        .orchestrator()
        .entry(run_id, &employee_id)?
        .ok_or_else(|| {
            ApiErrorResponse::not_found(
                "ENTRY_NOT_FOUND",
                format!("No entry for employee '{employee_id}' in run {run_id}"),
            )
        })?;
    Ok((StatusCode::OK, Json(entry)))
}

/// Handler for `POST /runs/{run_id}/calculate`.
///
/// The body `{"recompute": true}` is optional. The calculation is dropped
/// with the request if the client goes away, which returns the run to draft.
async fn calculate_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Bytes,
) -> ApiResult<CalculationOutcome> {
    let correlation_id = Uuid::new_v4();
    let run_id = path_id(path)?;
    let request: CalculateRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CalculateRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|err| {
            warn!(correlation_id = %correlation_id, error = %err, "Bad calculate body");
            ApiErrorResponse::bad_request(ApiError::malformed_json(err.to_string()))
        })?
    };
    info!(
        correlation_id = %correlation_id,
        run_id = %run_id,
        recompute = request.recompute,
        "Processing calculate request"
    );

    let start_time = Instant::now();
    let outcome = state
        .orchestrator()
        .calculate_run(run_id, request.recompute)
        .await
        .inspect_err(|err| warn!(correlation_id = %correlation_id, error = %err, "Calculation refused"))?;
    info!(
        correlation_id = %correlation_id,
        run_id = %run_id,
        status = %outcome.status,
        failures = outcome.failures.len(),
        reused = outcome.reused,
        total_net_pay = %outcome.totals.total_net_pay,
        duration_us = start_time.elapsed().as_micros(),
        "Calculate request completed"
    );
    Ok((StatusCode::OK, Json(outcome)))
}

fn transition(
    state: &AppState,
    path: Result<Path<Uuid>, PathRejection>,
    action: &str,
    apply: fn(&PayrollOrchestrator, Uuid) -> PayrollResult<PayrollRun>,
) -> ApiResult<PayrollRun> {
    let run_id = path_id(path)?;
    let run = apply(state.orchestrator(), run_id)
        .inspect_err(|err| warn!(run_id = %run_id, action, error = %err, "Transition refused"))?;
    info!(run_id = %run_id, action, status = %run.status, "Transition applied");
    Ok((StatusCode::OK, Json(run)))
}

/// Handler for `POST /runs/{run_id}/approve`.
async fn approve_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<PayrollRun> {
    transition(&state, path, "approve", PayrollOrchestrator::approve)
}

/// Handler for `POST /runs/{run_id}/revert`.
async fn revert_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<PayrollRun> {
    transition(&state, path, "revert", PayrollOrchestrator::revert)
}

/// Handler for `POST /runs/{run_id}/pay`.
async fn pay_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<PayrollRun> {
    transition(&state, path, "pay", PayrollOrchestrator::pay)
}
