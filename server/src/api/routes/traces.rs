//! Trace ingestion endpoints

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use uuid::Uuid;

use crate::api::extractors::ValidatedJson;
use crate::api::types::ApiError;
use crate::data::types::{Trace, TraceUpdate, TraceWrite};
use crate::domain::TraceService;

/// Shared state for trace endpoints
#[derive(Clone)]
pub struct TracesApiState {
    pub traces: Arc<TraceService>,
}

/// Build trace ingestion routes
pub fn routes(traces: Arc<TraceService>) -> Router<()> {
    Router::new()
        .route("/", post(create_trace))
        .route("/{trace_id}", get(get_trace).patch(update_trace))
        .with_state(TracesApiState { traces })
}

#[derive(Debug, Serialize)]
pub struct TraceUpdateResponse {
    pub trace: Trace,
    pub changed_fields: Vec<&'static str>,
}

/// Ingest a new trace
#[utoipa::path(
    post,
    path = "/api/v1/traces",
    tag = "traces",
    responses(
        (status = 201, description = "Trace created"),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Trace id already exists or project references disagree")
    )
)]
pub async fn create_trace(
    State(state): State<TracesApiState>,
    ValidatedJson(body): ValidatedJson<TraceWrite>,
) -> Result<(StatusCode, Json<Trace>), ApiError> {
    let trace = state.traces.create(body)?;
    Ok((StatusCode::CREATED, Json(trace)))
}

/// Fetch a trace by id
#[utoipa::path(
    get,
    path = "/api/v1/traces/{trace_id}",
    tag = "traces",
    params(("trace_id" = Uuid, Path, description = "Trace id")),
    responses(
        (status = 200, description = "The trace"),
        (status = 404, description = "Unknown trace id")
    )
)]
pub async fn get_trace(
    State(state): State<TracesApiState>,
    Path(trace_id): Path<Uuid>,
) -> Result<Json<Trace>, ApiError> {
    Ok(Json(state.traces.get(trace_id)?))
}

/// Apply a partial update to a trace; closing a trace (setting `end_time`)
/// is what triggers rule evaluation.
#[utoipa::path(
    patch,
    path = "/api/v1/traces/{trace_id}",
    tag = "traces",
    params(("trace_id" = Uuid, Path, description = "Trace id")),
    responses(
        (status = 200, description = "Merged trace and changed fields"),
        (status = 400, description = "Validation failed on the merged record"),
        (status = 404, description = "Unknown trace id"),
        (status = 409, description = "Update disagrees with the trace's project")
    )
)]
pub async fn update_trace(
    State(state): State<TracesApiState>,
    Path(trace_id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<TraceUpdate>,
) -> Result<Json<TraceUpdateResponse>, ApiError> {
    let (trace, changed) = state.traces.patch(trace_id, body)?;
    Ok(Json(TraceUpdateResponse {
        trace,
        changed_fields: changed.iter().map(|f| f.as_str()).collect(),
    }))
}
