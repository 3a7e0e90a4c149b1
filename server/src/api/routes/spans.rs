//! Span ingestion endpoints

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use uuid::Uuid;

use crate::api::extractors::ValidatedJson;
use crate::api::types::ApiError;
use crate::data::types::{Span, SpanUpdate, SpanWrite};
use crate::domain::SpanService;

/// Shared state for span endpoints
#[derive(Clone)]
pub struct SpansApiState {
    pub spans: Arc<SpanService>,
}

/// Build span ingestion routes
pub fn routes(spans: Arc<SpanService>) -> Router<()> {
    Router::new()
        .route("/", post(create_span))
        .route("/{span_id}", get(get_span).patch(update_span))
        .with_state(SpansApiState { spans })
}

/// Response for a partial update: the merged record plus the fields the
/// merge actually changed
#[derive(Debug, Serialize)]
pub struct SpanUpdateResponse {
    pub span: Span,
    pub changed_fields: Vec<&'static str>,
}

/// Ingest a new span
#[utoipa::path(
    post,
    path = "/api/v1/spans",
    tag = "spans",
    responses(
        (status = 201, description = "Span created"),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Span id already exists or project references disagree")
    )
)]
pub async fn create_span(
    State(state): State<SpansApiState>,
    ValidatedJson(body): ValidatedJson<SpanWrite>,
) -> Result<(StatusCode, Json<Span>), ApiError> {
    let span = state.spans.create(body)?;
    Ok((StatusCode::CREATED, Json(span)))
}

/// Fetch a span by id
#[utoipa::path(
    get,
    path = "/api/v1/spans/{span_id}",
    tag = "spans",
    params(("span_id" = Uuid, Path, description = "Span id")),
    responses(
        (status = 200, description = "The span"),
        (status = 404, description = "Unknown span id")
    )
)]
pub async fn get_span(
    State(state): State<SpansApiState>,
    Path(span_id): Path<Uuid>,
) -> Result<Json<Span>, ApiError> {
    Ok(Json(state.spans.get(span_id)?))
}

/// Apply a partial update to a span.
///
/// Missing fields are left untouched; explicit nulls clear. The response
/// reports which fields actually changed.
#[utoipa::path(
    patch,
    path = "/api/v1/spans/{span_id}",
    tag = "spans",
    params(("span_id" = Uuid, Path, description = "Span id")),
    responses(
        (status = 200, description = "Merged span and changed fields"),
        (status = 400, description = "Validation failed on the merged record"),
        (status = 404, description = "Unknown span id"),
        (status = 409, description = "Update disagrees with the span's project, trace, or parent")
    )
)]
pub async fn update_span(
    State(state): State<SpansApiState>,
    Path(span_id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<SpanUpdate>,
) -> Result<Json<SpanUpdateResponse>, ApiError> {
    let (span, changed) = state.spans.patch(span_id, body)?;
    Ok(Json(SpanUpdateResponse {
        span,
        changed_fields: changed.iter().map(|f| f.as_str()).collect(),
    }))
}
