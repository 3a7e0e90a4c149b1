//! Evaluator rule management endpoints, scoped to a project
//!
//! The `type` discriminant in request and response bodies selects the
//! concrete `code` payload shape; an unknown discriminant is rejected at
//! deserialization time.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use uuid::Uuid;

use crate::api::extractors::ValidatedJson;
use crate::api::types::ApiError;
use crate::data::types::{AutomationRuleEvaluator, AutomationRuleEvaluatorUpdate, EvaluatorWrite};
use crate::domain::RuleService;

/// Shared state for evaluator endpoints
#[derive(Clone)]
pub struct EvaluatorsApiState {
    pub rules: Arc<RuleService>,
}

/// Build evaluator routes (nested under `/projects/{project_id}/evaluators`)
pub fn routes(rules: Arc<RuleService>) -> Router<()> {
    Router::new()
        .route("/", get(list_evaluators).post(create_evaluator))
        .route(
            "/{evaluator_id}",
            get(get_evaluator)
                .patch(update_evaluator)
                .delete(delete_evaluator),
        )
        .with_state(EvaluatorsApiState { rules })
}

/// List the evaluators of a project
#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/evaluators",
    tag = "evaluators",
    params(("project_id" = Uuid, Path, description = "Owning project")),
    responses(
        (status = 200, description = "All evaluators of the project, oldest first"),
        (status = 404, description = "Unknown project")
    )
)]
pub async fn list_evaluators(
    State(state): State<EvaluatorsApiState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Vec<AutomationRuleEvaluator>>, ApiError> {
    Ok(Json(state.rules.list(project_id)?))
}

/// Create an evaluator under a project
#[utoipa::path(
    post,
    path = "/api/v1/projects/{project_id}/evaluators",
    tag = "evaluators",
    params(("project_id" = Uuid, Path, description = "Owning project")),
    responses(
        (status = 201, description = "Evaluator created"),
        (status = 400, description = "Validation failed or unknown evaluator type"),
        (status = 404, description = "Unknown project")
    )
)]
pub async fn create_evaluator(
    State(state): State<EvaluatorsApiState>,
    Path(project_id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<EvaluatorWrite>,
) -> Result<(StatusCode, Json<AutomationRuleEvaluator>), ApiError> {
    let rule = state.rules.create(project_id, body).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

/// Fetch an evaluator
#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/evaluators/{evaluator_id}",
    tag = "evaluators",
    params(
        ("project_id" = Uuid, Path, description = "Owning project"),
        ("evaluator_id" = Uuid, Path, description = "Evaluator id")
    ),
    responses(
        (status = 200, description = "The evaluator"),
        (status = 404, description = "Unknown evaluator for this project")
    )
)]
pub async fn get_evaluator(
    State(state): State<EvaluatorsApiState>,
    Path((project_id, evaluator_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<AutomationRuleEvaluator>, ApiError> {
    Ok(Json(state.rules.get(project_id, evaluator_id)?))
}

/// Apply a partial update to an evaluator; the variant is fixed at creation
#[utoipa::path(
    patch,
    path = "/api/v1/projects/{project_id}/evaluators/{evaluator_id}",
    tag = "evaluators",
    params(
        ("project_id" = Uuid, Path, description = "Owning project"),
        ("evaluator_id" = Uuid, Path, description = "Evaluator id")
    ),
    responses(
        (status = 200, description = "Merged evaluator"),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Unknown evaluator for this project"),
        (status = 409, description = "Update supplies a different evaluator type")
    )
)]
pub async fn update_evaluator(
    State(state): State<EvaluatorsApiState>,
    Path((project_id, evaluator_id)): Path<(Uuid, Uuid)>,
    ValidatedJson(body): ValidatedJson<AutomationRuleEvaluatorUpdate>,
) -> Result<Json<AutomationRuleEvaluator>, ApiError> {
    Ok(Json(
        state.rules.update(project_id, evaluator_id, body).await?,
    ))
}

/// Delete an evaluator
#[utoipa::path(
    delete,
    path = "/api/v1/projects/{project_id}/evaluators/{evaluator_id}",
    tag = "evaluators",
    params(
        ("project_id" = Uuid, Path, description = "Owning project"),
        ("evaluator_id" = Uuid, Path, description = "Evaluator id")
    ),
    responses(
        (status = 204, description = "Evaluator deleted"),
        (status = 404, description = "Unknown evaluator for this project")
    )
)]
pub async fn delete_evaluator(
    State(state): State<EvaluatorsApiState>,
    Path((project_id, evaluator_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    state.rules.delete(project_id, evaluator_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
