//! Project endpoints

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use uuid::Uuid;

use crate::api::extractors::ValidatedJson;
use crate::api::types::ApiError;
use crate::data::store::ProjectStore;
use crate::data::types::{Project, ProjectWrite};

/// Shared state for project endpoints
#[derive(Clone)]
pub struct ProjectsApiState {
    pub projects: Arc<ProjectStore>,
}

/// Build project routes
pub fn routes(projects: Arc<ProjectStore>) -> Router<()> {
    Router::new()
        .route("/", get(list_projects).post(create_project))
        .route("/{project_id}", get(get_project))
        .with_state(ProjectsApiState { projects })
}

/// List all projects
#[utoipa::path(
    get,
    path = "/api/v1/projects",
    tag = "projects",
    responses((status = 200, description = "All projects, oldest first"))
)]
pub async fn list_projects(State(state): State<ProjectsApiState>) -> Json<Vec<Project>> {
    Json(state.projects.list())
}

/// Create (or fetch) a project by name
#[utoipa::path(
    post,
    path = "/api/v1/projects",
    tag = "projects",
    responses(
        (status = 201, description = "Project created or already present"),
        (status = 400, description = "Blank project name")
    )
)]
pub async fn create_project(
    State(state): State<ProjectsApiState>,
    ValidatedJson(body): ValidatedJson<ProjectWrite>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let project = state.projects.get_or_create(&body.name);
    Ok((StatusCode::CREATED, Json(project)))
}

/// Fetch a project by id
#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}",
    tag = "projects",
    params(("project_id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "The project"),
        (status = 404, description = "Unknown project id")
    )
)]
pub async fn get_project(
    State(state): State<ProjectsApiState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Project>, ApiError> {
    state
        .projects
        .get(project_id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found("NOT_FOUND", format!("project not found: {project_id}")))
}
