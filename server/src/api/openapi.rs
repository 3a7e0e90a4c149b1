//! OpenAPI document

use utoipa::OpenApi;

use super::routes;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tracegate API",
        description = "Evaluation-rule subsystem: span/trace ingestion with \
                       partial updates, and automation-rule management"
    ),
    paths(
        routes::health::health,
        routes::spans::create_span,
        routes::spans::get_span,
        routes::spans::update_span,
        routes::traces::create_trace,
        routes::traces::get_trace,
        routes::traces::update_trace,
        routes::projects::list_projects,
        routes::projects::create_project,
        routes::projects::get_project,
        routes::evaluators::list_evaluators,
        routes::evaluators::create_evaluator,
        routes::evaluators::get_evaluator,
        routes::evaluators::update_evaluator,
        routes::evaluators::delete_evaluator,
    ),
    tags(
        (name = "spans", description = "Span ingestion"),
        (name = "traces", description = "Trace ingestion"),
        (name = "projects", description = "Projects"),
        (name = "evaluators", description = "Automation rule evaluators"),
        (name = "system", description = "Health and metadata")
    )
)]
pub struct ApiDoc;
