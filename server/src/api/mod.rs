//! HTTP surface
//!
//! Thin axum layer over the domain services: ingestion (spans, traces), rule
//! management (evaluators), projects, and system endpoints.

pub mod extractors;
pub mod openapi;
pub mod routes;
pub mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::core::config::ServerConfig;
use crate::core::shutdown::ShutdownService;
use crate::data::store::ProjectStore;
use crate::domain::{RuleService, SpanService, TraceService};

pub use types::ApiError;

/// HTTP server over the domain services
pub struct ApiServer {
    config: ServerConfig,
    router: Router,
    shutdown: ShutdownService,
}

impl ApiServer {
    pub fn new(
        config: ServerConfig,
        shutdown: ShutdownService,
        projects: Arc<ProjectStore>,
        spans: Arc<SpanService>,
        traces: Arc<TraceService>,
        rules: Arc<RuleService>,
    ) -> Self {
        let router = Router::new()
            .route("/health", get(routes::health::health))
            .route(
                "/api/openapi.json",
                get(|| async { Json(openapi::ApiDoc::openapi()) }),
            )
            .nest("/api/v1/spans", routes::spans::routes(spans))
            .nest("/api/v1/traces", routes::traces::routes(traces))
            .nest("/api/v1/projects", routes::projects::routes(projects))
            .nest(
                "/api/v1/projects/{project_id}/evaluators",
                routes::evaluators::routes(rules),
            )
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive());

        Self {
            config,
            router,
            shutdown,
        }
    }

    /// Bind and serve until the shutdown signal fires
    pub async fn start(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;

        tracing::info!(addr, "HTTP server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(self.shutdown.wait())
            .await
            .context("HTTP server error")?;

        Ok(())
    }
}
