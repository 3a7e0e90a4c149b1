//! Core application

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::api::ApiServer;
use crate::core::cli::{self, CliConfig};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME_LOWER, DEFAULT_PROJECT_NAME, ENV_LOG};
use crate::core::shutdown::ShutdownService;
use crate::data::cache::RuleCache;
use crate::data::store::{ProjectStore, RuleStore, SpanStore, TraceStore};
use crate::domain::rules::{CompletionEvent, EvaluatorJob, RuleDispatcher};
use crate::domain::{RuleService, SpanService, TraceService};

/// Receiver halves of the internal queues, consumed by the background tasks
struct AppChannels {
    events_rx: mpsc::Receiver<CompletionEvent>,
    jobs_rx: mpsc::Receiver<EvaluatorJob>,
}

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub projects: Arc<ProjectStore>,
    pub spans: Arc<SpanStore>,
    pub traces: Arc<TraceStore>,
    pub rules: Arc<RuleStore>,
    pub rule_cache: Arc<RuleCache>,
    pub span_service: Arc<SpanService>,
    pub trace_service: Arc<TraceService>,
    pub rule_service: Arc<RuleService>,
    jobs_tx: mpsc::Sender<EvaluatorJob>,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let cli_config = cli::parse();
        let (app, channels) = Self::init(&cli_config)?;
        Self::start_server(app, channels).await
    }

    fn init(cli: &CliConfig) -> Result<(Self, AppChannels)> {
        let config = AppConfig::load(cli)?;

        let projects = Arc::new(ProjectStore::new());
        // The Default Project exists from the first request on
        let default_project = projects.get_or_create(DEFAULT_PROJECT_NAME);
        tracing::debug!(project_id = %default_project.id, "Default project ready");

        let spans = Arc::new(SpanStore::new());
        let traces = Arc::new(TraceStore::new());
        let rules = Arc::new(RuleStore::new());
        let rule_cache = Arc::new(RuleCache::new(&config.rules));

        let (events_tx, events_rx) = mpsc::channel(config.rules.event_queue_capacity);
        let (jobs_tx, jobs_rx) = mpsc::channel(config.rules.job_queue_capacity);

        let window = config.ingestion.end_time_window();
        let span_service = Arc::new(SpanService::new(
            projects.clone(),
            spans.clone(),
            events_tx.clone(),
            window,
        ));
        let trace_service = Arc::new(TraceService::new(
            projects.clone(),
            traces.clone(),
            events_tx,
            window,
        ));
        let rule_service = Arc::new(RuleService::new(
            projects.clone(),
            rules.clone(),
            rule_cache.clone(),
        ));

        let app = Self {
            shutdown: ShutdownService::new(),
            config,
            projects,
            spans,
            traces,
            rules,
            rule_cache,
            span_service,
            trace_service,
            rule_service,
            jobs_tx,
        };

        Ok((app, AppChannels { events_rx, jobs_rx }))
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    async fn start_server(app: Self, channels: AppChannels) -> Result<()> {
        app.shutdown.install_signal_handlers();
        app.start_background_tasks(channels).await;

        let server = ApiServer::new(
            app.config.server.clone(),
            app.shutdown.clone(),
            app.projects.clone(),
            app.span_service.clone(),
            app.trace_service.clone(),
            app.rule_service.clone(),
        );
        server.start().await?;

        app.shutdown.shutdown().await;
        Ok(())
    }

    async fn start_background_tasks(&self, channels: AppChannels) {
        let dispatcher = RuleDispatcher::new(
            self.projects.clone(),
            self.rules.clone(),
            self.spans.clone(),
            self.rule_cache.clone(),
            self.jobs_tx.clone(),
        );

        self.shutdown
            .register(dispatcher.start(channels.events_rx, self.shutdown.subscribe()))
            .await;

        self.shutdown
            .register(start_job_forwarder(
                channels.jobs_rx,
                self.shutdown.subscribe(),
            ))
            .await;

        tracing::debug!("Background tasks started");
    }
}

/// Forward emitted evaluation jobs to the external evaluator runtime.
///
/// The runtime transport is an external collaborator; this boundary surfaces
/// each job as a structured log event and drops it.
fn start_job_forwarder(
    mut jobs: mpsc::Receiver<EvaluatorJob>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
                job = jobs.recv() => {
                    match job {
                        Some(job) => {
                            tracing::info!(
                                rule_id = %job.rule_id,
                                rule_name = %job.rule_name,
                                project_id = %job.project_id,
                                trace_id = %job.trace_id,
                                r#type = job.code.evaluator_type().as_str(),
                                "Evaluation job emitted"
                            );
                        }
                        None => break,
                    }
                }
            }
        }
        tracing::debug!("Job forwarder shutdown complete");
    })
}
