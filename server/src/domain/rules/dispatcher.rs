//! Rule dispatch
//!
//! Consumes completion events from the ingestion side, decides per rule
//! whether to fire using the deterministic sampler, and emits evaluation jobs
//! on a bounded queue. Executing a job (running the Python metric, calling
//! the judge model) is the external evaluator runtime's job; the dispatcher
//! only hands over the typed code payload and a data snapshot.
//!
//! Failures are rule-scoped: a malformed rule or a vanished project is logged
//! and skipped without aborting sibling rules for the same trace.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::data::cache::RuleCache;
use crate::data::store::{ProjectStore, RuleStore, SpanStore};
use crate::data::types::{AutomationRuleEvaluator, EvaluatorCode, Span, Trace};
use crate::domain::error::DomainError;
use crate::domain::rules::sampler;
use crate::domain::validation::validate_evaluator;

// ============================================================================
// EVENTS AND JOBS
// ============================================================================

/// A span or trace transitioned to complete (`end_time` set)
#[derive(Debug, Clone)]
pub enum CompletionEvent {
    Trace(Trace),
    Span(Span),
}

impl CompletionEvent {
    pub fn project_id(&self) -> Uuid {
        match self {
            Self::Trace(trace) => trace.project_id,
            Self::Span(span) => span.project_id,
        }
    }

    /// The trace identity the sampling decision is keyed by
    pub fn trace_id(&self) -> Uuid {
        match self {
            Self::Trace(trace) => trace.id,
            Self::Span(span) => span.trace_id,
        }
    }
}

/// Job descriptor handed to the external evaluator runtime
#[derive(Debug, Clone, Serialize)]
pub struct EvaluatorJob {
    pub rule_id: Uuid,
    pub rule_name: String,
    pub project_id: Uuid,
    pub trace_id: Uuid,
    /// Resolved data snapshot the evaluator code runs against
    pub snapshot: JsonValue,
    /// Typed code payload, serialized with its `type` discriminant
    #[serde(flatten)]
    pub code: EvaluatorCode,
}

// ============================================================================
// DISPATCHER
// ============================================================================

pub struct RuleDispatcher {
    projects: Arc<ProjectStore>,
    rules: Arc<RuleStore>,
    spans: Arc<SpanStore>,
    cache: Arc<RuleCache>,
    jobs: mpsc::Sender<EvaluatorJob>,
}

impl RuleDispatcher {
    pub fn new(
        projects: Arc<ProjectStore>,
        rules: Arc<RuleStore>,
        spans: Arc<SpanStore>,
        cache: Arc<RuleCache>,
        jobs: mpsc::Sender<EvaluatorJob>,
    ) -> Self {
        Self {
            projects,
            rules,
            spans,
            cache,
            jobs,
        }
    }

    /// Start the dispatcher loop, consuming completion events until shutdown.
    ///
    /// On shutdown the queue is drained with a short timeout so decisions for
    /// already-ingested completions are not lost.
    pub fn start(
        self,
        mut events: mpsc::Receiver<CompletionEvent>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::debug!("RuleDispatcher started");
            let mut shutdown_requested = false;

            loop {
                if shutdown_requested {
                    match tokio::time::timeout(Duration::from_millis(100), events.recv()).await {
                        Ok(Some(event)) => {
                            self.dispatch(&event).await;
                            continue;
                        }
                        _ => break,
                    }
                }

                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::debug!("RuleDispatcher received shutdown, draining...");
                            shutdown_requested = true;
                        }
                    }
                    event = events.recv() => {
                        match event {
                            Some(event) => self.dispatch(&event).await,
                            None => break,
                        }
                    }
                }
            }

            tracing::debug!("RuleDispatcher shutdown complete");
        })
    }

    /// Decide and emit jobs for one completion event
    pub async fn dispatch(&self, event: &CompletionEvent) {
        let project_id = event.project_id();
        let trace_id = event.trace_id();

        if !self.projects.exists(project_id) {
            tracing::warn!(
                project_id = %project_id,
                trace_id = %trace_id,
                "Skipping dispatch, project no longer exists"
            );
            return;
        }

        let rules = self.cache.rules_for(project_id, &self.rules).await;
        if rules.is_empty() {
            return;
        }

        let mut fired = 0usize;
        for rule in rules.iter() {
            // Rule-scoped failure isolation
            match self.dispatch_rule(rule, event) {
                Ok(true) => fired += 1,
                Ok(false) => {}
                Err(error) => {
                    tracing::warn!(
                        rule_id = %rule.id,
                        trace_id = %trace_id,
                        error = %error,
                        "Skipping rule during dispatch"
                    );
                }
            }
        }

        tracing::debug!(
            project_id = %project_id,
            trace_id = %trace_id,
            rules = rules.len(),
            fired,
            "Dispatch decided"
        );
    }

    /// Decide one rule; `Ok(true)` means a job was emitted
    fn dispatch_rule(
        &self,
        rule: &AutomationRuleEvaluator,
        event: &CompletionEvent,
    ) -> Result<bool, DomainError> {
        // A rule that no longer satisfies its own invariants is skipped
        // instead of poisoning the whole batch.
        validate_evaluator(rule)?;

        let trace_id = event.trace_id();
        if !sampler::should_fire(rule, trace_id) {
            return Ok(false);
        }

        let snapshot = self.snapshot(event)?;
        let job = EvaluatorJob {
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            project_id: rule.project_id,
            trace_id,
            snapshot,
            code: rule.code.clone(),
        };

        // Fire-and-forget: a full queue means the evaluator runtime is
        // behind, and deterministic sampling makes a replayed decision safe.
        if let Err(error) = self.jobs.try_send(job) {
            tracing::warn!(
                rule_id = %rule.id,
                trace_id = %trace_id,
                error = %error,
                "Dropping evaluation job, queue full or closed"
            );
        }
        Ok(true)
    }

    /// Build the data snapshot handed to the evaluator runtime
    fn snapshot(&self, event: &CompletionEvent) -> Result<JsonValue, DomainError> {
        let value = match event {
            CompletionEvent::Span(span) => serde_json::json!({ "span": span }),
            CompletionEvent::Trace(trace) => {
                let spans = self.spans.list_by_trace(trace.id);
                serde_json::json!({ "trace": trace, "spans": spans })
            }
        };
        Ok(value)
    }
}
