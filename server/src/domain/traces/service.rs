//! Trace ingestion service
//!
//! Mirrors the span service: project resolution and validation on create,
//! merge under the per-id guard on update, completion events to the
//! dispatcher. A completed trace is what triggers rule evaluation for the
//! whole call graph.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::core::config::TimeWindow;
use crate::data::store::{ProjectStore, TraceStore};
use crate::data::types::{ChangedTraceFields, Trace, TraceUpdate, TraceWrite};
use crate::domain::error::DomainError;
use crate::domain::rules::CompletionEvent;
use crate::domain::traces::merge;
use crate::domain::validation::{Violations, not_blank, validate_trace};

pub struct TraceService {
    projects: Arc<ProjectStore>,
    traces: Arc<TraceStore>,
    events: mpsc::Sender<CompletionEvent>,
    end_time_window: TimeWindow,
}

impl TraceService {
    pub fn new(
        projects: Arc<ProjectStore>,
        traces: Arc<TraceStore>,
        events: mpsc::Sender<CompletionEvent>,
        end_time_window: TimeWindow,
    ) -> Self {
        Self {
            projects,
            traces,
            events,
            end_time_window,
        }
    }

    /// Create a trace from an ingestion event
    pub fn create(&self, write: TraceWrite) -> Result<Trace, DomainError> {
        let mut violations = Violations::new();
        if let Some(name) = &write.project_name {
            violations.check("project_name", not_blank(name));
        }
        violations.finish()?;

        let project_id = self
            .projects
            .resolve(write.project_name.as_deref(), write.project_id)?;

        let now = Utc::now();
        let trace = Trace {
            id: write.id.unwrap_or_else(Uuid::new_v4),
            project_id,
            name: write.name,
            start_time: write.start_time.unwrap_or(now),
            end_time: write.end_time,
            input: write.input,
            output: write.output,
            metadata: write.metadata,
            tags: write.tags,
            error_info: write.error_info,
            created_at: now,
            last_updated_at: now,
        };
        validate_trace(&trace, &self.end_time_window)?;

        let trace = self.traces.insert_new(trace)?;
        tracing::debug!(trace_id = %trace.id, "Trace created");

        if trace.is_complete() {
            self.emit(CompletionEvent::Trace(trace.clone()));
        }
        Ok(trace)
    }

    pub fn get(&self, id: Uuid) -> Result<Trace, DomainError> {
        self.traces
            .get(id)
            .ok_or_else(|| DomainError::not_found("trace", id))
    }

    /// Apply a partial update to a stored trace
    pub fn patch(
        &self,
        id: Uuid,
        update: TraceUpdate,
    ) -> Result<(Trace, ChangedTraceFields), DomainError> {
        let mut violations = Violations::new();
        if let Some(name) = &update.project_name {
            violations.check("project_name", not_blank(name));
        }
        violations.finish()?;

        let update_project = self
            .projects
            .lookup(update.project_name.as_deref(), update.project_id)?;

        let mut completed = false;
        let (merged, changed) = self.traces.merge_with(id, |existing| {
            let (merged, changed) =
                merge::apply(existing, &update, update_project, &self.end_time_window)?;
            completed = merge::completed(existing, &merged, &changed);
            Ok((merged, changed))
        })?;

        tracing::debug!(
            trace_id = %id,
            changed = %changed.iter().map(|f| f.as_str()).collect::<Vec<_>>().join(","),
            "Trace updated"
        );

        if completed {
            self.emit(CompletionEvent::Trace(merged.clone()));
        }
        Ok((merged, changed))
    }

    fn emit(&self, event: CompletionEvent) {
        if let Err(error) = self.events.try_send(event) {
            tracing::warn!(error = %error, "Dropping completion event, queue full or closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::Patch;
    use chrono::Duration;

    fn service() -> (TraceService, mpsc::Receiver<CompletionEvent>) {
        let projects = Arc::new(ProjectStore::new());
        let traces = Arc::new(TraceStore::new());
        let (tx, rx) = mpsc::channel(16);
        let window = TimeWindow {
            max_past: Duration::hours(720),
            max_future: Duration::minutes(15),
        };
        (TraceService::new(projects, traces, tx, window), rx)
    }

    fn minimal_write() -> TraceWrite {
        TraceWrite {
            id: None,
            project_name: Some("assistant".to_string()),
            project_id: None,
            name: Some("turn".to_string()),
            start_time: None,
            end_time: None,
            input: None,
            output: None,
            metadata: None,
            tags: None,
            error_info: None,
        }
    }

    #[tokio::test]
    async fn test_create_auto_creates_named_project() {
        let (service, _rx) = service();
        let trace = service.create(minimal_write()).unwrap();
        assert_eq!(
            service.projects.get(trace.project_id).unwrap().name,
            "assistant"
        );
    }

    #[tokio::test]
    async fn test_close_emits_completion_event() {
        let (service, mut rx) = service();
        let trace = service.create(minimal_write()).unwrap();
        assert!(rx.try_recv().is_err());

        let update = TraceUpdate {
            end_time: Patch::Value(Utc::now()),
            output: Patch::Value(serde_json::json!({"answer": "ok"})),
            ..TraceUpdate::default()
        };
        let (merged, _changed) = service.patch(trace.id, update).unwrap();
        assert!(merged.is_complete());

        match rx.try_recv().unwrap() {
            CompletionEvent::Trace(emitted) => assert_eq!(emitted.id, trace.id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_patch_preserves_absent_fields() {
        let (service, _rx) = service();
        let mut write = minimal_write();
        write.input = Some(serde_json::json!({"q": "hello"}));
        let trace = service.create(write).unwrap();

        let update = TraceUpdate {
            output: Patch::Value(serde_json::json!({"a": "hi"})),
            ..TraceUpdate::default()
        };
        let (merged, _) = service.patch(trace.id, update).unwrap();
        assert_eq!(merged.input, Some(serde_json::json!({"q": "hello"})));
        assert_eq!(merged.name.as_deref(), Some("turn"));
    }

    #[tokio::test]
    async fn test_blank_project_name_fails_validation() {
        let (service, _rx) = service();
        let mut write = minimal_write();
        write.project_name = Some(" \t ".to_string());
        assert!(matches!(
            service.create(write).unwrap_err(),
            DomainError::Validation(_)
        ));
    }
}
