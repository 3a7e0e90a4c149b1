//! Span ingestion service
//!
//! Entry point for span create/update events. Creates run project
//! resolution and validation before the record lands in the store; updates
//! run the merge engine under the store's per-id guard. Completions are
//! forwarded to the rule dispatcher as events.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::core::config::TimeWindow;
use crate::data::store::{ProjectStore, SpanStore};
use crate::data::types::{ChangedFields, Span, SpanUpdate, SpanWrite};
use crate::domain::error::DomainError;
use crate::domain::rules::CompletionEvent;
use crate::domain::spans::merge;
use crate::domain::validation::{Violations, not_blank, validate_span};

pub struct SpanService {
    projects: Arc<ProjectStore>,
    spans: Arc<SpanStore>,
    events: mpsc::Sender<CompletionEvent>,
    end_time_window: TimeWindow,
}

impl SpanService {
    pub fn new(
        projects: Arc<ProjectStore>,
        spans: Arc<SpanStore>,
        events: mpsc::Sender<CompletionEvent>,
        end_time_window: TimeWindow,
    ) -> Self {
        Self {
            projects,
            spans,
            events,
            end_time_window,
        }
    }

    /// Create a span from an ingestion event
    pub fn create(&self, write: SpanWrite) -> Result<Span, DomainError> {
        let mut violations = Violations::new();
        if let Some(name) = &write.project_name {
            violations.check("project_name", not_blank(name));
        }
        violations.finish()?;

        let project_id = self
            .projects
            .resolve(write.project_name.as_deref(), write.project_id)?;

        let now = Utc::now();
        let span = Span {
            id: write.id.unwrap_or_else(Uuid::new_v4),
            project_id,
            trace_id: write.trace_id,
            parent_span_id: write.parent_span_id,
            name: write.name,
            span_type: write.span_type,
            start_time: write.start_time.unwrap_or(now),
            end_time: write.end_time,
            input: write.input,
            output: write.output,
            metadata: write.metadata,
            model: write.model,
            provider: write.provider,
            tags: write.tags,
            usage: write.usage,
            total_estimated_cost: write.total_estimated_cost,
            error_info: write.error_info,
            created_at: now,
            last_updated_at: now,
        };
        validate_span(&span, &self.end_time_window)?;

        let span = self.spans.insert_new(span)?;
        tracing::debug!(span_id = %span.id, trace_id = %span.trace_id, "Span created");

        // A span can arrive already complete
        if span.is_complete() {
            self.emit(CompletionEvent::Span(span.clone()));
        }
        Ok(span)
    }

    pub fn get(&self, id: Uuid) -> Result<Span, DomainError> {
        self.spans
            .get(id)
            .ok_or_else(|| DomainError::not_found("span", id))
    }

    /// Apply a partial update to a stored span.
    ///
    /// Returns the merged span and the set of fields that actually changed.
    pub fn patch(
        &self,
        id: Uuid,
        update: SpanUpdate,
    ) -> Result<(Span, ChangedFields), DomainError> {
        let mut violations = Violations::new();
        if let Some(name) = &update.project_name {
            violations.check("project_name", not_blank(name));
        }
        violations.finish()?;

        let update_project = self
            .projects
            .lookup(update.project_name.as_deref(), update.project_id)?;

        let mut completed = false;
        let (merged, changed) = self.spans.merge_with(id, |existing| {
            let (merged, changed) =
                merge::apply(existing, &update, update_project, &self.end_time_window)?;
            completed = merge::completed(existing, &merged, &changed);
            Ok((merged, changed))
        })?;

        tracing::debug!(
            span_id = %id,
            changed = %changed.iter().map(|f| f.as_str()).collect::<Vec<_>>().join(","),
            "Span updated"
        );

        if completed {
            self.emit(CompletionEvent::Span(merged.clone()));
        }
        Ok((merged, changed))
    }

    fn emit(&self, event: CompletionEvent) {
        if let Err(error) = self.events.try_send(event) {
            tracing::warn!(error = %error, "Dropping completion event, queue full or closed");
        }
    }
}
