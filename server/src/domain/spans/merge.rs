//! Span partial-update merge
//!
//! Applies a [`SpanUpdate`] onto a stored [`Span`], producing the merged
//! record and the set of fields that actually changed. The contract:
//!
//! - fields absent from the update leave the stored value untouched; fields
//!   present (including explicit null / explicit empty) replace it
//! - an update never moves a span to another project, trace, or parent
//! - validators run against the merged record before it is accepted, so a
//!   rejected merge is never partially applied
//!
//! Given the same base span and update, the merge is deterministic, which
//! keeps external retries safe.

use chrono::Utc;
use uuid::Uuid;

use crate::core::config::TimeWindow;
use crate::data::types::{ChangedFields, Span, SpanField, SpanType, SpanUpdate};
use crate::domain::error::DomainError;
use crate::domain::validation::validate_span;

/// Merge `update` into `existing`.
///
/// `update_project` is the project id resolved from the update payload's
/// `project_name`/`project_id`, or `None` when the payload carried neither
/// (in which case the span's project is simply retained).
pub fn apply(
    existing: &Span,
    update: &SpanUpdate,
    update_project: Option<Uuid>,
    window: &TimeWindow,
) -> Result<(Span, ChangedFields), DomainError> {
    if update.trace_id != existing.trace_id {
        return Err(DomainError::conflict(format!(
            "span belongs to trace {}, update targets trace {}",
            existing.trace_id, update.trace_id
        )));
    }
    if let Some(project_id) = update_project
        && project_id != existing.project_id
    {
        return Err(DomainError::conflict(
            "update must not move a span across projects",
        ));
    }

    let mut merged = existing.clone();
    let mut changed = ChangedFields::new();

    // A parent can be attached once but never re-attached elsewhere.
    if let Some(parent) = update.parent_span_id {
        match existing.parent_span_id {
            Some(current) if current != parent => {
                return Err(DomainError::conflict(
                    "update must not move a span under a different parent",
                ));
            }
            Some(_) => {}
            None => {
                merged.parent_span_id = Some(parent);
                changed.insert(SpanField::ParentSpanId);
            }
        }
    }

    if update.name.apply_to(&mut merged.name) {
        changed.insert(SpanField::Name);
    }

    // `type` is required-with-default on the record, so an explicit null
    // resets it to the default rather than clearing it.
    match &update.span_type {
        p if p.is_absent() => {}
        p => {
            let next = p.value().copied().unwrap_or(SpanType::default());
            if merged.span_type != next {
                merged.span_type = next;
                changed.insert(SpanField::Type);
            }
        }
    }

    if update.end_time.apply_to(&mut merged.end_time) {
        changed.insert(SpanField::EndTime);
    }
    if update.input.apply_to(&mut merged.input) {
        changed.insert(SpanField::Input);
    }
    if update.output.apply_to(&mut merged.output) {
        changed.insert(SpanField::Output);
    }
    if update.metadata.apply_to(&mut merged.metadata) {
        changed.insert(SpanField::Metadata);
    }
    if update.model.apply_to(&mut merged.model) {
        changed.insert(SpanField::Model);
    }
    if update.provider.apply_to(&mut merged.provider) {
        changed.insert(SpanField::Provider);
    }
    if update.tags.apply_to(&mut merged.tags) {
        changed.insert(SpanField::Tags);
    }
    if update.usage.apply_to(&mut merged.usage) {
        changed.insert(SpanField::Usage);
    }
    if update.total_estimated_cost.apply_to(&mut merged.total_estimated_cost) {
        changed.insert(SpanField::TotalEstimatedCost);
    }
    if update.error_info.apply_to(&mut merged.error_info) {
        changed.insert(SpanField::ErrorInfo);
    }

    if !changed.is_empty() {
        merged.last_updated_at = Utc::now();
    }

    validate_span(&merged, window)?;

    Ok((merged, changed))
}

/// Whether this merge completed the span: `end_time` transitioned from unset
/// to set.
pub fn completed(existing: &Span, merged: &Span, changed: &ChangedFields) -> bool {
    changed.contains(&SpanField::EndTime) && existing.end_time.is_none() && merged.end_time.is_some()
}
