//! Trace partial-update merge
//!
//! Same contract as the span merge (`domain::spans::merge`): absent preserves,
//! present replaces, conflicts on cross-project moves, post-merge validation,
//! deterministic output.

use chrono::Utc;
use uuid::Uuid;

use crate::core::config::TimeWindow;
use crate::data::types::{ChangedTraceFields, Trace, TraceField, TraceUpdate};
use crate::domain::error::DomainError;
use crate::domain::validation::validate_trace;

/// Merge `update` into `existing`; see `domain::spans::merge::apply`.
pub fn apply(
    existing: &Trace,
    update: &TraceUpdate,
    update_project: Option<Uuid>,
    window: &TimeWindow,
) -> Result<(Trace, ChangedTraceFields), DomainError> {
    if let Some(project_id) = update_project
        && project_id != existing.project_id
    {
        return Err(DomainError::conflict(
            "update must not move a trace across projects",
        ));
    }

    let mut merged = existing.clone();
    let mut changed = ChangedTraceFields::new();

    if update.name.apply_to(&mut merged.name) {
        changed.insert(TraceField::Name);
    }
    if update.end_time.apply_to(&mut merged.end_time) {
        changed.insert(TraceField::EndTime);
    }
    if update.input.apply_to(&mut merged.input) {
        changed.insert(TraceField::Input);
    }
    if update.output.apply_to(&mut merged.output) {
        changed.insert(TraceField::Output);
    }
    if update.metadata.apply_to(&mut merged.metadata) {
        changed.insert(TraceField::Metadata);
    }
    if update.tags.apply_to(&mut merged.tags) {
        changed.insert(TraceField::Tags);
    }
    if update.error_info.apply_to(&mut merged.error_info) {
        changed.insert(TraceField::ErrorInfo);
    }

    if !changed.is_empty() {
        merged.last_updated_at = Utc::now();
    }

    validate_trace(&merged, window)?;

    Ok((merged, changed))
}

/// Whether this merge completed the trace
pub fn completed(existing: &Trace, merged: &Trace, changed: &ChangedTraceFields) -> bool {
    changed.contains(&TraceField::EndTime)
        && existing.end_time.is_none()
        && merged.end_time.is_some()
}
