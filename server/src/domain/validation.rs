//! Field-level validation primitives and entity validators
//!
//! The primitives are pure predicates shared by every entity validator; no
//! entity-specific logic lives here beyond composing them. Entity validators
//! run against fully-merged records and collect every violation instead of
//! stopping at the first, so a client can fix a bad payload in one round trip.

use chrono::{DateTime, Utc};
use validator::{ValidationError, ValidationErrors};

use crate::core::config::TimeWindow;
use crate::data::types::{AutomationRuleEvaluator, Span, Trace};
use crate::domain::error::DomainError;

// ============================================================================
// PRIMITIVES
// ============================================================================

/// Passes when the value is non-empty after trimming.
///
/// Absent optional fields are never passed here; the caller (or the
/// `validator` derive, which skips `None`) handles absence.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("not_blank").with_message("must not be blank".into()));
    }
    Ok(())
}

/// Passes when the value is at least `min`.
pub fn min_decimal(value: f64, min: f64) -> Result<(), ValidationError> {
    if value < min {
        return Err(ValidationError::new("min").with_message("below minimum".into()));
    }
    Ok(())
}

/// Passes when the value is a fraction in [0, 1].
pub fn unit_interval(value: f64) -> Result<(), ValidationError> {
    if !(0.0..=1.0).contains(&value) || value.is_nan() {
        return Err(
            ValidationError::new("unit_interval")
                .with_message("must be a fraction in [0, 1]".into()),
        );
    }
    Ok(())
}

/// Passes when the timestamp falls inside the acceptable window around `now`.
///
/// The window bounds come from configuration, not from this module.
pub fn in_range(
    value: DateTime<Utc>,
    window: &TimeWindow,
    now: DateTime<Utc>,
) -> Result<(), ValidationError> {
    if !window.contains(value, now) {
        return Err(ValidationError::new("in_range").with_message("out of range".into()));
    }
    Ok(())
}

// ============================================================================
// VIOLATION COLLECTION
// ============================================================================

/// Accumulates field violations across an entity validator
#[derive(Debug, Default)]
pub struct Violations(ValidationErrors);

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one field check
    pub fn check(&mut self, field: &'static str, result: Result<(), ValidationError>) {
        if let Err(error) = result {
            self.0.add(field.into(), error);
        }
    }

    /// Record a violation directly
    pub fn add(&mut self, field: &'static str, error: ValidationError) {
        self.0.add(field.into(), error);
    }

    /// All-or-nothing: `Ok` only when no field violated its constraints
    pub fn finish(self) -> Result<(), DomainError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(DomainError::Validation(self.0))
        }
    }
}

// ============================================================================
// ENTITY VALIDATORS
// ============================================================================

/// Validate a full span record, typically the output of a merge
pub fn validate_span(span: &Span, window: &TimeWindow) -> Result<(), DomainError> {
    let mut violations = Violations::new();
    let now = Utc::now();

    if let Some(name) = &span.name {
        violations.check("name", not_blank(name));
    }
    if let Some(end_time) = span.end_time {
        violations.check("end_time", in_range(end_time, window, now));
    }
    if let Some(cost) = span.total_estimated_cost {
        violations.check("total_estimated_cost", min_decimal(cost, 0.0));
    }
    if let Some(error_info) = &span.error_info {
        violations.check("error_info.exception_type", not_blank(&error_info.exception_type));
    }

    violations.finish()
}

/// Validate a full trace record, typically the output of a merge
pub fn validate_trace(trace: &Trace, window: &TimeWindow) -> Result<(), DomainError> {
    let mut violations = Violations::new();
    let now = Utc::now();

    if let Some(name) = &trace.name {
        violations.check("name", not_blank(name));
    }
    if let Some(end_time) = trace.end_time {
        violations.check("end_time", in_range(end_time, window, now));
    }
    if let Some(error_info) = &trace.error_info {
        violations.check("error_info.exception_type", not_blank(&error_info.exception_type));
    }

    violations.finish()
}

/// Validate the shared fields of an evaluator, typically after an update merge
pub fn validate_evaluator(rule: &AutomationRuleEvaluator) -> Result<(), DomainError> {
    let mut violations = Violations::new();
    violations.check("name", not_blank(&rule.name));
    violations.check("sampling_rate", unit_interval(rule.sampling_rate));
    violations.finish()
}
