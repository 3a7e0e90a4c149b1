//! Unified error type for domain operations
//!
//! Entity-level operations (create, merge) are all-or-nothing: a validation
//! failure carries every violated constraint and nothing is applied. Nothing
//! in this layer retries; merge and sampling are deterministic, so retries are
//! the callers' concern and safe.

use thiserror::Error;
use validator::ValidationErrors;

/// Error taxonomy for span/trace/rule operations
#[derive(Error, Debug)]
pub enum DomainError {
    /// Field-level constraint violations on the (merged) entity; the
    /// operation is rejected atomically and all violations are reported.
    #[error("Validation failed: {}", format_violations(.0))]
    Validation(ValidationErrors),

    /// Update disagrees with the existing resolved project/trace/parent
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Referenced project/span/trace/rule does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Unknown or mismatched variant discriminant, or an unserializable
    /// snapshot
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DomainError {
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<ValidationErrors> for DomainError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

/// Render all field violations as `field: message; field: message`
pub fn format_violations(errors: &ValidationErrors) -> String {
    let mut parts: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                format!("{}: {}", field, message)
            })
        })
        .collect();
    parts.sort();
    parts.join("; ")
}
