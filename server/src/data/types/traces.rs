//! Trace record and partial-update types
//!
//! A trace is the root of an LLM call graph; spans nest under it. Traces
//! follow the same create-then-partially-update lifecycle as spans, and a
//! trace completing (`end_time` set) is what triggers rule dispatch.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;
use validator::Validate;

use super::patch::Patch;
use super::spans::ErrorInfo;
use crate::domain::validation::not_blank;

// ============================================================================
// TRACE RECORD
// ============================================================================

/// Full trace record as stored and returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub id: Uuid,
    pub project_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_info: Option<ErrorInfo>,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl Trace {
    /// Whether the trace has been marked complete
    pub fn is_complete(&self) -> bool {
        self.end_time.is_some()
    }
}

// ============================================================================
// TRACE WRITE (create payload)
// ============================================================================

/// Trace create payload; same project-resolution contract as spans.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TraceWrite {
    pub id: Option<Uuid>,
    #[validate(custom(function = "not_blank"))]
    pub project_name: Option<String>,
    pub project_id: Option<Uuid>,
    #[validate(custom(function = "not_blank"))]
    pub name: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub input: Option<JsonValue>,
    pub output: Option<JsonValue>,
    pub metadata: Option<JsonValue>,
    pub tags: Option<BTreeSet<String>>,
    pub error_info: Option<ErrorInfo>,
}

// ============================================================================
// TRACE UPDATE (partial payload)
// ============================================================================

/// Trace partial-update payload; same absent/null/value contract as
/// [`super::spans::SpanUpdate`].
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct TraceUpdate {
    #[validate(custom(function = "not_blank"))]
    pub project_name: Option<String>,
    pub project_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub name: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub end_time: Patch<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub input: Patch<JsonValue>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub output: Patch<JsonValue>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub metadata: Patch<JsonValue>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub tags: Patch<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub error_info: Patch<ErrorInfo>,
}

// ============================================================================
// CHANGED FIELDS
// ============================================================================

/// Trace fields trackable by the merge engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TraceField {
    Name,
    EndTime,
    Input,
    Output,
    Metadata,
    Tags,
    ErrorInfo,
}

impl TraceField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::EndTime => "end_time",
            Self::Input => "input",
            Self::Output => "output",
            Self::Metadata => "metadata",
            Self::Tags => "tags",
            Self::ErrorInfo => "error_info",
        }
    }
}

impl fmt::Display for TraceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type ChangedTraceFields = BTreeSet<TraceField>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_update_absent_vs_null() {
        let update: TraceUpdate =
            serde_json::from_str(r#"{"output": null, "name": "chat"}"#).unwrap();
        assert_eq!(update.name, Patch::Value("chat".to_string()));
        assert!(update.output.is_null());
        assert!(update.input.is_absent());
        assert!(update.end_time.is_absent());
    }

    #[test]
    fn test_trace_write_minimal_payload() {
        let write: TraceWrite = serde_json::from_str("{}").unwrap();
        assert!(write.id.is_none());
        assert!(write.project_name.is_none());
        assert!(write.start_time.is_none());
    }
}
