//! Span record and partial-update types
//!
//! A span is a recorded unit of work inside a trace. It is created by the
//! first ingestion event carrying its id and mutated by partial updates
//! afterwards; this subsystem never deletes spans (retention is handled
//! elsewhere).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;
use validator::Validate;

use super::patch::Patch;
use crate::domain::validation::not_blank;

// ============================================================================
// SPAN CLASSIFICATION
// ============================================================================

/// Span type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SpanType {
    #[default]
    General,
    Tool,
    Llm,
    Guardrail,
}

impl SpanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Tool => "tool",
            Self::Llm => "llm",
            Self::Guardrail => "guardrail",
        }
    }
}

/// Structured error descriptor attached to a failed span or trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorInfo {
    pub exception_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
}

// ============================================================================
// SPAN RECORD
// ============================================================================

/// Full span record as stored and returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub id: Uuid,
    pub project_id: Uuid,
    pub trace_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub span_type: SpanType,
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
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<BTreeMap<String, i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_estimated_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_info: Option<ErrorInfo>,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl Span {
    /// Whether the span has been marked complete
    pub fn is_complete(&self) -> bool {
        self.end_time.is_some()
    }
}

// ============================================================================
// SPAN WRITE (create payload)
// ============================================================================

/// Span create payload.
///
/// `id` may be supplied by the client for idempotent ingestion; a fresh one is
/// generated otherwise. Exactly one project must resolve from
/// `project_name`/`project_id`; the Default Project is assumed when neither is
/// given. Unknown fields are ignored for forward compatibility.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SpanWrite {
    pub id: Option<Uuid>,
    #[validate(custom(function = "not_blank"))]
    pub project_name: Option<String>,
    pub project_id: Option<Uuid>,
    pub trace_id: Uuid,
    pub parent_span_id: Option<Uuid>,
    #[validate(custom(function = "not_blank"))]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub span_type: SpanType,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub input: Option<JsonValue>,
    pub output: Option<JsonValue>,
    pub metadata: Option<JsonValue>,
    pub model: Option<String>,
    pub provider: Option<String>,
    pub tags: Option<BTreeSet<String>>,
    pub usage: Option<BTreeMap<String, i64>>,
    pub total_estimated_cost: Option<f64>,
    pub error_info: Option<ErrorInfo>,
}

// ============================================================================
// SPAN UPDATE (partial payload)
// ============================================================================

/// Span partial-update payload.
///
/// Every field except `trace_id` is optional, and a missing key is distinct
/// from an explicit `null`: missing keys leave the stored field untouched,
/// explicit nulls (and explicit empty collections) overwrite it. See
/// [`Patch`] for the wire contract.
///
/// `project_name`/`project_id` do not move the span: when supplied they must
/// agree with the span's resolved project, otherwise the update conflicts.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SpanUpdate {
    #[validate(custom(function = "not_blank"))]
    pub project_name: Option<String>,
    pub project_id: Option<Uuid>,
    pub trace_id: Uuid,
    pub parent_span_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub name: Patch<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Patch::is_absent")]
    pub span_type: Patch<SpanType>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub end_time: Patch<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub input: Patch<JsonValue>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub output: Patch<JsonValue>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub metadata: Patch<JsonValue>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub model: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub provider: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub tags: Patch<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub usage: Patch<BTreeMap<String, i64>>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub total_estimated_cost: Patch<f64>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub error_info: Patch<ErrorInfo>,
}

// ============================================================================
// CHANGED FIELDS
// ============================================================================

/// Span fields trackable by the merge engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SpanField {
    ParentSpanId,
    Name,
    Type,
    EndTime,
    Input,
    Output,
    Metadata,
    Model,
    Provider,
    Tags,
    Usage,
    TotalEstimatedCost,
    ErrorInfo,
}

impl SpanField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ParentSpanId => "parent_span_id",
            Self::Name => "name",
            Self::Type => "type",
            Self::EndTime => "end_time",
            Self::Input => "input",
            Self::Output => "output",
            Self::Metadata => "metadata",
            Self::Model => "model",
            Self::Provider => "provider",
            Self::Tags => "tags",
            Self::Usage => "usage",
            Self::TotalEstimatedCost => "total_estimated_cost",
            Self::ErrorInfo => "error_info",
        }
    }
}

impl fmt::Display for SpanField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of fields a merge actually changed, for downstream notification
pub type ChangedFields = BTreeSet<SpanField>;
