//! Shared data types for the span/trace/rule model

mod patch;
mod projects;
mod rules;
mod spans;
mod traces;

pub use patch::Patch;
pub use projects::{Project, ProjectWrite};
pub use rules::{
    AutomationRuleEvaluator, AutomationRuleEvaluatorUpdate, EvaluatorCode, EvaluatorType,
    EvaluatorWrite, JudgeMessage, JudgeModelParameters, JudgeOutputSchema, JudgeScoreType,
    LlmAsJudgeCode, UserDefinedMetricPythonCode,
};
pub use spans::{ChangedFields, ErrorInfo, Span, SpanField, SpanType, SpanUpdate, SpanWrite};
pub use traces::{ChangedTraceFields, Trace, TraceField, TraceUpdate, TraceWrite};
