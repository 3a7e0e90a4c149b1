//! Automation rule evaluator types
//!
//! An evaluator is a configured rule that scores completed traces with
//! executable code. The entity is polymorphic: the `type` discriminant on the
//! wire selects the shape of the `code` payload, and both travel together in
//! [`EvaluatorCode`] so a mismatched pair is unrepresentable. Adding a new
//! evaluator kind means adding a variant here plus its payload struct; nothing
//! else changes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;
use validator::Validate;

use super::patch::Patch;
use crate::domain::error::DomainError;
use crate::domain::validation::not_blank;

// ============================================================================
// CODE PAYLOADS
// ============================================================================

/// Code payload for the user-defined Python metric evaluator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDefinedMetricPythonCode {
    /// Python source of the metric
    pub metric: String,
    /// Argument name to trace-field mapping handed to the runtime
    #[serde(default)]
    pub arguments: BTreeMap<String, String>,
}

/// Model parameters for the LLM-as-judge evaluator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeModelParameters {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// One prompt message of an LLM-as-judge evaluator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeMessage {
    pub role: String,
    pub content: String,
}

/// One expected output score of an LLM-as-judge evaluator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeOutputSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub score_type: JudgeScoreType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JudgeScoreType {
    Boolean,
    Integer,
    Double,
}

/// Code payload for the LLM-as-judge evaluator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmAsJudgeCode {
    pub model: JudgeModelParameters,
    pub messages: Vec<JudgeMessage>,
    /// Prompt variable name to trace JSON-path mapping
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    pub schema: Vec<JudgeOutputSchema>,
}

// ============================================================================
// VARIANT MODEL
// ============================================================================

/// Discriminant identifying the concrete evaluator variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluatorType {
    UserDefinedMetricPython,
    LlmAsJudge,
}

impl EvaluatorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserDefinedMetricPython => "user_defined_metric_python",
            Self::LlmAsJudge => "llm_as_judge",
        }
    }
}

/// Typed code payload with its discriminant.
///
/// Serialized adjacently tagged (`"type"` + `"code"`) and flattened into the
/// owning entity, so the wire form carries the discriminant next to the
/// variant-specific payload and round-trips into the same concrete variant.
/// An unknown discriminant fails deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "code", rename_all = "snake_case")]
pub enum EvaluatorCode {
    UserDefinedMetricPython(UserDefinedMetricPythonCode),
    LlmAsJudge(LlmAsJudgeCode),
}

impl EvaluatorCode {
    /// The discriminant is derived from the variant, never stored separately.
    pub fn evaluator_type(&self) -> EvaluatorType {
        match self {
            Self::UserDefinedMetricPython(_) => EvaluatorType::UserDefinedMetricPython,
            Self::LlmAsJudge(_) => EvaluatorType::LlmAsJudge,
        }
    }
}

// ============================================================================
// EVALUATOR ENTITY
// ============================================================================

/// A configured automation rule, scoped to a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationRuleEvaluator {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub sampling_rate: f64,
    pub enabled: bool,
    #[serde(flatten)]
    pub code: EvaluatorCode,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl AutomationRuleEvaluator {
    pub fn evaluator_type(&self) -> EvaluatorType {
        self.code.evaluator_type()
    }
}

// ============================================================================
// WRITE / UPDATE PAYLOADS
// ============================================================================

fn default_sampling_rate() -> f64 {
    1.0
}

fn default_enabled() -> bool {
    true
}

/// Evaluator create payload; the owning project comes from the route path.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EvaluatorWrite {
    #[validate(custom(function = "not_blank"))]
    pub name: String,
    #[validate(range(min = 0.0, max = 1.0, message = "must be a fraction in [0, 1]"))]
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: f64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(flatten)]
    pub code: EvaluatorCode,
}

/// Evaluator partial-update payload.
///
/// Common fields follow the absent/null/value contract of [`Patch`]; `name`,
/// `sampling_rate`, and `enabled` are required on the entity, so an explicit
/// null fails validation instead of clearing. A supplied `type`/`code` pair
/// replaces the payload but must keep the variant of the existing rule; the
/// raw pair is kept here so an unknown discriminant surfaces as a
/// serialization error instead of being silently dropped.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct AutomationRuleEvaluatorUpdate {
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub name: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub sampling_rate: Patch<f64>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub enabled: Patch<bool>,
    #[serde(rename = "type", default)]
    pub evaluator_type: Option<String>,
    #[serde(default)]
    pub code: Option<JsonValue>,
}

impl AutomationRuleEvaluatorUpdate {
    /// Resolve the supplied `type`/`code` pair into a typed payload.
    ///
    /// `Ok(None)` when the update does not touch the code at all.
    pub fn typed_code(&self) -> Result<Option<EvaluatorCode>, DomainError> {
        match (&self.evaluator_type, &self.code) {
            (None, None) => Ok(None),
            (Some(evaluator_type), Some(code)) => {
                serde_json::from_value(serde_json::json!({
                    "type": evaluator_type,
                    "code": code,
                }))
                .map(Some)
                .map_err(|e| DomainError::Serialization(e.to_string()))
            }
            _ => Err(DomainError::Serialization(
                "type and code must be supplied together".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn python_evaluator() -> AutomationRuleEvaluator {
        AutomationRuleEvaluator {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            name: "hallucination-check".to_string(),
            sampling_rate: 0.25,
            enabled: true,
            code: EvaluatorCode::UserDefinedMetricPython(UserDefinedMetricPythonCode {
                metric: "def score(output):\n    return 1".to_string(),
                arguments: BTreeMap::from([("output".to_string(), "output".to_string())]),
            }),
            created_at: Utc::now(),
            last_updated_at: Utc::now(),
        }
    }

    fn judge_evaluator() -> AutomationRuleEvaluator {
        AutomationRuleEvaluator {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            name: "answer-relevance".to_string(),
            sampling_rate: 1.0,
            enabled: true,
            code: EvaluatorCode::LlmAsJudge(LlmAsJudgeCode {
                model: JudgeModelParameters {
                    name: "gpt-4o".to_string(),
                    temperature: Some(0.0),
                },
                messages: vec![JudgeMessage {
                    role: "user".to_string(),
                    content: "Rate the relevance of {{output}}".to_string(),
                }],
                variables: BTreeMap::from([("output".to_string(), "output".to_string())]),
                schema: vec![JudgeOutputSchema {
                    name: "relevance".to_string(),
                    score_type: JudgeScoreType::Integer,
                    description: None,
                }],
            }),
            created_at: Utc::now(),
            last_updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_python_variant_wire_shape() {
        let json = serde_json::to_value(python_evaluator()).unwrap();
        assert_eq!(json["type"], "user_defined_metric_python");
        assert!(json["code"]["metric"].as_str().unwrap().contains("def score"));
        assert_eq!(json["code"]["arguments"]["output"], "output");
    }

    #[test]
    fn test_python_variant_round_trip() {
        let evaluator = python_evaluator();
        let json = serde_json::to_string(&evaluator).unwrap();
        let back: AutomationRuleEvaluator = serde_json::from_str(&json).unwrap();
        assert_eq!(back, evaluator);
        assert_eq!(back.evaluator_type(), EvaluatorType::UserDefinedMetricPython);
    }

    #[test]
    fn test_judge_variant_round_trip() {
        let evaluator = judge_evaluator();
        let json = serde_json::to_string(&evaluator).unwrap();
        let back: AutomationRuleEvaluator = serde_json::from_str(&json).unwrap();
        assert_eq!(back, evaluator);
        assert_eq!(back.evaluator_type(), EvaluatorType::LlmAsJudge);
    }

    #[test]
    fn test_unknown_discriminant_is_rejected() {
        let json = r#"{
            "id": "4c0fcaae-4d97-43c7-afb4-634b0b4dca5c",
            "project_id": "9a35afd1-3a79-42b9-96a1-8ab49c7fd1b5",
            "name": "x",
            "sampling_rate": 1.0,
            "enabled": true,
            "type": "user_defined_metric_lua",
            "code": {"metric": "return 1"},
            "created_at": "2025-01-01T00:00:00Z",
            "last_updated_at": "2025-01-01T00:00:00Z"
        }"#;
        assert!(serde_json::from_str::<AutomationRuleEvaluator>(json).is_err());
    }

    #[test]
    fn test_mismatched_payload_shape_is_rejected() {
        // Discriminant says python but the payload is judge-shaped
        let json = r#"{
            "name": "x",
            "type": "user_defined_metric_python",
            "code": {"model": {"name": "gpt-4o"}, "messages": [], "schema": []}
        }"#;
        assert!(serde_json::from_str::<EvaluatorWrite>(json).is_err());
    }

    #[test]
    fn test_write_defaults() {
        let json = r#"{
            "name": "always-on",
            "type": "user_defined_metric_python",
            "code": {"metric": "return 1"}
        }"#;
        let write: EvaluatorWrite = serde_json::from_str(json).unwrap();
        assert_eq!(write.sampling_rate, 1.0);
        assert!(write.enabled);
        assert_eq!(
            write.code.evaluator_type(),
            EvaluatorType::UserDefinedMetricPython
        );
    }

    #[test]
    fn test_update_without_code_leaves_code_untouched() {
        let update: AutomationRuleEvaluatorUpdate =
            serde_json::from_str(r#"{"enabled": false}"#).unwrap();
        assert_eq!(update.enabled, Patch::Value(false));
        assert!(update.name.is_absent());
        assert!(update.typed_code().unwrap().is_none());
    }

    #[test]
    fn test_update_with_code_carries_variant() {
        let update: AutomationRuleEvaluatorUpdate = serde_json::from_str(
            r#"{
                "type": "user_defined_metric_python",
                "code": {"metric": "return 0"}
            }"#,
        )
        .unwrap();
        match update.typed_code().unwrap() {
            Some(EvaluatorCode::UserDefinedMetricPython(code)) => {
                assert_eq!(code.metric, "return 0");
            }
            other => panic!("unexpected code payload: {:?}", other),
        }
    }

    #[test]
    fn test_update_with_unknown_discriminant_is_serialization_error() {
        let update: AutomationRuleEvaluatorUpdate = serde_json::from_str(
            r#"{"type": "user_defined_metric_lua", "code": {"metric": "return 0"}}"#,
        )
        .unwrap();
        assert!(matches!(
            update.typed_code().unwrap_err(),
            DomainError::Serialization(_)
        ));
    }

    #[test]
    fn test_update_with_type_but_no_code_is_serialization_error() {
        let update: AutomationRuleEvaluatorUpdate =
            serde_json::from_str(r#"{"type": "user_defined_metric_python"}"#).unwrap();
        assert!(matches!(
            update.typed_code().unwrap_err(),
            DomainError::Serialization(_)
        ));
    }
}
