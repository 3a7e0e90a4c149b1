//! Evaluator rule management
//!
//! Create/read/update/delete for automation rules, scoped to a project.
//! Every mutation invalidates the per-project rule cache so the dispatcher
//! converges quickly; the TTL backstop covers anything missed.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use validator::ValidationError;

use crate::data::cache::RuleCache;
use crate::data::store::{ProjectStore, RuleStore};
use crate::data::types::{
    AutomationRuleEvaluator, AutomationRuleEvaluatorUpdate, EvaluatorWrite, Patch,
};
use crate::domain::error::DomainError;
use crate::domain::validation::{Violations, not_blank, unit_interval, validate_evaluator};

pub struct RuleService {
    projects: Arc<ProjectStore>,
    rules: Arc<RuleStore>,
    cache: Arc<RuleCache>,
}

impl RuleService {
    pub fn new(projects: Arc<ProjectStore>, rules: Arc<RuleStore>, cache: Arc<RuleCache>) -> Self {
        Self {
            projects,
            rules,
            cache,
        }
    }

    /// Create an evaluator under a project
    pub async fn create(
        &self,
        project_id: Uuid,
        write: EvaluatorWrite,
    ) -> Result<AutomationRuleEvaluator, DomainError> {
        if !self.projects.exists(project_id) {
            return Err(DomainError::not_found("project", project_id));
        }

        let now = Utc::now();
        let rule = AutomationRuleEvaluator {
            id: Uuid::new_v4(),
            project_id,
            name: write.name,
            sampling_rate: write.sampling_rate,
            enabled: write.enabled,
            code: write.code,
            created_at: now,
            last_updated_at: now,
        };
        validate_evaluator(&rule)?;

        self.rules.insert(rule.clone());
        self.cache.invalidate(project_id).await;
        tracing::info!(
            rule_id = %rule.id,
            project_id = %project_id,
            r#type = rule.evaluator_type().as_str(),
            "Evaluator created"
        );
        Ok(rule)
    }

    /// Fetch an evaluator, scoped to its project
    pub fn get(&self, project_id: Uuid, id: Uuid) -> Result<AutomationRuleEvaluator, DomainError> {
        self.rules
            .get(id)
            .filter(|rule| rule.project_id == project_id)
            .ok_or_else(|| DomainError::not_found("evaluator", id))
    }

    /// All evaluators of a project
    pub fn list(&self, project_id: Uuid) -> Result<Vec<AutomationRuleEvaluator>, DomainError> {
        if !self.projects.exists(project_id) {
            return Err(DomainError::not_found("project", project_id));
        }
        Ok(self.rules.list_by_project(project_id))
    }

    /// Apply a partial update to an evaluator
    pub async fn update(
        &self,
        project_id: Uuid,
        id: Uuid,
        update: AutomationRuleEvaluatorUpdate,
    ) -> Result<AutomationRuleEvaluator, DomainError> {
        let merged = self.rules.merge_with(id, |existing| {
            if existing.project_id != project_id {
                return Err(DomainError::not_found("evaluator", id));
            }
            apply_update(existing, &update)
        })?;

        self.cache.invalidate(project_id).await;
        tracing::info!(rule_id = %id, project_id = %project_id, "Evaluator updated");
        Ok(merged)
    }

    /// Delete an evaluator
    pub async fn delete(&self, project_id: Uuid, id: Uuid) -> Result<(), DomainError> {
        // Scope check before the irreversible part
        self.get(project_id, id)?;
        self.rules.delete(id);
        self.cache.invalidate(project_id).await;
        tracing::info!(rule_id = %id, project_id = %project_id, "Evaluator deleted");
        Ok(())
    }
}

/// Merge an update into an existing evaluator.
///
/// `name`, `sampling_rate`, and `enabled` are required on the entity, so an
/// explicit null is a violation rather than a clear. A supplied `code`
/// replaces the payload but must keep the existing variant; the discriminant
/// of a rule is fixed at creation.
fn apply_update(
    existing: &AutomationRuleEvaluator,
    update: &AutomationRuleEvaluatorUpdate,
) -> Result<AutomationRuleEvaluator, DomainError> {
    let mut merged = existing.clone();
    let mut violations = Violations::new();

    match &update.name {
        Patch::Absent => {}
        Patch::Null => violations.add("name", required()),
        Patch::Value(name) => merged.name = name.clone(),
    }
    match &update.sampling_rate {
        Patch::Absent => {}
        Patch::Null => violations.add("sampling_rate", required()),
        Patch::Value(rate) => merged.sampling_rate = *rate,
    }
    match &update.enabled {
        Patch::Absent => {}
        Patch::Null => violations.add("enabled", required()),
        Patch::Value(enabled) => merged.enabled = *enabled,
    }

    if let Some(code) = update.typed_code()? {
        if code.evaluator_type() != existing.evaluator_type() {
            return Err(DomainError::conflict(format!(
                "evaluator is of type {}, update supplies {}",
                existing.evaluator_type().as_str(),
                code.evaluator_type().as_str()
            )));
        }
        merged.code = code;
    }

    violations.check("name", not_blank(&merged.name));
    violations.check("sampling_rate", unit_interval(merged.sampling_rate));
    violations.finish()?;

    if merged != *existing {
        merged.last_updated_at = Utc::now();
    }
    Ok(merged)
}

fn required() -> ValidationError {
    ValidationError::new("required").with_message("must not be null".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::RulesConfig;
    use crate::data::types::{EvaluatorCode, UserDefinedMetricPythonCode};

    fn service() -> (RuleService, Uuid) {
        let projects = Arc::new(ProjectStore::new());
        let project = projects.get_or_create("p");
        let rules = Arc::new(RuleStore::new());
        let cache = Arc::new(RuleCache::new(&RulesConfig::default()));
        (RuleService::new(projects, rules, cache), project.id)
    }

    fn python_write(name: &str) -> EvaluatorWrite {
        EvaluatorWrite {
            name: name.to_string(),
            sampling_rate: 0.5,
            enabled: true,
            code: EvaluatorCode::UserDefinedMetricPython(UserDefinedMetricPythonCode {
                metric: "return 1".to_string(),
                arguments: Default::default(),
            }),
        }
    }

    #[tokio::test]
    async fn test_create_then_get_and_list() {
        let (service, project_id) = service();
        let rule = service.create(project_id, python_write("m")).await.unwrap();
        assert_eq!(service.get(project_id, rule.id).unwrap(), rule);
        assert_eq!(service.list(project_id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_under_unknown_project_fails() {
        let (service, _) = service();
        let err = service
            .create(Uuid::new_v4(), python_write("m"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_create_with_out_of_range_sampling_rate_fails() {
        let (service, project_id) = service();
        let mut write = python_write("m");
        write.sampling_rate = 1.5;
        let err = service.create(project_id, write).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_merges_common_fields() {
        let (service, project_id) = service();
        let rule = service.create(project_id, python_write("m")).await.unwrap();

        let update = AutomationRuleEvaluatorUpdate {
            enabled: Patch::Value(false),
            sampling_rate: Patch::Value(0.1),
            ..Default::default()
        };
        let merged = service.update(project_id, rule.id, update).await.unwrap();
        assert!(!merged.enabled);
        assert_eq!(merged.sampling_rate, 0.1);
        assert_eq!(merged.name, "m");
        assert_eq!(merged.code, rule.code);
    }

    #[tokio::test]
    async fn test_update_null_on_required_field_fails() {
        let (service, project_id) = service();
        let rule = service.create(project_id, python_write("m")).await.unwrap();

        let update = AutomationRuleEvaluatorUpdate {
            name: Patch::Null,
            ..Default::default()
        };
        let err = service.update(project_id, rule.id, update).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        // Nothing applied
        assert_eq!(service.get(project_id, rule.id).unwrap().name, "m");
    }

    #[tokio::test]
    async fn test_update_cannot_change_variant() {
        let (service, project_id) = service();
        let rule = service.create(project_id, python_write("m")).await.unwrap();

        let update: AutomationRuleEvaluatorUpdate = serde_json::from_value(serde_json::json!({
            "type": "llm_as_judge",
            "code": {
                "model": {"name": "gpt-4o"},
                "messages": [],
                "schema": []
            }
        }))
        .unwrap();
        let err = service.update(project_id, rule.id, update).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_with_unknown_variant_is_serialization_error() {
        let (service, project_id) = service();
        let rule = service.create(project_id, python_write("m")).await.unwrap();

        let update: AutomationRuleEvaluatorUpdate = serde_json::from_value(serde_json::json!({
            "type": "user_defined_metric_lua",
            "code": {"metric": "return 0"}
        }))
        .unwrap();
        let err = service.update(project_id, rule.id, update).await.unwrap_err();
        assert!(matches!(err, DomainError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_update_replaces_code_within_variant() {
        let (service, project_id) = service();
        let rule = service.create(project_id, python_write("m")).await.unwrap();

        let update: AutomationRuleEvaluatorUpdate = serde_json::from_value(serde_json::json!({
            "type": "user_defined_metric_python",
            "code": {"metric": "return 0"}
        }))
        .unwrap();
        let merged = service.update(project_id, rule.id, update).await.unwrap();
        match merged.code {
            EvaluatorCode::UserDefinedMetricPython(code) => {
                assert_eq!(code.metric, "return 0")
            }
            other => panic!("unexpected code payload: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_update_is_idempotent() {
        let (service, project_id) = service();
        let rule = service.create(project_id, python_write("m")).await.unwrap();

        let update = AutomationRuleEvaluatorUpdate {
            enabled: Patch::Value(false),
            ..Default::default()
        };
        let once = service
            .update(project_id, rule.id, update.clone())
            .await
            .unwrap();
        let twice = service.update(project_id, rule.id, update).await.unwrap();
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_delete_scopes_to_project() {
        let (service, project_id) = service();
        let rule = service.create(project_id, python_write("m")).await.unwrap();

        let err = service.delete(Uuid::new_v4(), rule.id).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));

        service.delete(project_id, rule.id).await.unwrap();
        assert!(service.get(project_id, rule.id).is_err());
    }
}
