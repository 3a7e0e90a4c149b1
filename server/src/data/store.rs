//! Concurrent in-memory stores
//!
//! Durable persistence is an external collaborator of this subsystem; these
//! stores hold the concurrent working set the merge engine and the rule
//! dispatcher operate on. All of them are sharded maps, so operations on
//! different ids proceed in parallel while the entry guard serializes
//! read-modify-write cycles on the same id.

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use crate::core::constants::DEFAULT_PROJECT_NAME;
use crate::data::types::{
    AutomationRuleEvaluator, ChangedFields, ChangedTraceFields, Project, Span, Trace,
};
use crate::domain::error::DomainError;

// ============================================================================
// PROJECT STORE
// ============================================================================

/// Projects by id with a name index for ingestion-side resolution
#[derive(Default)]
pub struct ProjectStore {
    by_id: DashMap<Uuid, Project>,
    by_name: DashMap<String, Uuid>,
}

impl ProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: Uuid) -> Option<Project> {
        self.by_id.get(&id).map(|p| p.clone())
    }

    pub fn get_by_name(&self, name: &str) -> Option<Project> {
        self.by_name.get(name).and_then(|id| self.get(*id))
    }

    pub fn exists(&self, id: Uuid) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn list(&self) -> Vec<Project> {
        let mut projects: Vec<Project> = self.by_id.iter().map(|p| p.clone()).collect();
        projects.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        projects
    }

    /// Fetch a project by name, creating it on first reference.
    ///
    /// Ingestion auto-creates projects so that SDKs can point at a project
    /// name before anyone set it up.
    pub fn get_or_create(&self, name: &str) -> Project {
        // The name-index entry guard makes concurrent first references agree
        // on a single id.
        match self.by_name.entry(name.to_string()) {
            Entry::Occupied(entry) => {
                let id = *entry.get();
                // The id row is written before the index row, so this lookup
                // cannot miss.
                self.by_id
                    .get(&id)
                    .map(|p| p.clone())
                    .unwrap_or_else(|| Project {
                        id,
                        name: name.to_string(),
                        created_at: Utc::now(),
                    })
            }
            Entry::Vacant(entry) => {
                let project = Project {
                    id: Uuid::new_v4(),
                    name: name.to_string(),
                    created_at: Utc::now(),
                };
                self.by_id.insert(project.id, project.clone());
                entry.insert(project.id);
                tracing::debug!(project_id = %project.id, name, "Project created");
                project
            }
        }
    }

    /// Resolve a project reference from an update payload without creating
    /// anything. `Ok(None)` means no reference was supplied and the stored
    /// record's project is simply retained.
    pub fn lookup(&self, name: Option<&str>, id: Option<Uuid>) -> Result<Option<Uuid>, DomainError> {
        match (name, id) {
            (None, None) => Ok(None),
            (Some(name), None) => self
                .get_by_name(name)
                .map(|p| Some(p.id))
                .ok_or_else(|| DomainError::not_found("project", name)),
            (None, Some(id)) => {
                if self.exists(id) {
                    Ok(Some(id))
                } else {
                    Err(DomainError::not_found("project", id))
                }
            }
            (Some(name), Some(id)) => match self.get_by_name(name) {
                Some(project) if project.id == id => Ok(Some(id)),
                _ => Err(DomainError::conflict(
                    "project_name and project_id resolve to different projects",
                )),
            },
        }
    }

    /// Resolve a project reference from an ingestion payload.
    ///
    /// Exactly one project must resolve: the Default Project when neither
    /// field is supplied, the named project (auto-created) when only a name
    /// is given, the identified project when only an id is given, and both
    /// must agree when the payload carries the two.
    pub fn resolve(&self, name: Option<&str>, id: Option<Uuid>) -> Result<Uuid, DomainError> {
        match (name, id) {
            (None, None) => Ok(self.get_or_create(DEFAULT_PROJECT_NAME).id),
            (Some(name), None) => Ok(self.get_or_create(name).id),
            (None, Some(id)) => {
                if self.exists(id) {
                    Ok(id)
                } else {
                    Err(DomainError::not_found("project", id))
                }
            }
            (Some(name), Some(id)) => match self.get_by_name(name) {
                Some(project) if project.id == id => Ok(id),
                _ => Err(DomainError::conflict(
                    "project_name and project_id resolve to different projects",
                )),
            },
        }
    }
}

// ============================================================================
// SPAN STORE
// ============================================================================

#[derive(Default)]
pub struct SpanStore {
    spans: DashMap<Uuid, Span>,
}

impl SpanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: Uuid) -> Option<Span> {
        self.spans.get(&id).map(|s| s.clone())
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Insert a freshly created span; the id must not be taken.
    pub fn insert_new(&self, span: Span) -> Result<Span, DomainError> {
        match self.spans.entry(span.id) {
            Entry::Occupied(_) => Err(DomainError::conflict(format!(
                "span {} already exists",
                span.id
            ))),
            Entry::Vacant(entry) => {
                entry.insert(span.clone());
                Ok(span)
            }
        }
    }

    /// Run a merge against the stored span under the entry guard.
    ///
    /// The guard keeps at most one merge in flight per span id, which makes
    /// the changed-field computation and the post-merge validation atomic
    /// relative to concurrent updates. A failed merge leaves the stored span
    /// untouched.
    pub fn merge_with<F>(&self, id: Uuid, merge: F) -> Result<(Span, ChangedFields), DomainError>
    where
        F: FnOnce(&Span) -> Result<(Span, ChangedFields), DomainError>,
    {
        match self.spans.entry(id) {
            Entry::Occupied(mut entry) => {
                let (merged, changed) = merge(entry.get())?;
                entry.insert(merged.clone());
                Ok((merged, changed))
            }
            Entry::Vacant(_) => Err(DomainError::not_found("span", id)),
        }
    }

    pub fn list_by_trace(&self, trace_id: Uuid) -> Vec<Span> {
        let mut spans: Vec<Span> = self
            .spans
            .iter()
            .filter(|s| s.trace_id == trace_id)
            .map(|s| s.clone())
            .collect();
        spans.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        spans
    }
}

// ============================================================================
// TRACE STORE
// ============================================================================

#[derive(Default)]
pub struct TraceStore {
    traces: DashMap<Uuid, Trace>,
}

impl TraceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: Uuid) -> Option<Trace> {
        self.traces.get(&id).map(|t| t.clone())
    }

    pub fn insert_new(&self, trace: Trace) -> Result<Trace, DomainError> {
        match self.traces.entry(trace.id) {
            Entry::Occupied(_) => Err(DomainError::conflict(format!(
                "trace {} already exists",
                trace.id
            ))),
            Entry::Vacant(entry) => {
                entry.insert(trace.clone());
                Ok(trace)
            }
        }
    }

    /// Same per-id serialization contract as [`SpanStore::merge_with`]
    pub fn merge_with<F>(
        &self,
        id: Uuid,
        merge: F,
    ) -> Result<(Trace, ChangedTraceFields), DomainError>
    where
        F: FnOnce(&Trace) -> Result<(Trace, ChangedTraceFields), DomainError>,
    {
        match self.traces.entry(id) {
            Entry::Occupied(mut entry) => {
                let (merged, changed) = merge(entry.get())?;
                entry.insert(merged.clone());
                Ok((merged, changed))
            }
            Entry::Vacant(_) => Err(DomainError::not_found("trace", id)),
        }
    }
}

// ============================================================================
// RULE STORE
// ============================================================================

#[derive(Default)]
pub struct RuleStore {
    rules: DashMap<Uuid, AutomationRuleEvaluator>,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: Uuid) -> Option<AutomationRuleEvaluator> {
        self.rules.get(&id).map(|r| r.clone())
    }

    pub fn insert(&self, rule: AutomationRuleEvaluator) {
        self.rules.insert(rule.id, rule);
    }

    pub fn delete(&self, id: Uuid) -> Option<AutomationRuleEvaluator> {
        self.rules.remove(&id).map(|(_, rule)| rule)
    }

    /// Apply an update against the stored rule under the entry guard
    pub fn merge_with<F>(&self, id: Uuid, merge: F) -> Result<AutomationRuleEvaluator, DomainError>
    where
        F: FnOnce(&AutomationRuleEvaluator) -> Result<AutomationRuleEvaluator, DomainError>,
    {
        match self.rules.entry(id) {
            Entry::Occupied(mut entry) => {
                let merged = merge(entry.get())?;
                entry.insert(merged.clone());
                Ok(merged)
            }
            Entry::Vacant(_) => Err(DomainError::not_found("evaluator", id)),
        }
    }

    /// All rules for a project, enabled or not, ordered by creation time
    pub fn list_by_project(&self, project_id: Uuid) -> Vec<AutomationRuleEvaluator> {
        let mut rules: Vec<AutomationRuleEvaluator> = self
            .rules
            .iter()
            .filter(|r| r.project_id == project_id)
            .map(|r| r.clone())
            .collect();
        rules.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_resolve_defaults_to_default_project() {
        let store = ProjectStore::new();
        let id = store.resolve(None, None).unwrap();
        assert_eq!(store.get(id).unwrap().name, DEFAULT_PROJECT_NAME);

        // Resolution is stable
        assert_eq!(store.resolve(None, None).unwrap(), id);
    }

    #[test]
    fn test_project_resolve_by_name_auto_creates() {
        let store = ProjectStore::new();
        let id = store.resolve(Some("chatbot"), None).unwrap();
        assert_eq!(store.get(id).unwrap().name, "chatbot");
        assert_eq!(store.resolve(Some("chatbot"), None).unwrap(), id);
    }

    #[test]
    fn test_project_resolve_by_unknown_id_fails() {
        let store = ProjectStore::new();
        let err = store.resolve(None, Some(Uuid::new_v4())).unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[test]
    fn test_project_resolve_disagreeing_pair_conflicts() {
        let store = ProjectStore::new();
        let a = store.get_or_create("a");
        let _b = store.get_or_create("b");
        let err = store
            .resolve(Some("b"), Some(a.id))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        // Agreement passes
        assert_eq!(store.resolve(Some("a"), Some(a.id)).unwrap(), a.id);
    }

    #[test]
    fn test_span_store_rejects_duplicate_insert() {
        let store = SpanStore::new();
        let span = sample_span();
        store.insert_new(span.clone()).unwrap();
        assert!(matches!(
            store.insert_new(span).unwrap_err(),
            DomainError::Conflict(_)
        ));
    }

    #[test]
    fn test_span_store_merge_missing_is_not_found() {
        let store = SpanStore::new();
        let err = store
            .merge_with(Uuid::new_v4(), |span| {
                Ok((span.clone(), ChangedFields::new()))
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[test]
    fn test_span_store_failed_merge_leaves_span_untouched() {
        let store = SpanStore::new();
        let span = sample_span();
        store.insert_new(span.clone()).unwrap();

        let result = store.merge_with(span.id, |_| Err(DomainError::conflict("nope")));
        assert!(result.is_err());
        assert_eq!(store.get(span.id).unwrap(), span);
    }

    #[test]
    fn test_rule_store_list_by_project_filters() {
        use crate::data::types::{EvaluatorCode, UserDefinedMetricPythonCode};

        let store = RuleStore::new();
        let project = Uuid::new_v4();
        let other = Uuid::new_v4();
        for (i, pid) in [project, project, other].iter().enumerate() {
            store.insert(AutomationRuleEvaluator {
                id: Uuid::new_v4(),
                project_id: *pid,
                name: format!("rule-{i}"),
                sampling_rate: 1.0,
                enabled: true,
                code: EvaluatorCode::UserDefinedMetricPython(UserDefinedMetricPythonCode {
                    metric: "return 1".to_string(),
                    arguments: Default::default(),
                }),
                created_at: Utc::now(),
                last_updated_at: Utc::now(),
            });
        }
        assert_eq!(store.list_by_project(project).len(), 2);
        assert_eq!(store.list_by_project(other).len(), 1);
    }

    fn sample_span() -> Span {
        use crate::data::types::SpanType;
        Span {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            trace_id: Uuid::new_v4(),
            parent_span_id: None,
            name: Some("step".to_string()),
            span_type: SpanType::General,
            start_time: Utc::now(),
            end_time: None,
            input: None,
            output: None,
            metadata: None,
            model: None,
            provider: None,
            tags: None,
            usage: None,
            total_estimated_cost: None,
            error_info: None,
            created_at: Utc::now(),
            last_updated_at: Utc::now(),
        }
    }
}
