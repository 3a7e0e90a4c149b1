//! Per-project rule-list cache
//!
//! The dispatcher reads the rule list for a project on every trace
//! completion; rules change rarely. The list is cached with eager
//! invalidation on every rule mutation plus a short TTL backstop, so a
//! slightly stale rule set is possible and acceptable.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use uuid::Uuid;

use crate::core::config::RulesConfig;
use crate::data::store::RuleStore;
use crate::data::types::AutomationRuleEvaluator;

pub struct RuleCache {
    cache: Cache<Uuid, Arc<Vec<AutomationRuleEvaluator>>>,
}

impl RuleCache {
    pub fn new(config: &RulesConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.cache_max_projects)
            .time_to_live(Duration::from_secs(config.cache_ttl_secs))
            .build();
        Self { cache }
    }

    /// The rule list for a project, loading through the store on a miss
    pub async fn rules_for(
        &self,
        project_id: Uuid,
        store: &RuleStore,
    ) -> Arc<Vec<AutomationRuleEvaluator>> {
        self.cache
            .get_with(project_id, async {
                Arc::new(store.list_by_project(project_id))
            })
            .await
    }

    /// Drop the cached list for a project; called on rule create/update/delete
    pub async fn invalidate(&self, project_id: Uuid) {
        self.cache.invalidate(&project_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::{EvaluatorCode, UserDefinedMetricPythonCode};
    use chrono::Utc;

    fn rule(project_id: Uuid, name: &str) -> AutomationRuleEvaluator {
        AutomationRuleEvaluator {
            id: Uuid::new_v4(),
            project_id,
            name: name.to_string(),
            sampling_rate: 1.0,
            enabled: true,
            code: EvaluatorCode::UserDefinedMetricPython(UserDefinedMetricPythonCode {
                metric: "return 1".to_string(),
                arguments: Default::default(),
            }),
            created_at: Utc::now(),
            last_updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_cache_serves_stale_until_invalidated() {
        let store = RuleStore::new();
        let cache = RuleCache::new(&RulesConfig::default());
        let project_id = Uuid::new_v4();

        store.insert(rule(project_id, "first"));
        assert_eq!(cache.rules_for(project_id, &store).await.len(), 1);

        // A mutation without invalidation is not visible yet
        store.insert(rule(project_id, "second"));
        assert_eq!(cache.rules_for(project_id, &store).await.len(), 1);

        cache.invalidate(project_id).await;
        assert_eq!(cache.rules_for(project_id, &store).await.len(), 2);
    }

    #[tokio::test]
    async fn test_cache_keys_are_per_project() {
        let store = RuleStore::new();
        let cache = RuleCache::new(&RulesConfig::default());
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        store.insert(rule(a, "only-a"));
        assert_eq!(cache.rules_for(a, &store).await.len(), 1);
        assert_eq!(cache.rules_for(b, &store).await.len(), 0);
    }
}
