//! Deterministic per-(rule, trace) sampling
//!
//! The firing decision hashes the (rule id, trace id) pair into [0, 1) and
//! compares against the rule's sampling rate. No RNG state is involved:
//! re-evaluating the same pair always yields the same decision, so ingestion
//! retries and replays neither double-fire a rule nor flap between decisions.
//! Keying by trace id also gives every span of a trace a consistent decision
//! per rule.

use uuid::Uuid;

use crate::data::types::AutomationRuleEvaluator;

/// Whether `rule` fires for the trace identified by `trace_id`.
///
/// Disabled rules never fire. `sampling_rate = 0.0` never fires and
/// `sampling_rate = 1.0` always fires, exactly.
pub fn should_fire(rule: &AutomationRuleEvaluator, trace_id: Uuid) -> bool {
    if !rule.enabled {
        return false;
    }
    sample(rule.sampling_rate, rule.id, trace_id)
}

/// The sampling decision without the enabled gate
pub fn sample(rate: f64, rule_id: Uuid, trace_id: Uuid) -> bool {
    // Exact boundary behavior, independent of the hash
    if rate <= 0.0 {
        return false;
    }
    if rate >= 1.0 {
        return true;
    }
    unit_interval(rule_id, trace_id) < rate
}

/// Map the (rule id, trace id) pair to a stable value in [0, 1)
fn unit_interval(rule_id: Uuid, trace_id: Uuid) -> f64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(rule_id.as_bytes());
    hasher.update(trace_id.as_bytes());
    let digest = hasher.finalize();

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest.as_bytes()[..8]);
    let bits = u64::from_le_bytes(prefix);

    // Top 53 bits fill an f64 mantissa exactly, giving a uniform [0, 1)
    (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::{EvaluatorCode, UserDefinedMetricPythonCode};
    use chrono::Utc;

    fn rule_with(sampling_rate: f64, enabled: bool) -> AutomationRuleEvaluator {
        AutomationRuleEvaluator {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            name: "sampled".to_string(),
            sampling_rate,
            enabled,
            code: EvaluatorCode::UserDefinedMetricPython(UserDefinedMetricPythonCode {
                metric: "return 1".to_string(),
                arguments: Default::default(),
            }),
            created_at: Utc::now(),
            last_updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_rate_zero_never_fires() {
        let rule = rule_with(0.0, true);
        for _ in 0..10_000 {
            assert!(!should_fire(&rule, Uuid::new_v4()));
        }
    }

    #[test]
    fn test_rate_one_always_fires_when_enabled() {
        let rule = rule_with(1.0, true);
        for _ in 0..10_000 {
            assert!(should_fire(&rule, Uuid::new_v4()));
        }
    }

    #[test]
    fn test_disabled_rule_never_fires_even_at_rate_one() {
        let rule = rule_with(1.0, false);
        for _ in 0..1_000 {
            assert!(!should_fire(&rule, Uuid::new_v4()));
        }
    }

    #[test]
    fn test_decision_is_deterministic_per_pair() {
        let rule = rule_with(0.5, true);
        for _ in 0..1_000 {
            let trace_id = Uuid::new_v4();
            let first = should_fire(&rule, trace_id);
            let second = should_fire(&rule, trace_id);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_decision_varies_across_rules_for_same_trace() {
        // Different rules at the same rate make independent decisions for
        // the same trace; with 64 rules at 0.5 both outcomes must occur.
        let trace_id = Uuid::new_v4();
        let decisions: Vec<bool> = (0..64)
            .map(|_| should_fire(&rule_with(0.5, true), trace_id))
            .collect();
        assert!(decisions.iter().any(|&d| d));
        assert!(decisions.iter().any(|&d| !d));
    }

    #[test]
    fn test_fired_fraction_tracks_rate() {
        let rule = rule_with(0.3, true);
        let n = 10_000;
        let fired = (0..n)
            .filter(|_| should_fire(&rule, Uuid::new_v4()))
            .count();
        let fraction = fired as f64 / n as f64;
        // ±2% absolute tolerance around 0.3 (well beyond 3 sigma for n=10k)
        assert!(
            (fraction - 0.3).abs() < 0.02,
            "fired fraction {} too far from 0.3",
            fraction
        );
    }

    #[test]
    fn test_unit_interval_is_stable_and_in_range() {
        let rule_id = Uuid::parse_str("4c0fcaae-4d97-43c7-afb4-634b0b4dca5c").unwrap();
        let trace_id = Uuid::parse_str("9a35afd1-3a79-42b9-96a1-8ab49c7fd1b5").unwrap();
        let a = unit_interval(rule_id, trace_id);
        let b = unit_interval(rule_id, trace_id);
        assert_eq!(a, b);
        assert!((0.0..1.0).contains(&a));

        // Argument order matters: the pair is not commutative
        let swapped = unit_interval(trace_id, rule_id);
        assert_ne!(a, swapped);
    }
}
