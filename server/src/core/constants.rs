//! Application-wide constants and defaults

/// Application name
pub const APP_NAME: &str = "Tracegate";
/// Lowercase name used in log filters
pub const APP_NAME_LOWER: &str = "tracegate";

// ============================================================================
// Environment variables
// ============================================================================

pub const ENV_LOG: &str = "TRACEGATE_LOG";
pub const ENV_HOST: &str = "TRACEGATE_HOST";
pub const ENV_PORT: &str = "TRACEGATE_PORT";
pub const ENV_END_TIME_MAX_PAST_HOURS: &str = "TRACEGATE_END_TIME_MAX_PAST_HOURS";
pub const ENV_END_TIME_MAX_FUTURE_MINS: &str = "TRACEGATE_END_TIME_MAX_FUTURE_MINS";
pub const ENV_RULE_CACHE_TTL_SECS: &str = "TRACEGATE_RULE_CACHE_TTL_SECS";
pub const ENV_RULE_CACHE_MAX_PROJECTS: &str = "TRACEGATE_RULE_CACHE_MAX_PROJECTS";
pub const ENV_EVENT_QUEUE_CAPACITY: &str = "TRACEGATE_EVENT_QUEUE_CAPACITY";
pub const ENV_JOB_QUEUE_CAPACITY: &str = "TRACEGATE_JOB_QUEUE_CAPACITY";

// ============================================================================
// Server defaults
// ============================================================================

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8472;

/// Maximum seconds to wait for background tasks during shutdown
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Project defaults
// ============================================================================

/// Name of the project assumed when ingestion supplies no project reference
pub const DEFAULT_PROJECT_NAME: &str = "Default Project";

// ============================================================================
// Ingestion defaults
// ============================================================================

/// How far in the past a reported `end_time` may lie (hours)
pub const DEFAULT_END_TIME_MAX_PAST_HOURS: i64 = 720;
/// How far in the future a reported `end_time` may lie (minutes), allowing
/// for client clock skew
pub const DEFAULT_END_TIME_MAX_FUTURE_MINS: i64 = 15;

// ============================================================================
// Rule engine defaults
// ============================================================================

/// TTL backstop for the per-project rule cache; mutations invalidate eagerly
pub const DEFAULT_RULE_CACHE_TTL_SECS: u64 = 30;
/// Maximum number of projects with a cached rule list
pub const DEFAULT_RULE_CACHE_MAX_PROJECTS: u64 = 10_000;
/// Capacity of the completion-event queue feeding the dispatcher
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 4096;
/// Capacity of the outbound evaluation-job queue
pub const DEFAULT_JOB_QUEUE_CAPACITY: usize = 4096;
