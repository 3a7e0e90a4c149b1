//! Application configuration
//!
//! Defaults come from [`super::constants`]; environment variables override
//! them, CLI flags override both. Nothing here performs I/O beyond reading
//! the environment.

use std::str::FromStr;

use anyhow::{Result, bail};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::cli::CliConfig;
use super::constants::{
    DEFAULT_END_TIME_MAX_FUTURE_MINS, DEFAULT_END_TIME_MAX_PAST_HOURS,
    DEFAULT_EVENT_QUEUE_CAPACITY, DEFAULT_HOST, DEFAULT_JOB_QUEUE_CAPACITY, DEFAULT_PORT,
    DEFAULT_RULE_CACHE_MAX_PROJECTS, DEFAULT_RULE_CACHE_TTL_SECS, ENV_END_TIME_MAX_FUTURE_MINS,
    ENV_END_TIME_MAX_PAST_HOURS, ENV_EVENT_QUEUE_CAPACITY, ENV_HOST, ENV_JOB_QUEUE_CAPACITY,
    ENV_PORT, ENV_RULE_CACHE_MAX_PROJECTS, ENV_RULE_CACHE_TTL_SECS,
};

// =============================================================================
// Time window
// =============================================================================

/// Acceptable interval for a reported timestamp relative to ingestion time
#[derive(Debug, Clone, Copy)]
pub struct TimeWindow {
    pub max_past: Duration,
    pub max_future: Duration,
}

impl TimeWindow {
    pub fn contains(&self, value: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        value >= now - self.max_past && value <= now + self.max_future
    }
}

// =============================================================================
// Config sections
// =============================================================================

/// HTTP server settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Ingestion-side settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestionConfig {
    /// Hours a reported `end_time` may lie in the past
    pub end_time_max_past_hours: i64,
    /// Minutes a reported `end_time` may lie in the future (clock skew)
    pub end_time_max_future_mins: i64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            end_time_max_past_hours: DEFAULT_END_TIME_MAX_PAST_HOURS,
            end_time_max_future_mins: DEFAULT_END_TIME_MAX_FUTURE_MINS,
        }
    }
}

impl IngestionConfig {
    /// The acceptable window for `end_time` values
    pub fn end_time_window(&self) -> TimeWindow {
        TimeWindow {
            max_past: Duration::hours(self.end_time_max_past_hours),
            max_future: Duration::minutes(self.end_time_max_future_mins),
        }
    }
}

/// Rule engine settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RulesConfig {
    /// TTL backstop for the per-project rule cache (seconds)
    pub cache_ttl_secs: u64,
    /// Maximum number of projects with a cached rule list
    pub cache_max_projects: u64,
    /// Capacity of the completion-event queue feeding the dispatcher
    pub event_queue_capacity: usize,
    /// Capacity of the outbound evaluation-job queue
    pub job_queue_capacity: usize,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: DEFAULT_RULE_CACHE_TTL_SECS,
            cache_max_projects: DEFAULT_RULE_CACHE_MAX_PROJECTS,
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
            job_queue_capacity: DEFAULT_JOB_QUEUE_CAPACITY,
        }
    }
}

// =============================================================================
// App config
// =============================================================================

/// Complete application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub rules: RulesConfig,
}

impl AppConfig {
    /// Build the configuration: defaults, then environment, then CLI flags
    pub fn load(cli: &CliConfig) -> Result<Self> {
        let mut config = Self::default();

        if let Some(host) = env_value::<String>(ENV_HOST) {
            config.server.host = host;
        }
        if let Some(port) = env_value::<u16>(ENV_PORT) {
            config.server.port = port;
        }
        if let Some(hours) = env_value::<i64>(ENV_END_TIME_MAX_PAST_HOURS) {
            config.ingestion.end_time_max_past_hours = hours;
        }
        if let Some(mins) = env_value::<i64>(ENV_END_TIME_MAX_FUTURE_MINS) {
            config.ingestion.end_time_max_future_mins = mins;
        }
        if let Some(ttl) = env_value::<u64>(ENV_RULE_CACHE_TTL_SECS) {
            config.rules.cache_ttl_secs = ttl;
        }
        if let Some(max) = env_value::<u64>(ENV_RULE_CACHE_MAX_PROJECTS) {
            config.rules.cache_max_projects = max;
        }
        if let Some(capacity) = env_value::<usize>(ENV_EVENT_QUEUE_CAPACITY) {
            config.rules.event_queue_capacity = capacity;
        }
        if let Some(capacity) = env_value::<usize>(ENV_JOB_QUEUE_CAPACITY) {
            config.rules.job_queue_capacity = capacity;
        }

        if let Some(host) = &cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.ingestion.end_time_max_past_hours < 0 {
            bail!("end_time_max_past_hours must be non-negative");
        }
        if self.ingestion.end_time_max_future_mins < 0 {
            bail!("end_time_max_future_mins must be non-negative");
        }
        if self.rules.event_queue_capacity == 0 || self.rules.job_queue_capacity == 0 {
            bail!("queue capacities must be greater than zero");
        }
        Ok(())
    }
}

/// Read and parse an environment variable, warning on unparseable values
fn env_value<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparseable environment variable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(
            config.ingestion.end_time_max_past_hours,
            DEFAULT_END_TIME_MAX_PAST_HOURS
        );
        assert_eq!(config.rules.cache_ttl_secs, DEFAULT_RULE_CACHE_TTL_SECS);
    }

    #[test]
    fn test_end_time_window_bounds() {
        let config = IngestionConfig {
            end_time_max_past_hours: 1,
            end_time_max_future_mins: 5,
        };
        let window = config.end_time_window();
        let now = Utc::now();
        assert!(window.contains(now, now));
        assert!(window.contains(now - Duration::minutes(59), now));
        assert!(!window.contains(now - Duration::minutes(61), now));
        assert!(window.contains(now + Duration::minutes(4), now));
        assert!(!window.contains(now + Duration::minutes(6), now));
    }

    #[test]
    fn test_cli_overrides() {
        let cli = CliConfig {
            host: Some("0.0.0.0".to_string()),
            port: Some(9000),
        };
        let config = AppConfig::load(&cli).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
    }
}
