//! # Configuration Management
//!
//! Environment-overridable configuration for the queue core. Defaults match
//! the documented behavior (300s route cache TTL, 1s monitor tick, 300s alert
//! cooldown); `from_env` lets deployments tune without code changes.

use crate::error::{QueueCoreError, Result};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct QueueCoreConfig {
    /// TTL for cached routing decisions
    pub route_cache_ttl: Duration,
    /// Route cache entry count that triggers an expired-entry prune
    pub route_cache_max_entries: usize,
    /// TTL on dedup "processing" markers (self-heal after worker crash)
    pub dedup_ttl: Duration,
    /// Interval between queue monitor sampling ticks
    pub monitor_interval: Duration,
    /// Minimum gap between repeated alerts for the same (queue, message)
    pub alert_cooldown: Duration,
    /// Retention for dead-letter entries
    pub dlq_retention: Duration,
    /// Retention for permanent failure records and failure counters
    pub permanent_failure_retention: Duration,
    /// Retention for per-minute metric snapshots
    pub metrics_retention: Duration,
    /// Interval between per-worker health check rounds
    pub health_check_interval: Duration,
}

impl Default for QueueCoreConfig {
    fn default() -> Self {
        Self {
            route_cache_ttl: Duration::from_secs(300),
            route_cache_max_entries: 1000,
            dedup_ttl: Duration::from_secs(3600),
            monitor_interval: Duration::from_secs(1),
            alert_cooldown: Duration::from_secs(300),
            dlq_retention: Duration::from_secs(7 * 24 * 3600),
            permanent_failure_retention: Duration::from_secs(30 * 24 * 3600),
            metrics_retention: Duration::from_secs(7 * 24 * 3600),
            health_check_interval: Duration::from_secs(30),
        }
    }
}

impl QueueCoreConfig {
    /// Build configuration from environment variables, falling back to
    /// defaults for anything unset
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(secs) = parse_env_secs("RENDER_QUEUE_ROUTE_CACHE_TTL_SECS")? {
            config.route_cache_ttl = secs;
        }
        if let Ok(raw) = std::env::var("RENDER_QUEUE_ROUTE_CACHE_MAX_ENTRIES") {
            config.route_cache_max_entries = raw.parse().map_err(|e| {
                QueueCoreError::ConfigurationError(format!("Invalid route_cache_max_entries: {e}"))
            })?;
        }
        if let Some(secs) = parse_env_secs("RENDER_QUEUE_DEDUP_TTL_SECS")? {
            config.dedup_ttl = secs;
        }
        if let Some(secs) = parse_env_secs("RENDER_QUEUE_MONITOR_INTERVAL_SECS")? {
            config.monitor_interval = secs;
        }
        if let Some(secs) = parse_env_secs("RENDER_QUEUE_ALERT_COOLDOWN_SECS")? {
            config.alert_cooldown = secs;
        }
        if let Some(secs) = parse_env_secs("RENDER_QUEUE_HEALTH_CHECK_INTERVAL_SECS")? {
            config.health_check_interval = secs;
        }

        Ok(config)
    }
}

fn parse_env_secs(key: &str) -> Result<Option<Duration>> {
    match std::env::var(key) {
        Ok(raw) => {
            let secs: u64 = raw
                .parse()
                .map_err(|e| QueueCoreError::ConfigurationError(format!("Invalid {key}: {e}")))?;
            Ok(Some(Duration::from_secs(secs)))
        }
        Err(_) => Ok(None),
    }
}
