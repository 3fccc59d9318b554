//! Health check trait and result record.

use crate::constants::HealthStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Name of the check whose critical status triggers a restart attempt
pub const HEARTBEAT_CHECK: &str = "heartbeat";

/// Outcome of one health check run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub check_name: String,
    pub status: HealthStatus,
    pub message: String,
    /// Named measurements backing the status decision
    pub metrics: HashMap<String, f64>,
    pub timestamp: DateTime<Utc>,
}

impl HealthCheckResult {
    pub fn new(check_name: &str, status: HealthStatus, message: impl Into<String>) -> Self {
        Self {
            check_name: check_name.to_string(),
            status,
            message: message.into(),
            metrics: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_metric(mut self, name: &str, value: f64) -> Self {
        self.metrics.insert(name.to_string(), value);
        self
    }
}

/// A single health probe for a worker. Implementations live at the worker
/// boundary (heartbeat age, GPU memory, disk space); the monitor only cares
/// about the resulting status.
#[async_trait::async_trait]
pub trait HealthCheck: Send + Sync {
    fn name(&self) -> &str;

    /// Run the probe. Implementations must not panic; an internal failure
    /// should come back as `HealthStatus::Error`.
    async fn run(&self) -> HealthCheckResult;
}
