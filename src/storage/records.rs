//! Persisted record types shared by the dead-letter handler and monitor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Record of a single task execution failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub task_id: String,
    pub task_name: String,
    pub args: Vec<serde_json::Value>,
    pub payload: HashMap<String, serde_json::Value>,
    /// Queue the task was running on when it failed
    pub queue_name: String,
    /// Exception type name, matched against the non-retryable set
    pub error_type: String,
    pub error_message: String,
    pub traceback: String,
    pub failed_at: DateTime<Utc>,
    /// Retries already consumed before this failure; incremented only by the
    /// dead-letter handler
    pub retry_count: u32,
}

/// Bookkeeping written each time a retry is scheduled, before the enqueue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryMetadata {
    pub original_task_id: String,
    pub new_task_id: String,
    pub retry_count: u32,
    pub scheduled_at: DateTime<Utc>,
    pub delay_secs: f64,
    pub policy: String,
    pub next_attempt_at: DateTime<Utc>,
}

/// Point-in-time metrics for one queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMetricsSnapshot {
    pub queue_name: String,
    /// Literal broker-reported length, never inferred
    pub depth: u64,
    /// Processing starts per second over the last minute
    pub processing_rate: f64,
    /// Completions per second over the last minute
    pub completion_rate: f64,
    /// failed / (failed + completed) x 100 over the last five minutes
    pub error_rate: f64,
    /// Mean task duration in seconds over the last fifteen minutes
    pub avg_processing_time: f64,
    /// Age in seconds of the head-of-queue task, 0 when empty
    pub oldest_task_age: f64,
    /// Depth-derived heuristic, not a real broker consumer query
    pub active_consumers: u32,
    pub timestamp: DateTime<Utc>,
}

impl QueueMetricsSnapshot {
    /// Zeroed snapshot returned when a queue has never been sampled
    pub fn empty(queue_name: &str) -> Self {
        Self {
            queue_name: queue_name.to_string(),
            depth: 0,
            processing_rate: 0.0,
            completion_rate: 0.0,
            error_rate: 0.0,
            avg_processing_time: 0.0,
            oldest_task_age: 0.0,
            active_consumers: 0,
            timestamp: Utc::now(),
        }
    }
}
