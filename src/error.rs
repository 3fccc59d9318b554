//! # Structured Error Handling
//!
//! Crate-wide error type for the queue routing and reliability core. Expected
//! operational conditions (unknown task names, empty metrics windows, cache
//! misses) never surface here; components return safe defaults for those.
//! These variants cover genuine faults: broker wiring, malformed persisted
//! state, and invalid operator requests.

/// Errors raised by the queue core for exceptional conditions
#[derive(Debug, thiserror::Error)]
pub enum QueueCoreError {
    /// Broker interaction failed (enqueue, depth query, purge)
    #[error("Broker error during {operation}: {reason}")]
    BrokerError { operation: String, reason: String },

    /// Persisted record could not be stored or decoded
    #[error("Storage error during {operation}: {reason}")]
    StorageError { operation: String, reason: String },

    /// Operator referenced a queue not present in the registry
    #[error("Unknown queue: {0}")]
    UnknownQueue(String),

    /// Operator referenced a task with no failure record on file
    #[error("No failure record found for task {0}")]
    UnknownTask(String),

    /// Manual retry refused because the retry budget is spent and force was
    /// not set
    #[error("Task {task_id} has exhausted its {max_retries} retries; use force to retry anyway")]
    RetryNotPermitted { task_id: String, max_retries: u32 },

    /// Worker id is not under health monitoring
    #[error("Worker {0} is not monitored")]
    UnknownWorker(String),

    /// Health check name not registered for the worker
    #[error("Unknown health check: {0}")]
    UnknownCheck(String),

    /// Configuration value failed to parse
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Metrics registry or exposition failure
    #[error("Metrics error: {0}")]
    MetricsError(String),
}

pub type Result<T> = std::result::Result<T, QueueCoreError>;

impl From<prometheus::Error> for QueueCoreError {
    fn from(err: prometheus::Error) -> Self {
        QueueCoreError::MetricsError(err.to_string())
    }
}

impl From<serde_json::Error> for QueueCoreError {
    fn from(err: serde_json::Error) -> Self {
        QueueCoreError::StorageError {
            operation: "serialize".to_string(),
            reason: err.to_string(),
        }
    }
}
