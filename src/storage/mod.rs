//! # Persistence Boundary
//!
//! Key-value, time-bucketed persistence for failure records, retry metadata,
//! counters, and metric snapshots. Nothing here is relational; every record
//! carries a TTL and lives in a dated bucket or a rolling window, matching
//! the retention rules in the data model (7 days for DLQ entries and metric
//! snapshots, 30 days for permanent failures and failure counters).

mod in_memory;
mod records;

pub use in_memory::InMemoryStore;
pub use records::{FailureRecord, QueueMetricsSnapshot, RetryMetadata};

use crate::error::Result;
use chrono::{DateTime, NaiveDate, Utc};
use std::time::Duration;

/// Store operations the core depends on
#[async_trait::async_trait]
pub trait QueueStore: Send + Sync {
    /// Append a failure record to the dated dead-letter bucket
    async fn append_dlq_entry(
        &self,
        date: NaiveDate,
        record: &FailureRecord,
        ttl: Duration,
    ) -> Result<()>;

    /// Append a failure record to the dated permanent-failure bucket
    async fn append_permanent_failure(
        &self,
        date: NaiveDate,
        record: &FailureRecord,
        ttl: Duration,
    ) -> Result<()>;

    /// All dead-letter entries recorded on a date
    async fn dlq_entries(&self, date: NaiveDate) -> Result<Vec<FailureRecord>>;

    /// All permanent failures recorded on a date
    async fn permanent_failures(&self, date: NaiveDate) -> Result<Vec<FailureRecord>>;

    /// Latest failure record for a task id, searching both buckets
    async fn find_failure(&self, task_id: &str) -> Result<Option<FailureRecord>>;

    /// Store retry metadata; written before the retry is enqueued
    async fn put_retry_metadata(&self, metadata: &RetryMetadata, ttl: Duration) -> Result<()>;

    /// Retry metadata for the retry task id, if still live
    async fn get_retry_metadata(&self, new_task_id: &str) -> Result<Option<RetryMetadata>>;

    /// Increment a named counter, refreshing its TTL
    async fn increment_counter(&self, name: &str, ttl: Duration) -> Result<u64>;

    /// Current value of a named counter (0 if absent or expired)
    async fn get_counter(&self, name: &str) -> Result<u64>;

    /// Persist the per-minute historical snapshot for a queue
    async fn put_snapshot(
        &self,
        queue_name: &str,
        snapshot: &QueueMetricsSnapshot,
        ttl: Duration,
    ) -> Result<()>;

    /// Historical snapshots for a queue since the given time, oldest first
    async fn snapshots_since(
        &self,
        queue_name: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<QueueMetricsSnapshot>>;

    /// Overwrite the current snapshot for a queue
    async fn put_current_snapshot(&self, snapshot: &QueueMetricsSnapshot) -> Result<()>;

    /// Current snapshot for a queue, if one has been taken
    async fn current_snapshot(&self, queue_name: &str) -> Result<Option<QueueMetricsSnapshot>>;
}

/// Counter key for dead-letter entries on a queue
pub fn dlq_counter_key(queue_name: &str) -> String {
    format!("dlq:queue:{queue_name}")
}

/// Counter key for dead-letter entries of an error type
pub fn error_counter_key(error_type: &str) -> String {
    format!("dlq:error:{error_type}")
}

/// Counter key for permanent failures on a queue
pub fn permanent_counter_key(queue_name: &str) -> String {
    format!("permanent:queue:{queue_name}")
}
