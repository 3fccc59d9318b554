//! In-memory store used by tests and local development.
//!
//! Every entry carries its expiry; expired entries are filtered on read and
//! swept lazily on write, so behavior matches a TTL-capable external store.

use super::{FailureRecord, QueueMetricsSnapshot, QueueStore, RetryMetadata};
use crate::error::Result;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use std::time::Duration;

// TTLs are bounded (30 days at most); a decade is a safe overflow guard.
fn to_chrono(ttl: Duration) -> chrono::Duration {
    chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(3650))
}

#[derive(Debug, Clone)]
struct Expiring<T> {
    expires_at: DateTime<Utc>,
    value: T,
}

impl<T> Expiring<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            expires_at: Utc::now() + to_chrono(ttl),
            value,
        }
    }

    fn live(&self) -> bool {
        self.expires_at > Utc::now()
    }
}

/// Store stand-in holding all buckets in process memory
#[derive(Debug, Default)]
pub struct InMemoryStore {
    dlq_buckets: DashMap<NaiveDate, Vec<Expiring<FailureRecord>>>,
    permanent_buckets: DashMap<NaiveDate, Vec<Expiring<FailureRecord>>>,
    retry_metadata: DashMap<String, Expiring<RetryMetadata>>,
    counters: DashMap<String, Expiring<u64>>,
    snapshots: DashMap<String, Vec<Expiring<QueueMetricsSnapshot>>>,
    current: DashMap<String, QueueMetricsSnapshot>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count of live retry metadata records (test helper)
    pub fn retry_metadata_count(&self) -> usize {
        self.retry_metadata.iter().filter(|e| e.live()).count()
    }
}

#[async_trait::async_trait]
impl QueueStore for InMemoryStore {
    async fn append_dlq_entry(
        &self,
        date: NaiveDate,
        record: &FailureRecord,
        ttl: Duration,
    ) -> Result<()> {
        self.dlq_buckets
            .entry(date)
            .or_default()
            .push(Expiring::new(record.clone(), ttl));
        Ok(())
    }

    async fn append_permanent_failure(
        &self,
        date: NaiveDate,
        record: &FailureRecord,
        ttl: Duration,
    ) -> Result<()> {
        self.permanent_buckets
            .entry(date)
            .or_default()
            .push(Expiring::new(record.clone(), ttl));
        Ok(())
    }

    async fn dlq_entries(&self, date: NaiveDate) -> Result<Vec<FailureRecord>> {
        Ok(self
            .dlq_buckets
            .get(&date)
            .map(|b| {
                b.iter()
                    .filter(|e| e.live())
                    .map(|e| e.value.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn permanent_failures(&self, date: NaiveDate) -> Result<Vec<FailureRecord>> {
        Ok(self
            .permanent_buckets
            .get(&date)
            .map(|b| {
                b.iter()
                    .filter(|e| e.live())
                    .map(|e| e.value.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_failure(&self, task_id: &str) -> Result<Option<FailureRecord>> {
        let mut latest: Option<FailureRecord> = None;
        for bucket in self.dlq_buckets.iter().chain(self.permanent_buckets.iter()) {
            for entry in bucket.iter().filter(|e| e.live()) {
                if entry.value.task_id == task_id
                    && latest
                        .as_ref()
                        .map(|l| entry.value.failed_at > l.failed_at)
                        .unwrap_or(true)
                {
                    latest = Some(entry.value.clone());
                }
            }
        }
        Ok(latest)
    }

    async fn put_retry_metadata(&self, metadata: &RetryMetadata, ttl: Duration) -> Result<()> {
        self.retry_metadata.insert(
            metadata.new_task_id.clone(),
            Expiring::new(metadata.clone(), ttl),
        );
        Ok(())
    }

    async fn get_retry_metadata(&self, new_task_id: &str) -> Result<Option<RetryMetadata>> {
        Ok(self
            .retry_metadata
            .get(new_task_id)
            .filter(|e| e.live())
            .map(|e| e.value.clone()))
    }

    async fn increment_counter(&self, name: &str, ttl: Duration) -> Result<u64> {
        let mut entry = self
            .counters
            .entry(name.to_string())
            .or_insert_with(|| Expiring::new(0, ttl));
        if !entry.live() {
            *entry = Expiring::new(0, ttl);
        }
        entry.value += 1;
        entry.expires_at = Utc::now() + to_chrono(ttl);
        Ok(entry.value)
    }

    async fn get_counter(&self, name: &str) -> Result<u64> {
        Ok(self
            .counters
            .get(name)
            .filter(|e| e.live())
            .map(|e| e.value)
            .unwrap_or(0))
    }

    async fn put_snapshot(
        &self,
        queue_name: &str,
        snapshot: &QueueMetricsSnapshot,
        ttl: Duration,
    ) -> Result<()> {
        let mut series = self.snapshots.entry(queue_name.to_string()).or_default();
        series.retain(|e| e.live());
        series.push(Expiring::new(snapshot.clone(), ttl));
        Ok(())
    }

    async fn snapshots_since(
        &self,
        queue_name: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<QueueMetricsSnapshot>> {
        let mut result: Vec<QueueMetricsSnapshot> = self
            .snapshots
            .get(queue_name)
            .map(|series| {
                series
                    .iter()
                    .filter(|e| e.live() && e.value.timestamp >= since)
                    .map(|e| e.value.clone())
                    .collect()
            })
            .unwrap_or_default();
        result.sort_by_key(|s| s.timestamp);
        Ok(result)
    }

    async fn put_current_snapshot(&self, snapshot: &QueueMetricsSnapshot) -> Result<()> {
        self.current
            .insert(snapshot.queue_name.clone(), snapshot.clone());
        Ok(())
    }

    async fn current_snapshot(&self, queue_name: &str) -> Result<Option<QueueMetricsSnapshot>> {
        Ok(self.current.get(queue_name).map(|s| s.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn record(task_id: &str, queue: &str) -> FailureRecord {
        FailureRecord {
            task_id: task_id.to_string(),
            task_name: "video.render_frame".to_string(),
            args: vec![],
            payload: HashMap::new(),
            queue_name: queue.to_string(),
            error_type: "TimeoutError".to_string(),
            error_message: "broker timed out".to_string(),
            traceback: String::new(),
            failed_at: Utc::now(),
            retry_count: 0,
        }
    }

    #[tokio::test]
    async fn test_dated_buckets_are_independent() {
        let store = InMemoryStore::new();
        let today = Utc::now().date_naive();
        let ttl = Duration::from_secs(60);
        store
            .append_dlq_entry(today, &record("a", "q"), ttl)
            .await
            .unwrap();
        store
            .append_permanent_failure(today, &record("b", "q"), ttl)
            .await
            .unwrap();

        assert_eq!(store.dlq_entries(today).await.unwrap().len(), 1);
        assert_eq!(store.permanent_failures(today).await.unwrap().len(), 1);
        let yesterday = today.pred_opt().unwrap();
        assert!(store.dlq_entries(yesterday).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expired_entries_are_invisible() {
        let store = InMemoryStore::new();
        let today = Utc::now().date_naive();
        store
            .append_dlq_entry(today, &record("a", "q"), Duration::ZERO)
            .await
            .unwrap();
        assert!(store.dlq_entries(today).await.unwrap().is_empty());

        store
            .increment_counter("dlq:queue:q", Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(store.get_counter("dlq:queue:q").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_find_failure_returns_latest() {
        let store = InMemoryStore::new();
        let today = Utc::now().date_naive();
        let ttl = Duration::from_secs(60);
        let mut first = record("t1", "q");
        first.failed_at = Utc::now() - chrono::Duration::seconds(30);
        let mut second = record("t1", "q");
        second.retry_count = 2;
        store.append_dlq_entry(today, &first, ttl).await.unwrap();
        store
            .append_permanent_failure(today, &second, ttl)
            .await
            .unwrap();

        let found = store.find_failure("t1").await.unwrap().unwrap();
        assert_eq!(found.retry_count, 2);
        assert!(store.find_failure("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_counters_increment_and_refresh() {
        let store = InMemoryStore::new();
        let ttl = Duration::from_secs(60);
        assert_eq!(store.increment_counter("c", ttl).await.unwrap(), 1);
        assert_eq!(store.increment_counter("c", ttl).await.unwrap(), 2);
        assert_eq!(store.get_counter("c").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_current_snapshot_overwrites() {
        let store = InMemoryStore::new();
        let mut snap = QueueMetricsSnapshot::empty("q");
        snap.depth = 5;
        store.put_current_snapshot(&snap).await.unwrap();
        snap.depth = 9;
        store.put_current_snapshot(&snap).await.unwrap();
        assert_eq!(store.current_snapshot("q").await.unwrap().unwrap().depth, 9);
    }
}
