//! Dead-letter handler: retry scheduling and permanent-failure demotion.

use super::{BackoffResolver, FailureClassifier};
use crate::broker::{QueueBroker, QueueMessage, QueueMessageMetadata};
use crate::config::QueueCoreConfig;
use crate::constants::{FailureOutcome, PRIORITY_MIN};
use crate::error::{QueueCoreError, Result};
use crate::logging::log_dlq_operation;
use crate::metrics::CoreMetrics;
use crate::registry::QueueRegistry;
use crate::storage::{
    dlq_counter_key, error_counter_key, permanent_counter_key, FailureRecord, QueueStore,
    RetryMetadata,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Aggregated dead-letter statistics for one date bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqStats {
    pub date: NaiveDate,
    pub dlq_entries: usize,
    pub permanent_failures: usize,
    pub by_queue: HashMap<String, u64>,
    pub by_error_type: HashMap<String, u64>,
}

/// Handles task failures: classify, back off and retry, or demote
pub struct DeadLetterHandler {
    broker: Arc<dyn QueueBroker>,
    store: Arc<dyn QueueStore>,
    registry: Arc<QueueRegistry>,
    classifier: FailureClassifier,
    resolver: BackoffResolver,
    metrics: Arc<CoreMetrics>,
    config: QueueCoreConfig,
}

impl DeadLetterHandler {
    pub fn new(
        broker: Arc<dyn QueueBroker>,
        store: Arc<dyn QueueStore>,
        registry: Arc<QueueRegistry>,
        resolver: BackoffResolver,
        metrics: Arc<CoreMetrics>,
        config: QueueCoreConfig,
    ) -> Self {
        Self {
            broker,
            store,
            registry,
            classifier: FailureClassifier::new(),
            resolver,
            metrics,
            config,
        }
    }

    /// Handle one execution failure. Never errors out: every path ends in a
    /// scheduled retry or a terminal record.
    pub async fn handle_failure(&self, record: FailureRecord) -> FailureOutcome {
        let classification = self
            .classifier
            .classify(&record.error_type, &record.error_message);

        if !classification.is_retryable {
            return self.demote(record, FailureOutcome::NonRetryable).await;
        }

        let backoff = self
            .resolver
            .resolve(&record.queue_name, &record.task_name)
            .clone();

        if record.retry_count >= backoff.max_retries {
            return self.demote(record, FailureOutcome::RetriesExhausted).await;
        }

        match self.schedule_retry(&record, &backoff, record.retry_count).await {
            Ok(metadata) => {
                self.record_dlq_entry(&record).await;
                self.metrics
                    .record_retry_scheduled(&record.queue_name, backoff.policy.as_str());
                log_dlq_operation(
                    "retry_scheduled",
                    &record.task_id,
                    &record.task_name,
                    &record.queue_name,
                    metadata.retry_count,
                    Some(&format!("delay={}s", metadata.delay_secs)),
                );
                FailureOutcome::RetryScheduled
            }
            Err(e) => {
                // A failed scheduling call must not leave the task in limbo
                error!(
                    task_id = %record.task_id,
                    error = %e,
                    "Retry scheduling failed, demoting to permanent failure"
                );
                self.demote(record, FailureOutcome::SchedulingFailed).await
            }
        }
    }

    /// Operator-initiated retry. `force` bypasses the max-retries check; a
    /// fresh task id is always generated.
    pub async fn retry_task(&self, task_id: &str, force: bool) -> Result<RetryMetadata> {
        let record = self
            .store
            .find_failure(task_id)
            .await?
            .ok_or_else(|| QueueCoreError::UnknownTask(task_id.to_string()))?;

        let backoff = self
            .resolver
            .resolve(&record.queue_name, &record.task_name)
            .clone();

        if !force && record.retry_count >= backoff.max_retries {
            return Err(QueueCoreError::RetryNotPermitted {
                task_id: task_id.to_string(),
                max_retries: backoff.max_retries,
            });
        }

        let metadata = self
            .schedule_retry(&record, &backoff, record.retry_count)
            .await?;
        info!(
            task_id = %task_id,
            new_task_id = %metadata.new_task_id,
            force = force,
            "🔁 Manual retry scheduled"
        );
        Ok(metadata)
    }

    /// Dead-letter statistics for a date bucket
    pub async fn stats(&self, date: NaiveDate) -> Result<DlqStats> {
        let entries = self.store.dlq_entries(date).await?;
        let permanent = self.store.permanent_failures(date).await?;

        let mut by_queue: HashMap<String, u64> = HashMap::new();
        let mut by_error_type: HashMap<String, u64> = HashMap::new();
        for record in &entries {
            *by_queue.entry(record.queue_name.clone()).or_default() += 1;
            *by_error_type.entry(record.error_type.clone()).or_default() += 1;
        }

        Ok(DlqStats {
            date,
            dlq_entries: entries.len(),
            permanent_failures: permanent.len(),
            by_queue,
            by_error_type,
        })
    }

    /// Failures recorded in the last `hours`, newest first, both buckets
    pub async fn recent_failures(&self, hours: u32) -> Result<Vec<FailureRecord>> {
        let cutoff = Utc::now() - chrono::Duration::hours(i64::from(hours));
        let mut result = Vec::new();

        // Dated buckets: walk back far enough to cover the window
        let days = (hours / 24) + 2;
        for offset in 0..days {
            let date = (Utc::now() - chrono::Duration::days(i64::from(offset))).date_naive();
            for record in self.store.dlq_entries(date).await? {
                if record.failed_at >= cutoff {
                    result.push(record);
                }
            }
            for record in self.store.permanent_failures(date).await? {
                if record.failed_at >= cutoff {
                    result.push(record);
                }
            }
        }

        result.sort_by(|a, b| b.failed_at.cmp(&a.failed_at));
        Ok(result)
    }

    async fn schedule_retry(
        &self,
        record: &FailureRecord,
        backoff: &super::BackoffConfig,
        attempt: u32,
    ) -> Result<RetryMetadata> {
        let delay = backoff.compute_delay(attempt);
        let new_task_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let metadata = RetryMetadata {
            original_task_id: record.task_id.clone(),
            new_task_id: new_task_id.clone(),
            retry_count: record.retry_count + 1,
            scheduled_at: now,
            delay_secs: delay.as_secs_f64(),
            policy: backoff.policy.as_str().to_string(),
            next_attempt_at: now
                + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero()),
        };

        // Metadata first: an observer must never see an in-flight retry
        // without it. TTL covers the full delay window plus an hour.
        let metadata_ttl = delay * 2 + Duration::from_secs(3600);
        self.store
            .put_retry_metadata(&metadata, metadata_ttl)
            .await?;

        // Retries run one step below the queue's base priority
        let priority = self
            .registry
            .get(&record.queue_name)
            .map(|q| q.base_priority.saturating_sub(1).max(PRIORITY_MIN))
            .unwrap_or(PRIORITY_MIN);

        let message = QueueMessage {
            task_id: new_task_id,
            task_name: record.task_name.clone(),
            args: record.args.clone(),
            payload: record.payload.clone(),
            metadata: QueueMessageMetadata {
                enqueued_at: now,
                priority,
                retry_count: record.retry_count + 1,
                original_task_id: Some(record.task_id.clone()),
            },
        };

        self.broker
            .enqueue(&record.queue_name, message, Some(delay))
            .await?;

        Ok(metadata)
    }

    async fn record_dlq_entry(&self, record: &FailureRecord) {
        let date = record.failed_at.date_naive();
        if let Err(e) = self
            .store
            .append_dlq_entry(date, record, self.config.dlq_retention)
            .await
        {
            warn!(task_id = %record.task_id, error = %e, "Failed to persist DLQ entry");
        }

        let counter_ttl = self.config.permanent_failure_retention;
        let _ = self
            .store
            .increment_counter(&dlq_counter_key(&record.queue_name), counter_ttl)
            .await;
        let _ = self
            .store
            .increment_counter(&error_counter_key(&record.error_type), counter_ttl)
            .await;
        self.metrics
            .record_dlq_entry(&record.queue_name, &record.error_type);
    }

    async fn demote(&self, record: FailureRecord, outcome: FailureOutcome) -> FailureOutcome {
        let date = record.failed_at.date_naive();
        if let Err(e) = self
            .store
            .append_permanent_failure(date, &record, self.config.permanent_failure_retention)
            .await
        {
            warn!(task_id = %record.task_id, error = %e, "Failed to persist permanent failure");
        }

        let _ = self
            .store
            .increment_counter(
                &permanent_counter_key(&record.queue_name),
                self.config.permanent_failure_retention,
            )
            .await;
        self.metrics.record_permanent_failure(&record.queue_name);

        log_dlq_operation(
            "permanent_failure",
            &record.task_id,
            &record.task_name,
            &record.queue_name,
            record.retry_count,
            Some(outcome.as_str()),
        );
        outcome
    }
}
