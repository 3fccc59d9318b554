//! # Queue Service Facade
//!
//! The single entry point the API and execution layers talk to. Wires the
//! router, deduplicator, dead-letter handler, monitor, and worker health
//! monitor around one broker and one store, all constructed explicitly at
//! process start and passed by reference, with no global singletons.

use crate::broker::{QueueBroker, QueueMessage, QueueMessageMetadata};
use crate::config::QueueCoreConfig;
use crate::constants::FailureOutcome;
use crate::dlq::{BackoffResolver, DeadLetterHandler, DlqStats};
use crate::error::{QueueCoreError, Result};
use crate::health::{HealthCheck, HealthCheckResult, WorkerController, WorkerHealthMonitor,
    WorkerHealthReport, WorkerHealthSummary};
use crate::metrics::CoreMetrics;
use crate::monitor::{AlertCallback, AlertManager, QueueHealth, QueueMonitor, QueueSummary,
    RateTracker};
use crate::registry::{QueueDefinition, QueueRegistry};
use crate::router::{Deduplicator, TaskDescriptor, TaskRouter};
use crate::storage::{FailureRecord, QueueMetricsSnapshot, QueueStore, RetryMetadata};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Result of a task submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub task_id: String,
    pub queue_name: String,
    pub priority: u8,
    /// Digest of the logical submission; hand back to
    /// [`QueueService::report_task_completed`] to release the dedup marker
    pub content_hash: String,
    /// True when an identical submission is already in flight; nothing was
    /// enqueued
    pub deduplicated: bool,
}

/// Everything the surrounding application needs from the queue core
pub struct QueueService {
    registry: Arc<QueueRegistry>,
    broker: Arc<dyn QueueBroker>,
    router: TaskRouter,
    dedup: Deduplicator,
    dlq: DeadLetterHandler,
    monitor: QueueMonitor,
    health: WorkerHealthMonitor,
    tracker: Arc<RateTracker>,
    metrics: Arc<CoreMetrics>,
}

impl QueueService {
    pub fn new(
        broker: Arc<dyn QueueBroker>,
        store: Arc<dyn QueueStore>,
        alert_callback: AlertCallback,
        worker_controller: Option<Arc<dyn WorkerController>>,
        config: QueueCoreConfig,
    ) -> Result<Self> {
        let registry = Arc::new(QueueRegistry::with_defaults());
        let metrics = Arc::new(CoreMetrics::new()?);
        let tracker = Arc::new(RateTracker::new());

        let router = TaskRouter::new(registry.clone(), &config);
        let dedup = Deduplicator::new(config.dedup_ttl);
        let dlq = DeadLetterHandler::new(
            broker.clone(),
            store.clone(),
            registry.clone(),
            BackoffResolver::with_defaults(),
            metrics.clone(),
            config.clone(),
        );
        let alerts = AlertManager::new(config.alert_cooldown, alert_callback, metrics.clone());
        let monitor = QueueMonitor::new(
            registry.clone(),
            broker.clone(),
            store,
            tracker.clone(),
            alerts,
            metrics.clone(),
            config.clone(),
        );
        let health = WorkerHealthMonitor::new(
            config.health_check_interval,
            metrics.clone(),
            worker_controller,
        );

        Ok(Self {
            registry,
            broker,
            router,
            dedup,
            dlq,
            monitor,
            health,
            tracker,
            metrics,
        })
    }

    /// Start the monitor and health loops
    pub async fn start(&self) {
        self.monitor.start().await;
        self.health.start().await;
        info!("🚀 Queue service started");
    }

    /// Stop all background loops, awaiting their clean exit
    pub async fn stop(&self) {
        self.monitor.stop().await;
        self.health.stop().await;
        info!("🛑 Queue service stopped");
    }

    // ---- Inbound: submission and execution feedback ----

    /// Route and enqueue a task. Total: any name and kwargs shape produces a
    /// decision; duplicates in flight are suppressed, not enqueued.
    pub async fn submit(
        &self,
        task_name: &str,
        args: Vec<serde_json::Value>,
        kwargs: HashMap<String, serde_json::Value>,
    ) -> Result<SubmitOutcome> {
        let content_hash = Deduplicator::content_hash(task_name, &args, &kwargs);
        let task = TaskDescriptor::from_kwargs(task_name, args, kwargs);
        let decision = self.router.route(&task);

        // Single atomic claim so concurrent identical submissions cannot
        // both pass a separate duplicate check before marking.
        if !self.dedup.try_mark_processing(&content_hash) {
            info!(
                task_name = %task_name,
                content_hash = %content_hash,
                "♻️ Duplicate submission suppressed"
            );
            return Ok(SubmitOutcome {
                task_id: String::new(),
                queue_name: decision.queue_name,
                priority: decision.priority,
                content_hash,
                deduplicated: true,
            });
        }

        let task_id = Uuid::new_v4().to_string();
        let message = QueueMessage {
            task_id: task_id.clone(),
            task_name: task.name.clone(),
            args: task.args,
            payload: task.payload,
            metadata: QueueMessageMetadata {
                enqueued_at: Utc::now(),
                priority: decision.priority,
                retry_count: 0,
                original_task_id: None,
            },
        };
        self.broker
            .enqueue(&decision.queue_name, message, None)
            .await?;
        self.metrics.record_task_routed(&decision.queue_name);

        Ok(SubmitOutcome {
            task_id,
            queue_name: decision.queue_name,
            priority: decision.priority,
            content_hash,
            deduplicated: false,
        })
    }

    /// Execution layer signal: a worker picked up a task
    pub fn report_task_started(&self, queue_name: &str) {
        self.tracker.record_started(queue_name);
    }

    /// Execution layer signal: a task finished successfully
    pub fn report_task_completed(
        &self,
        queue_name: &str,
        duration_secs: f64,
        content_hash: Option<&str>,
    ) {
        self.tracker.record_completed(queue_name, duration_secs);
        self.metrics.record_task_duration(queue_name, duration_secs);
        if let Some(hash) = content_hash {
            self.dedup.mark_completed(hash);
        }
    }

    /// Execution layer signal: a task raised. Classifies the failure and
    /// either schedules a retry or demotes it to a permanent failure.
    #[allow(clippy::too_many_arguments)]
    pub async fn report_failure(
        &self,
        task_id: &str,
        task_name: &str,
        args: Vec<serde_json::Value>,
        payload: HashMap<String, serde_json::Value>,
        queue_name: &str,
        error_type: &str,
        error_message: &str,
        traceback: &str,
        retry_count: u32,
    ) -> FailureOutcome {
        self.tracker.record_failed(queue_name);
        self.dlq
            .handle_failure(FailureRecord {
                task_id: task_id.to_string(),
                task_name: task_name.to_string(),
                args,
                payload,
                queue_name: queue_name.to_string(),
                error_type: error_type.to_string(),
                error_message: error_message.to_string(),
                traceback: traceback.to_string(),
                failed_at: Utc::now(),
                retry_count,
            })
            .await
    }

    // ---- Outbound: operator queries ----

    pub fn list_queues(&self) -> Vec<QueueDefinition> {
        self.registry.all().cloned().collect()
    }

    pub async fn get_queue_metrics(
        &self,
        queue_name: &str,
        hours: u32,
    ) -> Result<Vec<QueueMetricsSnapshot>> {
        self.require_queue(queue_name)?;
        self.monitor.historical_metrics(queue_name, hours).await
    }

    pub async fn get_queue_health(&self, queue_name: &str) -> Result<QueueHealth> {
        self.require_queue(queue_name)?;
        Ok(self.monitor.queue_health(queue_name).await)
    }

    pub async fn get_queue_summary(&self) -> QueueSummary {
        self.monitor.queue_summary().await
    }

    pub async fn get_dlq_stats(&self, date: NaiveDate) -> Result<DlqStats> {
        self.dlq.stats(date).await
    }

    pub async fn get_recent_failures(&self, hours: u32) -> Result<Vec<FailureRecord>> {
        self.dlq.recent_failures(hours).await
    }

    pub async fn retry_failed_task(&self, task_id: &str, force: bool) -> Result<RetryMetadata> {
        self.dlq.retry_task(task_id, force).await
    }

    pub async fn purge_queue(&self, queue_name: &str) -> Result<u64> {
        self.require_queue(queue_name)?;
        let purged = self.broker.purge(queue_name).await?;
        info!(queue = %queue_name, purged = purged, "🧹 Queue purged by operator");
        Ok(purged)
    }

    // ---- Worker health ----

    pub fn register_worker(&self, worker_id: &str, checks: Vec<Arc<dyn HealthCheck>>) {
        self.health.register_worker(worker_id, checks);
    }

    pub fn get_worker_health_summary(&self) -> Vec<WorkerHealthSummary> {
        self.health.summary()
    }

    pub fn get_worker_health_detail(&self, worker_id: &str) -> Result<WorkerHealthReport> {
        self.health.detail(worker_id)
    }

    pub async fn run_health_check(
        &self,
        worker_id: &str,
        check_name: Option<&str>,
    ) -> Result<Vec<HealthCheckResult>> {
        self.health.run_check(worker_id, check_name).await
    }

    // ---- Metrics export ----

    /// All counters and gauges in the text exposition format, for scraping
    pub fn export_metrics(&self) -> Result<String> {
        self.metrics.render()
    }

    fn require_queue(&self, queue_name: &str) -> Result<()> {
        if self.registry.contains(queue_name) {
            Ok(())
        } else {
            Err(QueueCoreError::UnknownQueue(queue_name.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::InMemoryBroker;
    use crate::storage::InMemoryStore;
    use serde_json::json;

    fn service() -> (Arc<InMemoryBroker>, QueueService) {
        let broker = Arc::new(InMemoryBroker::new());
        let service = QueueService::new(
            broker.clone(),
            Arc::new(InMemoryStore::new()),
            Arc::new(|_| {}),
            None,
            QueueCoreConfig::default(),
        )
        .unwrap();
        (broker, service)
    }

    #[tokio::test]
    async fn test_submit_routes_and_enqueues() {
        let (broker, service) = service();
        let outcome = service
            .submit("generate_image", vec![], HashMap::new())
            .await
            .unwrap();
        assert_eq!(outcome.queue_name, "gpu.generation");
        assert_eq!(outcome.priority, 8);
        assert!(!outcome.deduplicated);
        assert_eq!(broker.queue_depth("gpu.generation").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_submission_suppressed() {
        let (broker, service) = service();
        let kwargs = HashMap::from([("scene".to_string(), json!(1))]);
        let first = service
            .submit("generate_image", vec![], kwargs.clone())
            .await
            .unwrap();
        assert!(!first.deduplicated);

        let second = service
            .submit("generate_image", vec![], kwargs.clone())
            .await
            .unwrap();
        assert!(second.deduplicated);
        assert_eq!(broker.queue_depth("gpu.generation").await.unwrap(), 1);

        // Completion releases the marker
        service.report_task_completed("gpu.generation", 1.5, Some(&first.content_hash));
        let third = service.submit("generate_image", vec![], kwargs).await.unwrap();
        assert!(!third.deduplicated);
    }

    #[tokio::test]
    async fn test_report_failure_schedules_retry() {
        let (broker, service) = service();
        let outcome = service
            .report_failure(
                "t1",
                "make_thumbnail",
                vec![],
                HashMap::new(),
                "cpu.thumbnail",
                "TimeoutError",
                "timed out",
                "trace",
                0,
            )
            .await;
        assert_eq!(outcome, FailureOutcome::RetryScheduled);
        assert_eq!(broker.queue_depth("cpu.thumbnail").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_queue_operations_error() {
        let (_, service) = service();
        assert!(matches!(
            service.purge_queue("no.such.queue").await,
            Err(QueueCoreError::UnknownQueue(_))
        ));
        assert!(matches!(
            service.get_queue_health("no.such.queue").await,
            Err(QueueCoreError::UnknownQueue(_))
        ));
    }

    #[tokio::test]
    async fn test_list_queues_and_export() {
        let (_, service) = service();
        assert_eq!(service.list_queues().len(), 8);

        service
            .submit("generate_image", vec![], HashMap::new())
            .await
            .unwrap();
        let exported = service.export_metrics().unwrap();
        assert!(exported.contains("queue_tasks_routed_total"));
    }
}
