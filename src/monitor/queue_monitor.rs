//! Periodic queue sampling loop and historical metric queries.

use super::{AlertConfig, AlertManager, RateTracker};
use crate::broker::QueueBroker;
use crate::config::QueueCoreConfig;
use crate::error::Result;
use crate::logging::log_error;
use crate::metrics::CoreMetrics;
use crate::registry::QueueRegistry;
use crate::storage::{QueueMetricsSnapshot, QueueStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Current health of one queue: its latest snapshot plus any thresholds it
/// is violating right now
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueHealth {
    pub queue_name: String,
    pub snapshot: QueueMetricsSnapshot,
    pub violations: Vec<String>,
    pub healthy: bool,
}

/// Aggregate view across all monitored queues
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSummary {
    pub queue_count: usize,
    pub total_depth: u64,
    pub mean_error_rate: f64,
    pub queues_in_violation: usize,
    pub timestamp: DateTime<Utc>,
}

struct MonitorInner {
    registry: Arc<QueueRegistry>,
    broker: Arc<dyn QueueBroker>,
    store: Arc<dyn QueueStore>,
    tracker: Arc<RateTracker>,
    alerts: AlertManager,
    alert_configs: HashMap<String, AlertConfig>,
    metrics: Arc<CoreMetrics>,
    config: QueueCoreConfig,
    /// Minute of the last persisted historical snapshot, per queue
    last_persisted_minute: dashmap::DashMap<String, i64>,
}

/// Samples every registered queue on a fixed interval, evaluates alerts, and
/// persists snapshots. One cooperative loop covers the whole queue set.
pub struct QueueMonitor {
    inner: Arc<MonitorInner>,
    shutdown: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl QueueMonitor {
    pub fn new(
        registry: Arc<QueueRegistry>,
        broker: Arc<dyn QueueBroker>,
        store: Arc<dyn QueueStore>,
        tracker: Arc<RateTracker>,
        alerts: AlertManager,
        metrics: Arc<CoreMetrics>,
        config: QueueCoreConfig,
    ) -> Self {
        let alert_configs = registry
            .all()
            .map(|q| {
                (
                    q.name.clone(),
                    AlertConfig::for_queue_depth_bound(q.max_length),
                )
            })
            .collect();

        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(MonitorInner {
                registry,
                broker,
                store,
                tracker,
                alerts,
                alert_configs,
                metrics,
                config,
                last_persisted_minute: dashmap::DashMap::new(),
            }),
            shutdown,
            handle: Mutex::new(None),
        }
    }

    /// Override the alert thresholds for one queue
    pub fn set_alert_config(&mut self, queue_name: &str, config: AlertConfig) {
        // Only callable before start(): inner is not yet shared with the loop
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner
                .alert_configs
                .insert(queue_name.to_string(), config);
        }
    }

    /// Spawn the sampling loop; idempotent
    pub async fn start(&self) {
        let mut handle = self.handle.lock().await;
        if handle.is_some() {
            return;
        }
        let _ = self.shutdown.send(false);
        let inner = self.inner.clone();
        let mut shutdown_rx = self.shutdown.subscribe();
        info!(
            interval_secs = inner.config.monitor_interval.as_secs(),
            queues = inner.registry.len(),
            "📊 Queue monitor started"
        );

        *handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.config.monitor_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        Self::run_tick(&inner).await;
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            debug!("Queue monitor loop exiting");
                            break;
                        }
                    }
                }
            }
        }));
    }

    /// Cancel the sampling loop and await its clean exit
    pub async fn stop(&self) {
        let _ = self.shutdown.send(true);
        let mut handle = self.handle.lock().await;
        if let Some(task) = handle.take() {
            if let Err(e) = task.await {
                warn!("Monitor task join failed: {e}");
            }
        }
        info!("📊 Queue monitor stopped");
    }

    /// One sampling pass over every queue; failures are logged, not raised
    async fn run_tick(inner: &MonitorInner) {
        for queue in inner.registry.all() {
            match Self::sample_queue(inner, &queue.name).await {
                Ok(snapshot) => {
                    if let Some(alert_config) = inner.alert_configs.get(&queue.name) {
                        inner.alerts.evaluate(&snapshot, alert_config);
                    }
                    Self::persist(inner, &snapshot).await;
                }
                Err(e) => {
                    log_error(
                        "queue_monitor",
                        "sample_queue",
                        &e.to_string(),
                        Some(&queue.name),
                    );
                }
            }
        }
    }

    async fn sample_queue(inner: &MonitorInner, queue_name: &str) -> Result<QueueMetricsSnapshot> {
        let now = Utc::now();
        let depth = inner.broker.queue_depth(queue_name).await?;
        let oldest_task_age = match inner.broker.oldest_enqueued_at(queue_name).await? {
            Some(enqueued_at) => (now - enqueued_at).num_milliseconds().max(0) as f64 / 1000.0,
            None => 0.0,
        };
        let rates = inner.tracker.sample(queue_name);

        Ok(QueueMetricsSnapshot {
            queue_name: queue_name.to_string(),
            depth,
            processing_rate: rates.processing_rate,
            completion_rate: rates.completion_rate,
            error_rate: rates.error_rate,
            avg_processing_time: rates.avg_processing_time,
            oldest_task_age,
            active_consumers: estimate_consumers(depth),
            timestamp: now,
        })
    }

    async fn persist(inner: &MonitorInner, snapshot: &QueueMetricsSnapshot) {
        if let Err(e) = inner.store.put_current_snapshot(snapshot).await {
            warn!(queue = %snapshot.queue_name, error = %e, "Failed to persist current snapshot");
        }

        // Historical series is per-minute; skip ticks inside the same minute
        let minute = snapshot.timestamp.timestamp() / 60;
        let is_new_minute = inner
            .last_persisted_minute
            .insert(snapshot.queue_name.clone(), minute)
            .map(|previous| previous != minute)
            .unwrap_or(true);
        if is_new_minute {
            if let Err(e) = inner
                .store
                .put_snapshot(&snapshot.queue_name, snapshot, inner.config.metrics_retention)
                .await
            {
                warn!(queue = %snapshot.queue_name, error = %e, "Failed to persist snapshot history");
            }
        }

        inner
            .metrics
            .set_queue_depth(&snapshot.queue_name, snapshot.depth);
        inner.metrics.set_queue_rates(
            &snapshot.queue_name,
            snapshot.processing_rate,
            snapshot.error_rate,
        );
    }

    /// Current snapshot for a queue; zeroed default when never sampled
    pub async fn current_metrics(&self, queue_name: &str) -> QueueMetricsSnapshot {
        match self.inner.store.current_snapshot(queue_name).await {
            Ok(Some(snapshot)) => snapshot,
            _ => QueueMetricsSnapshot::empty(queue_name),
        }
    }

    /// Per-minute snapshots for the requested window, oldest first
    pub async fn historical_metrics(
        &self,
        queue_name: &str,
        hours: u32,
    ) -> Result<Vec<QueueMetricsSnapshot>> {
        let since = Utc::now() - chrono::Duration::hours(i64::from(hours));
        self.inner.store.snapshots_since(queue_name, since).await
    }

    /// Latest snapshot plus current threshold violations for one queue
    pub async fn queue_health(&self, queue_name: &str) -> QueueHealth {
        let snapshot = self.current_metrics(queue_name).await;
        let violations = self
            .inner
            .alert_configs
            .get(queue_name)
            .map(|config| config.violations(&snapshot))
            .unwrap_or_default();
        QueueHealth {
            queue_name: queue_name.to_string(),
            healthy: violations.is_empty(),
            snapshot,
            violations,
        }
    }

    /// Aggregate totals across all queues
    pub async fn queue_summary(&self) -> QueueSummary {
        let mut total_depth = 0u64;
        let mut error_rates = Vec::new();
        let mut violations = 0usize;

        for queue in self.inner.registry.all() {
            let snapshot = self.current_metrics(&queue.name).await;
            total_depth += snapshot.depth;
            error_rates.push(snapshot.error_rate);
            if let Some(config) = self.inner.alert_configs.get(&queue.name) {
                if !config.violations(&snapshot).is_empty() {
                    violations += 1;
                }
            }
        }

        let mean_error_rate = if error_rates.is_empty() {
            0.0
        } else {
            error_rates.iter().sum::<f64>() / error_rates.len() as f64
        };

        QueueSummary {
            queue_count: self.inner.registry.len(),
            total_depth,
            mean_error_rate,
            queues_in_violation: violations,
            timestamp: Utc::now(),
        }
    }

    /// Run one sampling pass immediately (tests, on-demand refresh)
    pub async fn sample_once(&self) {
        Self::run_tick(&self.inner).await;
    }
}

/// Consumer-count heuristic: the broker interface has no consumer query, so
/// this is a documented step function of depth, not a measurement
fn estimate_consumers(depth: u64) -> u32 {
    if depth == 0 {
        1
    } else {
        ((depth / 20) as u32).clamp(1, 5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{InMemoryBroker, QueueMessage, QueueMessageMetadata};
    use crate::monitor::AlertCallback;
    use crate::storage::InMemoryStore;
    use std::collections::HashMap as StdHashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn message(task_id: &str) -> QueueMessage {
        QueueMessage {
            task_id: task_id.to_string(),
            task_name: "t".to_string(),
            args: vec![],
            payload: StdHashMap::new(),
            metadata: QueueMessageMetadata {
                enqueued_at: Utc::now(),
                priority: 5,
                retry_count: 0,
                original_task_id: None,
            },
        }
    }

    struct Fixture {
        broker: Arc<InMemoryBroker>,
        monitor: QueueMonitor,
        alert_count: Arc<AtomicUsize>,
    }

    fn fixture() -> Fixture {
        let broker = Arc::new(InMemoryBroker::new());
        let store = Arc::new(InMemoryStore::new());
        let metrics = Arc::new(CoreMetrics::new().unwrap());
        let alert_count = Arc::new(AtomicUsize::new(0));
        let count = alert_count.clone();
        let callback: AlertCallback = Arc::new(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        });
        let alerts = AlertManager::new(Duration::from_secs(300), callback, metrics.clone());
        let monitor = QueueMonitor::new(
            Arc::new(QueueRegistry::with_defaults()),
            broker.clone(),
            store,
            Arc::new(RateTracker::new()),
            alerts,
            metrics,
            QueueCoreConfig::default(),
        );
        Fixture {
            broker,
            monitor,
            alert_count,
        }
    }

    #[test]
    fn test_consumer_heuristic() {
        assert_eq!(estimate_consumers(0), 1);
        assert_eq!(estimate_consumers(5), 1);
        assert_eq!(estimate_consumers(40), 2);
        assert_eq!(estimate_consumers(100), 5);
        assert_eq!(estimate_consumers(10_000), 5);
    }

    #[tokio::test]
    async fn test_sample_reports_literal_depth() {
        let f = fixture();
        for i in 0..3 {
            f.broker
                .enqueue("gpu.generation", message(&format!("t{i}")), None)
                .await
                .unwrap();
        }
        f.monitor.sample_once().await;
        let snapshot = f.monitor.current_metrics("gpu.generation").await;
        assert_eq!(snapshot.depth, 3);
        assert!(snapshot.oldest_task_age >= 0.0);
    }

    #[tokio::test]
    async fn test_depth_violation_alerts_once_per_cooldown() {
        let f = fixture();
        // gpu.generation max_length is 50
        for i in 0..60 {
            f.broker
                .enqueue("gpu.generation", message(&format!("t{i}")), None)
                .await
                .unwrap();
        }
        f.monitor.sample_once().await;
        assert_eq!(f.alert_count.load(Ordering::SeqCst), 1);

        // Second pass inside the cooldown window: suppressed
        f.monitor.sample_once().await;
        assert_eq!(f.alert_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_summary_aggregates() {
        let f = fixture();
        for i in 0..60 {
            f.broker
                .enqueue("gpu.generation", message(&format!("t{i}")), None)
                .await
                .unwrap();
        }
        f.broker.enqueue("io.storage", message("x"), None).await.unwrap();
        f.monitor.sample_once().await;

        let summary = f.monitor.queue_summary().await;
        assert_eq!(summary.queue_count, 8);
        assert_eq!(summary.total_depth, 61);
        assert_eq!(summary.queues_in_violation, 1);
    }

    #[tokio::test]
    async fn test_start_stop_clean_exit() {
        let f = fixture();
        f.monitor.start().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        f.monitor.stop().await;
        // A second stop is harmless
        f.monitor.stop().await;
    }

    #[tokio::test]
    async fn test_failing_broker_does_not_abort_sampling() {
        struct FailingBroker;

        #[async_trait::async_trait]
        impl QueueBroker for FailingBroker {
            async fn enqueue(
                &self,
                _queue_name: &str,
                _message: QueueMessage,
                _delay: Option<Duration>,
            ) -> crate::error::Result<()> {
                Err(crate::error::QueueCoreError::BrokerError {
                    operation: "enqueue".to_string(),
                    reason: "connection refused".to_string(),
                })
            }

            async fn queue_depth(&self, _queue_name: &str) -> crate::error::Result<u64> {
                Err(crate::error::QueueCoreError::BrokerError {
                    operation: "queue_depth".to_string(),
                    reason: "connection refused".to_string(),
                })
            }

            async fn oldest_enqueued_at(
                &self,
                _queue_name: &str,
            ) -> crate::error::Result<Option<DateTime<Utc>>> {
                Ok(None)
            }

            async fn purge(&self, _queue_name: &str) -> crate::error::Result<u64> {
                Ok(0)
            }
        }

        let store = Arc::new(InMemoryStore::new());
        let metrics = Arc::new(CoreMetrics::new().unwrap());
        let callback: AlertCallback = Arc::new(|_| {});
        let alerts = AlertManager::new(Duration::from_secs(300), callback, metrics.clone());
        let monitor = QueueMonitor::new(
            Arc::new(QueueRegistry::with_defaults()),
            Arc::new(FailingBroker),
            store,
            Arc::new(RateTracker::new()),
            alerts,
            metrics,
            QueueCoreConfig::default(),
        );

        // Every queue's sample fails; the pass completes without panicking
        // and no snapshot is recorded for the failed queues.
        monitor.sample_once().await;
        let snapshot = monitor.current_metrics("gpu.generation").await;
        assert_eq!(snapshot.depth, 0);

        monitor.start().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        monitor.stop().await;
    }

    #[tokio::test]
    async fn test_unsampled_queue_returns_zeroed_snapshot() {
        let f = fixture();
        let snapshot = f.monitor.current_metrics("gpu.generation").await;
        assert_eq!(snapshot.depth, 0);
        assert_eq!(snapshot.error_rate, 0.0);
    }
}
