//! End-to-end flows through the service facade: routing outcomes, the
//! retry-to-exhaustion lifecycle, depth alerting with cooldown, and worker
//! health reporting.

use render_queue_core::broker::InMemoryBroker;
use render_queue_core::constants::{FailureOutcome, HealthStatus};
use render_queue_core::health::{HealthCheck, HealthCheckResult, HEARTBEAT_CHECK};
use render_queue_core::service::QueueService;
use render_queue_core::storage::InMemoryStore;
use render_queue_core::{QueueCoreConfig, QueueCoreError};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    broker: Arc<InMemoryBroker>,
    service: QueueService,
    alert_count: Arc<AtomicUsize>,
}

fn harness(config: QueueCoreConfig) -> Harness {
    let broker = Arc::new(InMemoryBroker::new());
    let alert_count = Arc::new(AtomicUsize::new(0));
    let count = alert_count.clone();
    let service = QueueService::new(
        broker.clone(),
        Arc::new(InMemoryStore::new()),
        Arc::new(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        }),
        None,
        config,
    )
    .unwrap();
    Harness {
        broker,
        service,
        alert_count,
    }
}

#[tokio::test]
async fn test_routing_outcomes_across_precedence_steps() {
    let h = harness(QueueCoreConfig::default());

    // Name keyword match
    let generate = h
        .service
        .submit("generate_image", vec![], HashMap::new())
        .await
        .unwrap();
    assert_eq!(generate.queue_name, "gpu.generation");
    assert_eq!(generate.priority, 8);

    // Modifiers push past the base but never past the ceiling
    let urgent = h
        .service
        .submit(
            "generate_image",
            vec![],
            HashMap::from([
                ("user_initiated".to_string(), json!(true)),
                ("real_time".to_string(), json!(true)),
            ]),
        )
        .await
        .unwrap();
    assert_eq!(urgent.queue_name, "gpu.generation");
    assert_eq!(urgent.priority, 10);

    // Batch flags and size penalty drag the priority to the floor
    let bulk = h
        .service
        .submit(
            "bulk_export_frames",
            vec![],
            HashMap::from([
                ("batch_operation".to_string(), json!(true)),
                ("batch_size".to_string(), json!(50)),
            ]),
        )
        .await
        .unwrap();
    assert_eq!(bulk.queue_name, "batch.processing");
    assert_eq!(bulk.priority, 1);

    // Unknown name falls back to analysis
    let unknown = h
        .service
        .submit("mystery_operation", vec![], HashMap::new())
        .await
        .unwrap();
    assert_eq!(unknown.queue_name, "cpu.analysis");
    assert_eq!(unknown.priority, 5);

    // High-VRAM resource declaration beats the name scan
    let heavy = h
        .service
        .submit(
            "mystery_operation",
            vec![],
            HashMap::from([(
                "resource_requirements".to_string(),
                json!({"gpu": true, "vram_gb": 16.0}),
            )]),
        )
        .await
        .unwrap();
    assert_eq!(heavy.queue_name, "gpu.generation");
}

#[tokio::test]
async fn test_thumbnail_retry_lifecycle_to_exhaustion() {
    let h = harness(QueueCoreConfig::default());

    // cpu.thumbnail runs a fixed policy with a budget of 3 retries
    for attempt in 0..3 {
        let outcome = h
            .service
            .report_failure(
                "task-1",
                "make_thumbnail",
                vec![],
                HashMap::new(),
                "cpu.thumbnail",
                "TimeoutError",
                "render timed out",
                "trace",
                attempt,
            )
            .await;
        assert_eq!(outcome, FailureOutcome::RetryScheduled, "attempt {attempt}");
    }
    let outcome = h
        .service
        .report_failure(
            "task-1",
            "make_thumbnail",
            vec![],
            HashMap::new(),
            "cpu.thumbnail",
            "TimeoutError",
            "render timed out",
            "trace",
            3,
        )
        .await;
    assert_eq!(outcome, FailureOutcome::RetriesExhausted);
    assert!(outcome.is_terminal());

    // Three retries made it back onto the queue, the fourth did not
    assert_eq!(h.broker.pending("cpu.thumbnail").len(), 3);

    let stats = h
        .service
        .get_dlq_stats(chrono::Utc::now().date_naive())
        .await
        .unwrap();
    assert_eq!(stats.dlq_entries, 3);
    assert_eq!(stats.permanent_failures, 1);
    assert_eq!(stats.by_error_type.get("TimeoutError"), Some(&3));

    let recent = h.service.get_recent_failures(1).await.unwrap();
    assert_eq!(recent.len(), 4);

    // Exhausted task needs force to retry again
    assert!(matches!(
        h.service.retry_failed_task("task-1", false).await,
        Err(QueueCoreError::RetryNotPermitted { .. })
    ));
    let metadata = h.service.retry_failed_task("task-1", true).await.unwrap();
    assert_eq!(metadata.original_task_id, "task-1");
}

#[tokio::test]
async fn test_validation_error_is_terminal_immediately() {
    let h = harness(QueueCoreConfig::default());
    let outcome = h
        .service
        .report_failure(
            "task-2",
            "analyze_footage",
            vec![],
            HashMap::new(),
            "cpu.analysis",
            "ValueError",
            "bad input shape",
            "trace",
            0,
        )
        .await;
    assert_eq!(outcome, FailureOutcome::NonRetryable);
    assert!(h.broker.pending("cpu.analysis").is_empty());
}

#[tokio::test]
async fn test_depth_alert_fires_once_within_cooldown() {
    let config = QueueCoreConfig {
        monitor_interval: Duration::from_millis(50),
        ..QueueCoreConfig::default()
    };
    let h = harness(config);

    // gpu.generation's depth bound is 50
    for frame in 0..60 {
        h.service
            .submit(
                "generate_image",
                vec![],
                HashMap::from([("frame".to_string(), json!(frame))]),
            )
            .await
            .unwrap();
    }

    h.service.start().await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    h.service.stop().await;

    // Multiple ticks elapsed but the 300s cooldown held it to one alert
    assert_eq!(h.alert_count.load(Ordering::SeqCst), 1);

    let health = h.service.get_queue_health("gpu.generation").await.unwrap();
    assert!(!health.healthy);
    assert!(!health.violations.is_empty());
    assert_eq!(health.snapshot.depth, 60);

    let summary = h.service.get_queue_summary().await;
    assert_eq!(summary.queues_in_violation, 1);
}

#[tokio::test]
async fn test_completion_feedback_reaches_rates_and_metrics() {
    let config = QueueCoreConfig {
        monitor_interval: Duration::from_millis(50),
        ..QueueCoreConfig::default()
    };
    let h = harness(config);

    for _ in 0..5 {
        h.service.report_task_started("cpu.analysis");
        h.service.report_task_completed("cpu.analysis", 2.0, None);
    }

    h.service.start().await;
    tokio::time::sleep(Duration::from_millis(120)).await;
    h.service.stop().await;

    let health = h.service.get_queue_health("cpu.analysis").await.unwrap();
    assert!(health.snapshot.completion_rate > 0.0);
    assert_eq!(health.snapshot.avg_processing_time, 2.0);

    let exported = h.service.export_metrics().unwrap();
    assert!(exported.contains("queue_task_duration_seconds"));
}

struct FixedCheck {
    name: &'static str,
    status: HealthStatus,
}

#[async_trait::async_trait]
impl HealthCheck for FixedCheck {
    fn name(&self) -> &str {
        self.name
    }

    async fn run(&self) -> HealthCheckResult {
        HealthCheckResult::new(self.name, self.status, "fixed")
    }
}

#[tokio::test]
async fn test_worker_health_via_service() {
    let h = harness(QueueCoreConfig::default());
    h.service.register_worker(
        "gpu-worker-1",
        vec![
            Arc::new(FixedCheck {
                name: HEARTBEAT_CHECK,
                status: HealthStatus::Healthy,
            }),
            Arc::new(FixedCheck {
                name: "gpu_memory",
                status: HealthStatus::Warning,
            }),
        ],
    );

    let results = h
        .service
        .run_health_check("gpu-worker-1", None)
        .await
        .unwrap();
    assert_eq!(results.len(), 2);

    let detail = h.service.get_worker_health_detail("gpu-worker-1").unwrap();
    assert_eq!(detail.score, 0.8);
    assert_eq!(detail.status, HealthStatus::Healthy);

    let summary = h.service.get_worker_health_summary();
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0].worker_id, "gpu-worker-1");

    assert!(matches!(
        h.service.run_health_check("nope", None).await,
        Err(QueueCoreError::UnknownWorker(_))
    ));
}
