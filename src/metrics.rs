//! # Metrics Collection and Exposition
//!
//! Prometheus registry shared by all components. Counters are
//! increment-only from concurrent callers; gauges are overwritten each
//! monitor tick. `render()` produces the standard text exposition format for
//! scraping by an external monitoring system.

use crate::error::Result;
use prometheus::{GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry};

/// Shared metrics collector for the queue core
pub struct CoreMetrics {
    registry: Registry,
    tasks_routed: IntCounterVec,
    dlq_entries: IntCounterVec,
    permanent_failures: IntCounterVec,
    retries_scheduled: IntCounterVec,
    alerts_fired: IntCounterVec,
    queue_depth: IntGaugeVec,
    queue_processing_rate: GaugeVec,
    queue_error_rate: GaugeVec,
    worker_health_score: GaugeVec,
    task_duration: HistogramVec,
}

impl CoreMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let tasks_routed = IntCounterVec::new(
            Opts::new("queue_tasks_routed_total", "Tasks routed, by target queue"),
            &["queue"],
        )?;
        let dlq_entries = IntCounterVec::new(
            Opts::new(
                "queue_dlq_entries_total",
                "Dead-letter entries recorded, by queue and error type",
            ),
            &["queue", "error_type"],
        )?;
        let permanent_failures = IntCounterVec::new(
            Opts::new(
                "queue_permanent_failures_total",
                "Tasks demoted to permanent failure, by queue",
            ),
            &["queue"],
        )?;
        let retries_scheduled = IntCounterVec::new(
            Opts::new(
                "queue_retries_scheduled_total",
                "Retries scheduled, by queue and backoff policy",
            ),
            &["queue", "policy"],
        )?;
        let alerts_fired = IntCounterVec::new(
            Opts::new("queue_alerts_fired_total", "Threshold alerts fired, by queue"),
            &["queue"],
        )?;
        let queue_depth = IntGaugeVec::new(
            Opts::new("queue_depth", "Current broker-reported queue depth"),
            &["queue"],
        )?;
        let queue_processing_rate = GaugeVec::new(
            Opts::new(
                "queue_processing_rate",
                "Processing starts per second over the last minute",
            ),
            &["queue"],
        )?;
        let queue_error_rate = GaugeVec::new(
            Opts::new(
                "queue_error_rate_percent",
                "Failure percentage over the last five minutes",
            ),
            &["queue"],
        )?;
        let worker_health_score = GaugeVec::new(
            Opts::new("worker_health_score", "Aggregate 0-1 worker health score"),
            &["worker"],
        )?;
        let task_duration = HistogramVec::new(
            HistogramOpts::new(
                "queue_task_duration_seconds",
                "Recorded per-task processing durations",
            ),
            &["queue"],
        )?;

        registry.register(Box::new(tasks_routed.clone()))?;
        registry.register(Box::new(dlq_entries.clone()))?;
        registry.register(Box::new(permanent_failures.clone()))?;
        registry.register(Box::new(retries_scheduled.clone()))?;
        registry.register(Box::new(alerts_fired.clone()))?;
        registry.register(Box::new(queue_depth.clone()))?;
        registry.register(Box::new(queue_processing_rate.clone()))?;
        registry.register(Box::new(queue_error_rate.clone()))?;
        registry.register(Box::new(worker_health_score.clone()))?;
        registry.register(Box::new(task_duration.clone()))?;

        Ok(Self {
            registry,
            tasks_routed,
            dlq_entries,
            permanent_failures,
            retries_scheduled,
            alerts_fired,
            queue_depth,
            queue_processing_rate,
            queue_error_rate,
            worker_health_score,
            task_duration,
        })
    }

    pub fn record_task_routed(&self, queue: &str) {
        self.tasks_routed.with_label_values(&[queue]).inc();
    }

    pub fn record_dlq_entry(&self, queue: &str, error_type: &str) {
        self.dlq_entries
            .with_label_values(&[queue, error_type])
            .inc();
    }

    pub fn record_permanent_failure(&self, queue: &str) {
        self.permanent_failures.with_label_values(&[queue]).inc();
    }

    pub fn record_retry_scheduled(&self, queue: &str, policy: &str) {
        self.retries_scheduled
            .with_label_values(&[queue, policy])
            .inc();
    }

    pub fn record_alert_fired(&self, queue: &str) {
        self.alerts_fired.with_label_values(&[queue]).inc();
    }

    pub fn set_queue_depth(&self, queue: &str, depth: u64) {
        self.queue_depth
            .with_label_values(&[queue])
            .set(depth as i64);
    }

    pub fn set_queue_rates(&self, queue: &str, processing_rate: f64, error_rate: f64) {
        self.queue_processing_rate
            .with_label_values(&[queue])
            .set(processing_rate);
        self.queue_error_rate
            .with_label_values(&[queue])
            .set(error_rate);
    }

    pub fn set_worker_health_score(&self, worker: &str, score: f64) {
        self.worker_health_score
            .with_label_values(&[worker])
            .set(score);
    }

    pub fn record_task_duration(&self, queue: &str, seconds: f64) {
        self.task_duration
            .with_label_values(&[queue])
            .observe(seconds);
    }

    /// Render all metrics in the text exposition format
    pub fn render(&self) -> Result<String> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let families = self.registry.gather();
        Ok(encoder.encode_to_string(&families)?)
    }
}
