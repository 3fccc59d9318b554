//! Per-worker health monitoring loops.

use super::{HealthCheck, HealthCheckResult, WorkerHealthReport, HEARTBEAT_CHECK};
use crate::constants::HealthStatus;
use crate::error::{QueueCoreError, Result};
use crate::metrics::CoreMetrics;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Seam to the worker management layer for automated restarts
#[async_trait::async_trait]
pub trait WorkerController: Send + Sync {
    async fn restart_worker(&self, worker_id: &str) -> Result<()>;
}

/// Compact per-worker view for the summary endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerHealthSummary {
    pub worker_id: String,
    pub score: f64,
    pub status: HealthStatus,
    pub checks_run: usize,
}

struct WorkerEntry {
    checks: Vec<Arc<dyn HealthCheck>>,
    /// Set while a heartbeat-critical restart has been attempted and the
    /// heartbeat has not recovered; prevents restart storms
    restart_attempted: std::sync::atomic::AtomicBool,
}

/// Runs every registered worker's checks on an interval, one loop per
/// worker, started and stopped as a group
pub struct WorkerHealthMonitor {
    interval: Duration,
    metrics: Arc<CoreMetrics>,
    controller: Option<Arc<dyn WorkerController>>,
    workers: Arc<DashMap<String, Arc<WorkerEntry>>>,
    latest: Arc<DashMap<String, WorkerHealthReport>>,
    shutdown: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerHealthMonitor {
    pub fn new(
        interval: Duration,
        metrics: Arc<CoreMetrics>,
        controller: Option<Arc<dyn WorkerController>>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            interval,
            metrics,
            controller,
            workers: Arc::new(DashMap::new()),
            latest: Arc::new(DashMap::new()),
            shutdown,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Register a worker and its checks; takes effect at the next start
    pub fn register_worker(&self, worker_id: &str, checks: Vec<Arc<dyn HealthCheck>>) {
        self.workers.insert(
            worker_id.to_string(),
            Arc::new(WorkerEntry {
                checks,
                restart_attempted: std::sync::atomic::AtomicBool::new(false),
            }),
        );
        info!(worker_id = %worker_id, "🩺 Worker registered for health monitoring");
    }

    /// Start one monitoring loop per registered worker; idempotent
    pub async fn start(&self) {
        let mut handles = self.handles.lock().await;
        if !handles.is_empty() {
            return;
        }
        let _ = self.shutdown.send(false);

        for entry in self.workers.iter() {
            let worker_id = entry.key().clone();
            let worker = entry.value().clone();
            let latest = self.latest.clone();
            let metrics = self.metrics.clone();
            let controller = self.controller.clone();
            let interval = self.interval;
            let mut shutdown_rx = self.shutdown.subscribe();

            handles.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            run_round(&worker_id, &worker, &latest, &metrics, controller.as_ref()).await;
                        }
                        _ = shutdown_rx.changed() => {
                            if *shutdown_rx.borrow() {
                                break;
                            }
                        }
                    }
                }
            }));
        }
        info!(workers = self.workers.len(), "🩺 Worker health monitoring started");
    }

    /// Cancel all loops, await their exit, and clear the tracking table.
    /// The handle list and report table are cleared together under the same
    /// lock, so no worker is left half-monitored.
    pub async fn stop(&self) {
        let _ = self.shutdown.send(true);
        let mut handles = self.handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                warn!("Health loop join failed: {e}");
            }
        }
        self.latest.clear();
        info!("🩺 Worker health monitoring stopped");
    }

    /// Run one worker's checks immediately, optionally a single named check
    pub async fn run_check(
        &self,
        worker_id: &str,
        check_name: Option<&str>,
    ) -> Result<Vec<HealthCheckResult>> {
        let entry = self
            .workers
            .get(worker_id)
            .ok_or_else(|| QueueCoreError::UnknownWorker(worker_id.to_string()))?
            .clone();

        match check_name {
            Some(name) => {
                let check = entry
                    .checks
                    .iter()
                    .find(|c| c.name() == name)
                    .ok_or_else(|| QueueCoreError::UnknownCheck(name.to_string()))?;
                Ok(vec![check.run().await])
            }
            None => {
                let report = run_round(
                    worker_id,
                    &entry,
                    &self.latest,
                    &self.metrics,
                    self.controller.as_ref(),
                )
                .await;
                Ok(report.checks)
            }
        }
    }

    /// Latest report for every monitored worker
    pub fn summary(&self) -> Vec<WorkerHealthSummary> {
        let mut result: Vec<WorkerHealthSummary> = self
            .latest
            .iter()
            .map(|report| WorkerHealthSummary {
                worker_id: report.worker_id.clone(),
                score: report.score,
                status: report.status,
                checks_run: report.checks.len(),
            })
            .collect();
        result.sort_by(|a, b| a.worker_id.cmp(&b.worker_id));
        result
    }

    /// Full latest report for one worker
    pub fn detail(&self, worker_id: &str) -> Result<WorkerHealthReport> {
        if let Some(report) = self.latest.get(worker_id) {
            return Ok(report.clone());
        }
        // Registered but not yet sampled: answer Unknown rather than erroring
        if self.workers.contains_key(worker_id) {
            return Ok(WorkerHealthReport::from_checks(worker_id, vec![]));
        }
        Err(QueueCoreError::UnknownWorker(worker_id.to_string()))
    }

    pub fn monitored_workers(&self) -> usize {
        self.workers.len()
    }
}

async fn run_round(
    worker_id: &str,
    entry: &WorkerEntry,
    latest: &DashMap<String, WorkerHealthReport>,
    metrics: &CoreMetrics,
    controller: Option<&Arc<dyn WorkerController>>,
) -> WorkerHealthReport {
    use std::sync::atomic::Ordering;

    let mut results = Vec::with_capacity(entry.checks.len());
    for check in &entry.checks {
        results.push(check.run().await);
    }

    let report = WorkerHealthReport::from_checks(worker_id, results);
    metrics.set_worker_health_score(worker_id, report.score);

    let heartbeat = report
        .checks
        .iter()
        .find(|c| c.check_name == HEARTBEAT_CHECK);
    match heartbeat.map(|c| c.status) {
        Some(HealthStatus::Critical) => {
            if let Some(controller) = controller {
                // One attempt per critical episode
                if !entry.restart_attempted.swap(true, Ordering::SeqCst) {
                    warn!(worker_id = %worker_id, "💔 Heartbeat critical, attempting worker restart");
                    if let Err(e) = controller.restart_worker(worker_id).await {
                        error!(worker_id = %worker_id, error = %e, "Worker restart attempt failed");
                    }
                }
            }
        }
        Some(_) => entry.restart_attempted.store(false, Ordering::SeqCst),
        None => {}
    }

    for check in &report.checks {
        if check.status == HealthStatus::Critical && check.check_name != HEARTBEAT_CHECK {
            warn!(
                worker_id = %worker_id,
                check = %check.check_name,
                message = %check.message,
                "🚨 Critical health check"
            );
        }
    }

    latest.insert(worker_id.to_string(), report.clone());
    report
}
