//! # Worker Health
//!
//! Pluggable health checks, 0-1 score aggregation, and per-worker monitoring
//! loops. Each worker runs an independent loop; loops are started and stopped
//! together as a group so a worker is never half-monitored. A critical
//! heartbeat check triggers one automatic restart attempt through the
//! [`WorkerController`] seam; any other critical check only alerts.

mod aggregator;
mod checks;
mod worker_monitor;

pub use aggregator::{aggregate_score, WorkerHealthReport};
pub use checks::{HealthCheck, HealthCheckResult, HEARTBEAT_CHECK};
pub use worker_monitor::{WorkerController, WorkerHealthMonitor, WorkerHealthSummary};
