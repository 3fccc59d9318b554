//! # Queue Monitoring
//!
//! Rolling-rate tracking, threshold alerting with cooldown, and the periodic
//! sampling loop that turns broker counters into persisted metric snapshots.
//!
//! The loop is cooperative and single-tasked: one tick samples every
//! configured queue, evaluates alerts, persists snapshots, then sleeps. A
//! tick that fails is logged and never kills the loop.

mod alerts;
mod queue_monitor;
mod rates;

pub use alerts::{AlertCallback, AlertConfig, AlertManager, QueueAlert};
pub use queue_monitor::{QueueHealth, QueueMonitor, QueueSummary};
pub use rates::RateTracker;
