//! Rolling event windows backing the per-queue rate calculations.
//!
//! The execution layer reports processing-started, completed, and failed
//! events as they happen; the monitor reads rates over fixed windows:
//! processing and completion over one minute, error rate over five, mean
//! duration over fifteen. Events older than the largest window (one hour)
//! are pruned on every write.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;

const PRUNE_WINDOW_SECS: i64 = 3600;
const RATE_WINDOW_SECS: i64 = 60;
const ERROR_WINDOW_SECS: i64 = 300;
const DURATION_WINDOW_SECS: i64 = 900;

/// Rates computed from one queue's event log
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateSample {
    pub processing_rate: f64,
    pub completion_rate: f64,
    pub error_rate: f64,
    pub avg_processing_time: f64,
}

#[derive(Debug, Default)]
struct EventLog {
    started: VecDeque<DateTime<Utc>>,
    completed: VecDeque<DateTime<Utc>>,
    failed: VecDeque<DateTime<Utc>>,
    durations: VecDeque<(DateTime<Utc>, f64)>,
}

impl EventLog {
    fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - chrono::Duration::seconds(PRUNE_WINDOW_SECS);
        while self.started.front().is_some_and(|t| *t < cutoff) {
            self.started.pop_front();
        }
        while self.completed.front().is_some_and(|t| *t < cutoff) {
            self.completed.pop_front();
        }
        while self.failed.front().is_some_and(|t| *t < cutoff) {
            self.failed.pop_front();
        }
        while self.durations.front().is_some_and(|(t, _)| *t < cutoff) {
            self.durations.pop_front();
        }
    }

    fn count_since(events: &VecDeque<DateTime<Utc>>, cutoff: DateTime<Utc>) -> usize {
        events.iter().filter(|t| **t >= cutoff).count()
    }

    fn sample(&self, now: DateTime<Utc>) -> RateSample {
        let rate_cutoff = now - chrono::Duration::seconds(RATE_WINDOW_SECS);
        let error_cutoff = now - chrono::Duration::seconds(ERROR_WINDOW_SECS);
        let duration_cutoff = now - chrono::Duration::seconds(DURATION_WINDOW_SECS);

        let processing_rate =
            Self::count_since(&self.started, rate_cutoff) as f64 / RATE_WINDOW_SECS as f64;
        let completion_rate =
            Self::count_since(&self.completed, rate_cutoff) as f64 / RATE_WINDOW_SECS as f64;

        let failed = Self::count_since(&self.failed, error_cutoff) as f64;
        let completed = Self::count_since(&self.completed, error_cutoff) as f64;
        let error_rate = if failed + completed > 0.0 {
            failed / (failed + completed) * 100.0
        } else {
            0.0
        };

        let recent: Vec<f64> = self
            .durations
            .iter()
            .filter(|(t, _)| *t >= duration_cutoff)
            .map(|(_, d)| *d)
            .collect();
        let avg_processing_time = if recent.is_empty() {
            0.0
        } else {
            recent.iter().sum::<f64>() / recent.len() as f64
        };

        RateSample {
            processing_rate,
            completion_rate,
            error_rate,
            avg_processing_time,
        }
    }
}

/// Concurrent per-queue event recorder; each queue's log is independently
/// locked so concurrent reporters never contend across queues
#[derive(Debug, Default)]
pub struct RateTracker {
    queues: DashMap<String, Mutex<EventLog>>,
}

impl RateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_started(&self, queue_name: &str) {
        self.record(queue_name, |log, now| log.started.push_back(now));
    }

    pub fn record_completed(&self, queue_name: &str, duration_secs: f64) {
        self.record(queue_name, |log, now| {
            log.completed.push_back(now);
            log.durations.push_back((now, duration_secs));
        });
    }

    pub fn record_failed(&self, queue_name: &str) {
        self.record(queue_name, |log, now| log.failed.push_back(now));
    }

    /// Current rates for a queue; zeroed when nothing has been recorded
    pub fn sample(&self, queue_name: &str) -> RateSample {
        self.queues
            .get(queue_name)
            .map(|log| log.lock().sample(Utc::now()))
            .unwrap_or_default()
    }

    fn record(&self, queue_name: &str, apply: impl FnOnce(&mut EventLog, DateTime<Utc>)) {
        let now = Utc::now();
        let entry = self.queues.entry(queue_name.to_string()).or_default();
        let mut log = entry.lock();
        apply(&mut log, now);
        log.prune(now);
    }
}
