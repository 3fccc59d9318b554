//! Threshold alerting with per-(queue, message) cooldown.

use crate::logging::log_queue_alert;
use crate::metrics::CoreMetrics;
use crate::storage::QueueMetricsSnapshot;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Per-queue alert thresholds; `None` disables a check
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertConfig {
    pub max_depth: Option<u64>,
    pub max_error_rate: Option<f64>,
    pub max_oldest_task_age: Option<f64>,
    pub min_processing_rate: Option<f64>,
}

impl AlertConfig {
    /// Default thresholds derived from a queue's configured depth bound
    pub fn for_queue_depth_bound(max_length: u64) -> Self {
        Self {
            max_depth: Some(max_length),
            max_error_rate: Some(25.0),
            max_oldest_task_age: Some(600.0),
            min_processing_rate: None,
        }
    }

    /// Threshold violations in a snapshot, as human-readable messages
    pub fn violations(&self, snapshot: &QueueMetricsSnapshot) -> Vec<String> {
        let mut found = Vec::new();
        if let Some(max_depth) = self.max_depth {
            if snapshot.depth > max_depth {
                found.push(format!(
                    "depth {} exceeds maximum {max_depth}",
                    snapshot.depth
                ));
            }
        }
        if let Some(max_error_rate) = self.max_error_rate {
            if snapshot.error_rate > max_error_rate {
                found.push(format!(
                    "error rate {:.1}% exceeds maximum {max_error_rate:.1}%",
                    snapshot.error_rate
                ));
            }
        }
        if let Some(max_age) = self.max_oldest_task_age {
            if snapshot.oldest_task_age > max_age {
                found.push(format!(
                    "oldest task age {:.0}s exceeds maximum {max_age:.0}s",
                    snapshot.oldest_task_age
                ));
            }
        }
        if let Some(min_rate) = self.min_processing_rate {
            if snapshot.processing_rate < min_rate {
                found.push(format!(
                    "processing rate {:.2}/s below minimum {min_rate:.2}/s",
                    snapshot.processing_rate
                ));
            }
        }
        found
    }
}

/// One fired alert delivered to the callback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueAlert {
    pub queue_name: String,
    pub message: String,
    pub fired_at: DateTime<Utc>,
}

pub type AlertCallback = Arc<dyn Fn(&QueueAlert) + Send + Sync>;

/// Evaluates snapshots against thresholds and fires the callback, holding
/// each (queue, message) pair quiet for the cooldown window after it fires
pub struct AlertManager {
    cooldown: Duration,
    last_fired: DashMap<(String, String), DateTime<Utc>>,
    callback: AlertCallback,
    metrics: Arc<CoreMetrics>,
}

impl AlertManager {
    pub fn new(cooldown: Duration, callback: AlertCallback, metrics: Arc<CoreMetrics>) -> Self {
        Self {
            cooldown,
            last_fired: DashMap::new(),
            callback,
            metrics,
        }
    }

    /// Evaluate one snapshot; returns the alerts actually delivered
    pub fn evaluate(&self, snapshot: &QueueMetricsSnapshot, config: &AlertConfig) -> Vec<QueueAlert> {
        let mut fired = Vec::new();
        for message in config.violations(snapshot) {
            if let Some(alert) = self.fire(&snapshot.queue_name, message) {
                fired.push(alert);
            }
        }
        fired
    }

    fn fire(&self, queue_name: &str, message: String) -> Option<QueueAlert> {
        let key = (queue_name.to_string(), message.clone());
        let now = Utc::now();

        if let Some(last) = self.last_fired.get(&key) {
            let elapsed = now.signed_duration_since(*last);
            let in_cooldown = elapsed
                .to_std()
                .map(|e| e < self.cooldown)
                .unwrap_or(true);
            if in_cooldown {
                log_queue_alert(queue_name, &message, true);
                return None;
            }
        }
        self.last_fired.insert(key, now);

        let alert = QueueAlert {
            queue_name: queue_name.to_string(),
            message: message.clone(),
            fired_at: now,
        };
        log_queue_alert(queue_name, &message, false);
        self.metrics.record_alert_fired(queue_name);

        // Delivery is best-effort; a panicking callback must not take down
        // the sampling loop.
        let callback = self.callback.clone();
        if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            callback(&alert);
        })) {
            tracing::warn!(queue = %queue_name, "Alert callback panicked: {e:?}");
        }

        Some(alert)
    }
}
