//! # System Constants
//!
//! Queue names, routing keyword tables, error-type sets, and status enums
//! that define the operational boundaries of the queue routing core.
//!
//! Routing behavior is deliberately data-driven: the keyword tables below are
//! ordered `(patterns, queue)` pairs so operators can read and edit the
//! routing policy without touching dispatch logic.

use serde::{Deserialize, Serialize};

/// Well-known queue names seeded into the registry at process start
pub mod queues {
    /// Bypass queue for priority-flagged tasks, always priority 10
    pub const PRIORITY: &str = "priority";
    /// Heavy GPU work: generation, rendering, >8GB VRAM jobs
    pub const GPU_GENERATION: &str = "gpu.generation";
    /// Lighter GPU work: upscaling, filters, <=8GB VRAM jobs
    pub const GPU_PROCESSING: &str = "gpu.processing";
    /// CPU-bound analysis and the routing fallback
    pub const CPU_ANALYSIS: &str = "cpu.analysis";
    /// Thumbnail and preview generation
    pub const CPU_THUMBNAIL: &str = "cpu.thumbnail";
    /// Disk and network transfer work
    pub const IO_STORAGE: &str = "io.storage";
    /// Bulk/batch jobs, lowest urgency
    pub const BATCH_PROCESSING: &str = "batch.processing";
    /// Catch-all queue for unclassified submissions
    pub const DEFAULT: &str = "default";
}

/// Queue every unroutable task falls back to; guarantees routing totality
pub const FALLBACK_QUEUE: &str = queues::CPU_ANALYSIS;

/// VRAM threshold (GB) splitting gpu.generation from gpu.processing
pub const GPU_VRAM_SPLIT_GB: f64 = 8.0;

/// Ordered (trailing-segment names, queue) table consulted after resource
/// requirements; first match wins
pub const TASK_NAME_TABLE: &[(&[&str], &str)] = &[
    (
        &["generate", "create", "render", "synthesize"],
        queues::GPU_GENERATION,
    ),
    (
        &["upscale", "enhance", "interpolate"],
        queues::GPU_PROCESSING,
    ),
    (
        &["analyze", "process", "parse", "extract"],
        queues::CPU_ANALYSIS,
    ),
    (&["thumbnail", "preview", "proxy"], queues::CPU_THUMBNAIL),
    (
        &["save", "upload", "download", "copy", "archive"],
        queues::IO_STORAGE,
    ),
    (&["batch", "bulk"], queues::BATCH_PROCESSING),
];

/// Error type names that are never retried (programming/input errors)
pub const NON_RETRYABLE_ERRORS: &[&str] = &[
    "ValueError",
    "TypeError",
    "KeyError",
    "AttributeError",
    "ImportError",
    "SyntaxError",
    "InvalidInputError",
    "AuthenticationError",
    "PermissionError",
];

/// Priority bounds applied after all modifiers
pub const PRIORITY_MIN: u8 = 1;
pub const PRIORITY_MAX: u8 = 10;

/// Kwarg keys excluded from the deduplication digest (volatile per submission)
pub const VOLATILE_KWARG_KEYS: &[&str] = &["task_id", "timestamp"];

/// Health status reported by an individual check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
    Error,
    Unknown,
}

impl HealthStatus {
    /// Point value contributed to the aggregate worker health score
    pub fn score(&self) -> f64 {
        match self {
            HealthStatus::Healthy => 1.0,
            HealthStatus::Warning => 0.6,
            HealthStatus::Critical => 0.2,
            HealthStatus::Error => 0.0,
            HealthStatus::Unknown => 0.5,
        }
    }

    /// Classify an aggregate 0-1 score back into a status band
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            HealthStatus::Healthy
        } else if score >= 0.6 {
            HealthStatus::Warning
        } else if score > 0.0 {
            HealthStatus::Critical
        } else {
            HealthStatus::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Warning => "warning",
            HealthStatus::Critical => "critical",
            HealthStatus::Error => "error",
            HealthStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resource affinity tag carried by each queue definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceAffinity {
    Gpu,
    Cpu,
    Io,
    Any,
}

impl ResourceAffinity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceAffinity::Gpu => "gpu",
            ResourceAffinity::Cpu => "cpu",
            ResourceAffinity::Io => "io",
            ResourceAffinity::Any => "any",
        }
    }
}

/// Terminal outcome of a failure-handling pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureOutcome {
    /// Retry scheduled with a computed backoff delay
    RetryScheduled,
    /// Error type is in the non-retryable set
    NonRetryable,
    /// Retry budget exhausted for the resolved policy
    RetriesExhausted,
    /// The retry-scheduling call itself failed
    SchedulingFailed,
}

impl FailureOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FailureOutcome::RetryScheduled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureOutcome::RetryScheduled => "retry_scheduled",
            FailureOutcome::NonRetryable => "non_retryable",
            FailureOutcome::RetriesExhausted => "retries_exhausted",
            FailureOutcome::SchedulingFailed => "scheduling_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_score_round_trip() {
        assert_eq!(HealthStatus::from_score(1.0), HealthStatus::Healthy);
        assert_eq!(HealthStatus::from_score(0.8), HealthStatus::Healthy);
        assert_eq!(HealthStatus::from_score(0.6), HealthStatus::Warning);
        assert_eq!(HealthStatus::from_score(0.2), HealthStatus::Critical);
        assert_eq!(HealthStatus::from_score(0.0), HealthStatus::Unknown);
    }

    #[test]
    fn test_name_table_targets_are_known_queues() {
        let known = [
            queues::PRIORITY,
            queues::GPU_GENERATION,
            queues::GPU_PROCESSING,
            queues::CPU_ANALYSIS,
            queues::CPU_THUMBNAIL,
            queues::IO_STORAGE,
            queues::BATCH_PROCESSING,
            queues::DEFAULT,
        ];
        for (_, queue) in TASK_NAME_TABLE {
            assert!(known.contains(queue), "unknown queue in table: {queue}");
        }
    }

    #[test]
    fn test_terminal_outcomes() {
        assert!(!FailureOutcome::RetryScheduled.is_terminal());
        assert!(FailureOutcome::NonRetryable.is_terminal());
        assert!(FailureOutcome::RetriesExhausted.is_terminal());
        assert!(FailureOutcome::SchedulingFailed.is_terminal());
    }
}
