//! Health score aggregation.

use super::HealthCheckResult;
use crate::constants::HealthStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Combined health view for one worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerHealthReport {
    pub worker_id: String,
    /// Mean of the per-check point values, rounded to 3 decimals
    pub score: f64,
    pub status: HealthStatus,
    pub checks: Vec<HealthCheckResult>,
    pub timestamp: DateTime<Utc>,
}

impl WorkerHealthReport {
    pub fn from_checks(worker_id: &str, checks: Vec<HealthCheckResult>) -> Self {
        let score = aggregate_score(&checks);
        Self {
            worker_id: worker_id.to_string(),
            score,
            status: HealthStatus::from_score(score),
            checks,
            timestamp: Utc::now(),
        }
    }
}

/// Mean of the status point values, rounded to 3 decimals; 0.0 when no
/// checks ran (classified Unknown downstream)
pub fn aggregate_score(checks: &[HealthCheckResult]) -> f64 {
    if checks.is_empty() {
        return 0.0;
    }
    let total: f64 = checks.iter().map(|c| c.status.score()).sum();
    let mean = total / checks.len() as f64;
    (mean * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(status: HealthStatus) -> HealthCheckResult {
        HealthCheckResult::new("check", status, "")
    }

    #[test]
    fn test_all_healthy_scores_one() {
        let checks = vec![result(HealthStatus::Healthy); 3];
        assert_eq!(aggregate_score(&checks), 1.0);
    }

    #[test]
    fn test_mixed_statuses_round_to_three_decimals() {
        // (1.0 + 0.6 + 0.2) / 3 = 0.6
        let checks = vec![
            result(HealthStatus::Healthy),
            result(HealthStatus::Warning),
            result(HealthStatus::Critical),
        ];
        assert_eq!(aggregate_score(&checks), 0.6);

        // (1.0 + 0.5 + 0.5) / 3 = 0.6666... -> 0.667
        let checks = vec![
            result(HealthStatus::Healthy),
            result(HealthStatus::Unknown),
            result(HealthStatus::Unknown),
        ];
        assert_eq!(aggregate_score(&checks), 0.667);
    }

    #[test]
    fn test_empty_checks_is_unknown() {
        let report = WorkerHealthReport::from_checks("w1", vec![]);
        assert_eq!(report.score, 0.0);
        assert_eq!(report.status, HealthStatus::Unknown);
    }

    #[test]
    fn test_report_classification_bands() {
        let report = WorkerHealthReport::from_checks(
            "w1",
            vec![result(HealthStatus::Healthy), result(HealthStatus::Warning)],
        );
        // 0.8 -> healthy band
        assert_eq!(report.score, 0.8);
        assert_eq!(report.status, HealthStatus::Healthy);

        let report = WorkerHealthReport::from_checks(
            "w1",
            vec![result(HealthStatus::Error), result(HealthStatus::Critical)],
        );
        // 0.1 -> critical band
        assert_eq!(report.score, 0.1);
        assert_eq!(report.status, HealthStatus::Critical);
    }
}
