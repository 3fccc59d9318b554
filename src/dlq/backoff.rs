//! Backoff policies and per-queue policy resolution.
//!
//! A policy maps a retry attempt number to a wait duration. Resolution order
//! for a failed task: exact queue-name entry, then task-name keyword pattern,
//! then the default config.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Strategy for spacing retry attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffPolicy {
    Exponential,
    Linear,
    Fibonacci,
    Fixed,
}

impl BackoffPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackoffPolicy::Exponential => "exponential",
            BackoffPolicy::Linear => "linear",
            BackoffPolicy::Fibonacci => "fibonacci",
            BackoffPolicy::Fixed => "fixed",
        }
    }
}

/// Full retry configuration for one queue or task pattern
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    pub policy: BackoffPolicy,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_retries: u32,
    /// Multiplier for the exponential policy
    pub factor: f64,
    /// Scale the computed delay by a uniform factor in [0.5, 1.5]
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            policy: BackoffPolicy::Exponential,
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(3600),
            max_retries: 3,
            factor: 2.0,
            jitter: true,
        }
    }
}

impl BackoffConfig {
    /// Delay before the next attempt, given the number of retries already
    /// consumed. Capped at `max_delay` before jitter is applied.
    pub fn compute_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_secs_f64();
        let max = self.max_delay.as_secs_f64();

        let raw = match self.policy {
            BackoffPolicy::Exponential => base * self.factor.powi(attempt as i32),
            BackoffPolicy::Linear => base + base * f64::from(attempt),
            BackoffPolicy::Fibonacci => base * fibonacci(attempt + 1) as f64,
            BackoffPolicy::Fixed => base,
        };
        let capped = raw.min(max);

        let final_delay = if self.jitter {
            capped * (0.5 + fastrand::f64())
        } else {
            capped
        };

        Duration::from_secs_f64(final_delay)
    }
}

/// Resolves the backoff config for a failed task
#[derive(Debug, Clone)]
pub struct BackoffResolver {
    queue_configs: HashMap<String, BackoffConfig>,
    /// Ordered (keyword, config) pairs matched against the task name
    pattern_configs: Vec<(String, BackoffConfig)>,
    default_config: BackoffConfig,
}

impl BackoffResolver {
    /// Resolver seeded with the production policy table
    pub fn with_defaults() -> Self {
        let queue_configs = HashMap::from([
            (
                "gpu.generation".to_string(),
                BackoffConfig {
                    policy: BackoffPolicy::Exponential,
                    base_delay: Duration::from_secs(30),
                    max_delay: Duration::from_secs(1800),
                    max_retries: 5,
                    factor: 2.0,
                    jitter: true,
                },
            ),
            (
                "gpu.processing".to_string(),
                BackoffConfig {
                    policy: BackoffPolicy::Exponential,
                    base_delay: Duration::from_secs(20),
                    max_delay: Duration::from_secs(900),
                    max_retries: 4,
                    factor: 2.0,
                    jitter: true,
                },
            ),
            (
                "cpu.thumbnail".to_string(),
                BackoffConfig {
                    policy: BackoffPolicy::Fixed,
                    base_delay: Duration::from_secs(15),
                    max_delay: Duration::from_secs(15),
                    max_retries: 3,
                    factor: 1.0,
                    jitter: false,
                },
            ),
            (
                "io.storage".to_string(),
                BackoffConfig {
                    policy: BackoffPolicy::Linear,
                    base_delay: Duration::from_secs(10),
                    max_delay: Duration::from_secs(300),
                    max_retries: 5,
                    factor: 1.0,
                    jitter: false,
                },
            ),
            (
                "batch.processing".to_string(),
                BackoffConfig {
                    policy: BackoffPolicy::Fibonacci,
                    base_delay: Duration::from_secs(60),
                    max_delay: Duration::from_secs(7200),
                    max_retries: 6,
                    factor: 1.0,
                    jitter: false,
                },
            ),
        ]);

        let pattern_configs = vec![
            (
                "upload".to_string(),
                BackoffConfig {
                    policy: BackoffPolicy::Linear,
                    base_delay: Duration::from_secs(5),
                    max_delay: Duration::from_secs(120),
                    max_retries: 5,
                    factor: 1.0,
                    jitter: false,
                },
            ),
            (
                "generate".to_string(),
                BackoffConfig {
                    policy: BackoffPolicy::Exponential,
                    base_delay: Duration::from_secs(30),
                    max_delay: Duration::from_secs(1800),
                    max_retries: 4,
                    factor: 2.0,
                    jitter: true,
                },
            ),
        ];

        Self {
            queue_configs,
            pattern_configs,
            default_config: BackoffConfig::default(),
        }
    }

    /// Build a resolver from explicit tables (tests, custom deployments)
    pub fn new(
        queue_configs: HashMap<String, BackoffConfig>,
        pattern_configs: Vec<(String, BackoffConfig)>,
        default_config: BackoffConfig,
    ) -> Self {
        Self {
            queue_configs,
            pattern_configs,
            default_config,
        }
    }

    /// Queue name first, task-name pattern second, default last
    pub fn resolve(&self, queue_name: &str, task_name: &str) -> &BackoffConfig {
        if let Some(config) = self.queue_configs.get(queue_name) {
            return config;
        }
        let lowered = task_name.to_lowercase();
        for (keyword, config) in &self.pattern_configs {
            if lowered.contains(keyword.as_str()) {
                return config;
            }
        }
        &self.default_config
    }
}

fn fibonacci(n: u32) -> u64 {
    let (mut a, mut b) = (0u64, 1u64);
    for _ in 0..n {
        let next = a.saturating_add(b);
        a = b;
        b = next;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(policy: BackoffPolicy) -> BackoffConfig {
        BackoffConfig {
            policy,
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(600),
            max_retries: 5,
            factor: 2.0,
            jitter: false,
        }
    }

    #[test]
    fn test_exponential_delays() {
        let c = config(BackoffPolicy::Exponential);
        assert_eq!(c.compute_delay(0), Duration::from_secs(10));
        assert_eq!(c.compute_delay(1), Duration::from_secs(20));
        assert_eq!(c.compute_delay(3), Duration::from_secs(80));
        // Capped at max_delay
        assert_eq!(c.compute_delay(10), Duration::from_secs(600));
    }

    #[test]
    fn test_linear_delays() {
        let c = config(BackoffPolicy::Linear);
        assert_eq!(c.compute_delay(0), Duration::from_secs(10));
        assert_eq!(c.compute_delay(3), Duration::from_secs(40));
    }

    #[test]
    fn test_fibonacci_delays() {
        let c = config(BackoffPolicy::Fibonacci);
        // fib(1)=1, fib(2)=1, fib(3)=2, fib(4)=3, fib(5)=5
        assert_eq!(c.compute_delay(0), Duration::from_secs(10));
        assert_eq!(c.compute_delay(1), Duration::from_secs(10));
        assert_eq!(c.compute_delay(2), Duration::from_secs(20));
        assert_eq!(c.compute_delay(3), Duration::from_secs(30));
        assert_eq!(c.compute_delay(4), Duration::from_secs(50));
    }

    #[test]
    fn test_fixed_delay_is_constant() {
        let c = config(BackoffPolicy::Fixed);
        for attempt in 0..10 {
            assert_eq!(c.compute_delay(attempt), Duration::from_secs(10));
        }
    }

    #[test]
    fn test_monotonic_without_jitter() {
        for policy in [
            BackoffPolicy::Exponential,
            BackoffPolicy::Linear,
            BackoffPolicy::Fibonacci,
        ] {
            let c = config(policy);
            let mut previous = Duration::ZERO;
            for attempt in 0..20 {
                let delay = c.compute_delay(attempt);
                assert!(delay >= previous, "{policy:?} not monotonic at {attempt}");
                assert!(delay <= c.max_delay, "{policy:?} exceeds cap at {attempt}");
                previous = delay;
            }
        }
    }

    #[test]
    fn test_jitter_stays_in_band() {
        let c = BackoffConfig {
            jitter: true,
            ..config(BackoffPolicy::Fixed)
        };
        for _ in 0..100 {
            let delay = c.compute_delay(0).as_secs_f64();
            assert!((5.0..=15.0).contains(&delay), "jittered delay {delay}");
        }
    }

    #[test]
    fn test_resolution_order() {
        let resolver = BackoffResolver::with_defaults();

        // Queue entry wins
        let c = resolver.resolve("cpu.thumbnail", "upload_file");
        assert_eq!(c.policy, BackoffPolicy::Fixed);

        // No queue entry: task pattern
        let c = resolver.resolve("cpu.analysis", "asset.upload_file");
        assert_eq!(c.policy, BackoffPolicy::Linear);
        assert_eq!(c.base_delay, Duration::from_secs(5));

        // Neither: default
        let c = resolver.resolve("cpu.analysis", "mystery_task");
        assert_eq!(c.max_retries, BackoffConfig::default().max_retries);
    }
}
