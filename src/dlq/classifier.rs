//! Failure classification by exception type name.
//!
//! Classification is intentionally coarse: the execution layer reports the
//! error type as a string, and the handler only needs to know whether the
//! failure is worth retrying and which broad category it falls in for
//! counters and operator dashboards.

use crate::constants::NON_RETRYABLE_ERRORS;
use serde::{Deserialize, Serialize};

/// Broad failure categories for counters and dashboards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Programming or input error; retrying can never succeed
    Permanent,
    /// Operation exceeded its deadline
    Timeout,
    /// Connectivity or remote-service failure
    Network,
    /// Memory, disk, or GPU exhaustion
    ResourceExhaustion,
    /// Anything else; retried conservatively
    Transient,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Permanent => "permanent",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Network => "network",
            ErrorCategory::ResourceExhaustion => "resource_exhaustion",
            ErrorCategory::Transient => "transient",
        }
    }
}

/// Result of classifying one failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureClassification {
    pub category: ErrorCategory,
    pub is_retryable: bool,
    /// The error type name that was classified
    pub error_type: String,
}

/// Classifies failures from (error type name, message) pairs
#[derive(Debug, Default)]
pub struct FailureClassifier;

impl FailureClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, error_type: &str, error_message: &str) -> FailureClassification {
        if Self::is_non_retryable(error_type) {
            return FailureClassification {
                category: ErrorCategory::Permanent,
                is_retryable: false,
                error_type: error_type.to_string(),
            };
        }

        let haystack = format!("{error_type} {error_message}").to_lowercase();
        let category = if haystack.contains("timeout") || haystack.contains("timed out") {
            ErrorCategory::Timeout
        } else if haystack.contains("connection")
            || haystack.contains("network")
            || haystack.contains("unavailable")
        {
            ErrorCategory::Network
        } else if haystack.contains("memory")
            || haystack.contains("disk")
            || haystack.contains("vram")
            || haystack.contains("resource")
        {
            ErrorCategory::ResourceExhaustion
        } else {
            ErrorCategory::Transient
        };

        FailureClassification {
            category,
            is_retryable: true,
            error_type: error_type.to_string(),
        }
    }

    /// Whether the error type is in the fixed non-retryable set
    pub fn is_non_retryable(error_type: &str) -> bool {
        NON_RETRYABLE_ERRORS.contains(&error_type)
    }
}
