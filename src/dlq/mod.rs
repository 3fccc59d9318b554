//! # Dead-Letter Handling
//!
//! Failure classification, backoff policy selection, and the retry/demotion
//! state machine. Per logical task the states are:
//!
//! ```text
//! Running ──failure──▶ classify ──non-retryable──▶ Failed-Terminal
//!                         │
//!                         ├─retries exhausted────▶ Failed-Terminal
//!                         │
//!                         └─retryable──▶ Scheduled-Retry ──▶ Running
//!                                            │
//!                                            └─scheduling error─▶ Failed-Terminal
//! ```
//!
//! Retry metadata is always written before the retry is enqueued, so an
//! observer never sees an in-flight retry without metadata.

mod backoff;
mod classifier;
mod handler;

pub use backoff::{BackoffConfig, BackoffPolicy, BackoffResolver};
pub use classifier::{ErrorCategory, FailureClassification, FailureClassifier};
pub use handler::{DeadLetterHandler, DlqStats};
