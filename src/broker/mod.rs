//! # Broker Boundary
//!
//! Narrow interface to the external message broker. The core never assumes a
//! particular transport; everything it needs from the broker is expressed by
//! [`QueueBroker`]: delayed priority enqueue, literal depth, head-of-queue
//! age, and purge. An in-memory implementation backs tests and local runs.

mod in_memory;

pub use in_memory::InMemoryBroker;

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Message handed to the broker for delivery to a worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage {
    pub task_id: String,
    pub task_name: String,
    pub args: Vec<serde_json::Value>,
    pub payload: HashMap<String, serde_json::Value>,
    pub metadata: QueueMessageMetadata,
}

/// Delivery metadata carried alongside every message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessageMetadata {
    pub enqueued_at: DateTime<Utc>,
    pub priority: u8,
    pub retry_count: u32,
    /// First task id in the logical retry chain, if this is a retry
    pub original_task_id: Option<String>,
}

/// Broker operations the core depends on. All calls are expected to carry
/// caller-supplied timeouts inside the implementation; none may block
/// indefinitely.
#[async_trait::async_trait]
pub trait QueueBroker: Send + Sync {
    /// Enqueue a message with the given priority, optionally delayed
    async fn enqueue(
        &self,
        queue_name: &str,
        message: QueueMessage,
        delay: Option<Duration>,
    ) -> Result<()>;

    /// Literal current queue length as reported by the broker
    async fn queue_depth(&self, queue_name: &str) -> Result<u64>;

    /// Enqueue timestamp of the head-of-queue message, if any
    async fn oldest_enqueued_at(&self, queue_name: &str) -> Result<Option<DateTime<Utc>>>;

    /// Drop all pending messages from a queue, returning the purged count
    async fn purge(&self, queue_name: &str) -> Result<u64>;
}
