//! In-memory broker used by tests and local development.
//!
//! Keeps each queue as an ordered vec of (deliver_at, message); "delivery" is
//! not modeled, only the bookkeeping the core reads back (depth, head age).

use super::{QueueBroker, QueueMessage};
use crate::error::Result;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
struct PendingMessage {
    deliver_at: DateTime<Utc>,
    message: QueueMessage,
}

/// Broker stand-in holding messages in process memory
#[derive(Debug, Default)]
pub struct InMemoryBroker {
    queues: DashMap<String, Vec<PendingMessage>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// All pending messages for a queue, oldest first (test helper)
    pub fn pending(&self, queue_name: &str) -> Vec<QueueMessage> {
        self.queues
            .get(queue_name)
            .map(|q| q.iter().map(|p| p.message.clone()).collect())
            .unwrap_or_default()
    }

    /// Scheduled delivery time for the most recent enqueue (test helper)
    pub fn last_deliver_at(&self, queue_name: &str) -> Option<DateTime<Utc>> {
        self.queues
            .get(queue_name)
            .and_then(|q| q.last().map(|p| p.deliver_at))
    }
}

#[async_trait::async_trait]
impl QueueBroker for InMemoryBroker {
    async fn enqueue(
        &self,
        queue_name: &str,
        message: QueueMessage,
        delay: Option<Duration>,
    ) -> Result<()> {
        let deliver_at = Utc::now()
            + chrono::Duration::from_std(delay.unwrap_or_default())
                .unwrap_or_else(|_| chrono::Duration::zero());

        debug!(
            queue = %queue_name,
            task_id = %message.task_id,
            priority = message.metadata.priority,
            delay_secs = delay.map(|d| d.as_secs()).unwrap_or(0),
            "📤 Enqueued message"
        );

        self.queues
            .entry(queue_name.to_string())
            .or_default()
            .push(PendingMessage {
                deliver_at,
                message,
            });
        Ok(())
    }

    async fn queue_depth(&self, queue_name: &str) -> Result<u64> {
        Ok(self
            .queues
            .get(queue_name)
            .map(|q| q.len() as u64)
            .unwrap_or(0))
    }

    async fn oldest_enqueued_at(&self, queue_name: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .queues
            .get(queue_name)
            .and_then(|q| q.iter().map(|p| p.message.metadata.enqueued_at).min()))
    }

    async fn purge(&self, queue_name: &str) -> Result<u64> {
        let purged = self
            .queues
            .get_mut(queue_name)
            .map(|mut q| {
                let n = q.len() as u64;
                q.clear();
                n
            })
            .unwrap_or(0);
        debug!(queue = %queue_name, purged = purged, "🧹 Purged queue");
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn message(task_id: &str) -> QueueMessage {
        QueueMessage {
            task_id: task_id.to_string(),
            task_name: "test.task".to_string(),
            args: vec![],
            payload: HashMap::new(),
            metadata: super::super::QueueMessageMetadata {
                enqueued_at: Utc::now(),
                priority: 5,
                retry_count: 0,
                original_task_id: None,
            },
        }
    }

    #[tokio::test]
    async fn test_depth_tracks_enqueues_and_purge() {
        let broker = InMemoryBroker::new();
        broker.enqueue("q", message("a"), None).await.unwrap();
        broker.enqueue("q", message("b"), None).await.unwrap();
        assert_eq!(broker.queue_depth("q").await.unwrap(), 2);
        assert_eq!(broker.queue_depth("other").await.unwrap(), 0);

        assert_eq!(broker.purge("q").await.unwrap(), 2);
        assert_eq!(broker.queue_depth("q").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delay_pushes_delivery_time_forward() {
        let broker = InMemoryBroker::new();
        let before = Utc::now();
        broker
            .enqueue("q", message("a"), Some(Duration::from_secs(120)))
            .await
            .unwrap();
        let deliver_at = broker.last_deliver_at("q").unwrap();
        assert!(deliver_at >= before + chrono::Duration::seconds(119));
    }

    #[tokio::test]
    async fn test_oldest_enqueued_at_is_minimum() {
        let broker = InMemoryBroker::new();
        assert!(broker.oldest_enqueued_at("q").await.unwrap().is_none());
        broker.enqueue("q", message("a"), None).await.unwrap();
        broker.enqueue("q", message("b"), None).await.unwrap();
        let oldest = broker.oldest_enqueued_at("q").await.unwrap().unwrap();
        assert!(oldest <= Utc::now());
    }
}
