//! # Queue Registry
//!
//! Static table of named queues. Definitions are immutable records built at
//! process start; nothing mutates them at runtime. The registry guarantees
//! routing totality by always exposing the fallback queue.

use crate::constants::{queues, ResourceAffinity, FALLBACK_QUEUE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Immutable definition of one named queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueDefinition {
    pub name: String,
    /// Base priority in [1, 10]; the router's starting point
    pub base_priority: u8,
    pub affinity: ResourceAffinity,
    /// Depth bound used by the monitor's default alert thresholds
    pub max_length: u64,
    pub exchange: String,
    pub routing_key: String,
}

impl QueueDefinition {
    fn new(name: &str, base_priority: u8, affinity: ResourceAffinity, max_length: u64) -> Self {
        Self {
            name: name.to_string(),
            base_priority,
            affinity,
            max_length,
            exchange: "tasks".to_string(),
            routing_key: name.to_string(),
        }
    }
}

/// Lookup table over all configured queues
#[derive(Debug, Clone)]
pub struct QueueRegistry {
    queues: BTreeMap<String, QueueDefinition>,
}

impl QueueRegistry {
    /// Registry seeded with the default production queue set
    pub fn with_defaults() -> Self {
        Self::from_definitions(vec![
            QueueDefinition::new(queues::PRIORITY, 10, ResourceAffinity::Any, 1000),
            QueueDefinition::new(queues::GPU_GENERATION, 8, ResourceAffinity::Gpu, 50),
            QueueDefinition::new(queues::GPU_PROCESSING, 6, ResourceAffinity::Gpu, 100),
            QueueDefinition::new(queues::CPU_ANALYSIS, 5, ResourceAffinity::Cpu, 200),
            QueueDefinition::new(queues::CPU_THUMBNAIL, 4, ResourceAffinity::Cpu, 500),
            QueueDefinition::new(queues::IO_STORAGE, 3, ResourceAffinity::Io, 1000),
            QueueDefinition::new(queues::BATCH_PROCESSING, 2, ResourceAffinity::Any, 2000),
            QueueDefinition::new(queues::DEFAULT, 5, ResourceAffinity::Any, 500),
        ])
    }

    /// Registry from explicit definitions (tests, nonstandard deployments)
    pub fn from_definitions(definitions: Vec<QueueDefinition>) -> Self {
        let queues = definitions
            .into_iter()
            .map(|d| (d.name.clone(), d))
            .collect();
        Self { queues }
    }

    pub fn get(&self, name: &str) -> Option<&QueueDefinition> {
        self.queues.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.queues.contains_key(name)
    }

    /// The queue every unroutable task lands on
    pub fn fallback(&self) -> &QueueDefinition {
        self.queues
            .get(FALLBACK_QUEUE)
            .or_else(|| self.queues.values().next())
            .expect("registry must contain at least one queue")
    }

    /// All definitions in stable name order
    pub fn all(&self) -> impl Iterator<Item = &QueueDefinition> {
        self.queues.values()
    }

    /// Names of all queues in stable order
    pub fn names(&self) -> Vec<String> {
        self.queues.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}
