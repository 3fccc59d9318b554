//! # Task Routing
//!
//! Deterministic, explainable mapping from a task submission to a target
//! queue and numeric priority. Routing is a total function: any name and any
//! argument shape resolves to a decision, with `cpu.analysis` as the
//! guaranteed fallback. Recent decisions are cached with a TTL, and a
//! content-hash deduplicator suppresses duplicate concurrent submissions.

mod cache;
mod dedup;
mod hints;
mod task_router;

pub use cache::RouteCache;
pub use dedup::Deduplicator;
pub use hints::{ResourceRequirements, RoutingHints};
pub use task_router::TaskRouter;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A task submission as seen by the router
#[derive(Debug, Clone)]
pub struct TaskDescriptor {
    /// Dotted task identifier, e.g. `video.generate_image`
    pub name: String,
    pub args: Vec<serde_json::Value>,
    /// Typed routing-relevant fields extracted from the submission kwargs
    pub hints: RoutingHints,
    /// Everything else from the kwargs, opaque to routing
    pub payload: HashMap<String, serde_json::Value>,
}

impl TaskDescriptor {
    /// Split raw submission kwargs into typed hints and opaque payload
    pub fn from_kwargs(
        name: &str,
        args: Vec<serde_json::Value>,
        kwargs: HashMap<String, serde_json::Value>,
    ) -> Self {
        let (hints, payload) = RoutingHints::extract(kwargs);
        Self {
            name: name.to_string(),
            args,
            hints,
            payload,
        }
    }
}

/// The (queue, priority) pair assigned to a task at submission time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub queue_name: String,
    pub routing_key: String,
    /// Computed priority, always in [1, 10]
    pub priority: u8,
}
