//! Resource-aware task router.
//!
//! Routing precedence (first match wins):
//! 1. priority bypass flag
//! 2. declared resource requirements
//! 3. trailing-segment lookup in the task-name keyword table
//! 4. whole-name keyword scan with the same table
//! 5. fallback queue
//!
//! Priority starts from the queue's base and is adjusted by submission flags,
//! then clamped to [1, 10]. The router never fails: unknown names and
//! malformed hints still produce a valid decision.

use super::{RouteCache, RoutingDecision, RoutingHints, TaskDescriptor};
use crate::config::QueueCoreConfig;
use crate::constants::{queues, GPU_VRAM_SPLIT_GB, PRIORITY_MAX, PRIORITY_MIN, TASK_NAME_TABLE};
use crate::logging::log_routing_decision;
use crate::registry::QueueRegistry;
use std::sync::Arc;

/// Maps task descriptors to (queue, priority) decisions
pub struct TaskRouter {
    registry: Arc<QueueRegistry>,
    cache: RouteCache,
}

impl TaskRouter {
    pub fn new(registry: Arc<QueueRegistry>, config: &QueueCoreConfig) -> Self {
        Self {
            registry,
            cache: RouteCache::new(config.route_cache_ttl, config.route_cache_max_entries),
        }
    }

    /// Route a task descriptor; total over all inputs
    pub fn route(&self, task: &TaskDescriptor) -> RoutingDecision {
        let cache_key = format!("{}|{}", task.name, task.hints.cache_key_fragment());
        if let Some(decision) = self.cache.get(&cache_key) {
            log_routing_decision(&task.name, &decision.queue_name, decision.priority, true);
            return decision;
        }

        let queue_name = self.select_queue(&task.name, &task.hints);
        let queue = self
            .registry
            .get(&queue_name)
            .unwrap_or_else(|| self.registry.fallback());

        let priority = if task.hints.priority_bypass {
            // Bypass tasks always run at maximum priority
            PRIORITY_MAX
        } else {
            compute_priority(queue.base_priority, &task.hints)
        };

        let decision = RoutingDecision {
            queue_name: queue.name.clone(),
            routing_key: queue.routing_key.clone(),
            priority,
        };

        log_routing_decision(&task.name, &decision.queue_name, decision.priority, false);
        self.cache.insert(cache_key, decision.clone());
        decision
    }

    /// Number of cached decisions (observability)
    pub fn cached_decisions(&self) -> usize {
        self.cache.len()
    }

    fn select_queue(&self, task_name: &str, hints: &RoutingHints) -> String {
        // 1. Explicit priority bypass
        if hints.priority_bypass {
            return queues::PRIORITY.to_string();
        }

        // 2. Declared resource requirements
        if hints.has_resource_requirements() {
            let req = hints.resource_requirements.unwrap_or_default();
            if req.gpu {
                let queue = if req.vram_gb > GPU_VRAM_SPLIT_GB {
                    queues::GPU_GENERATION
                } else {
                    queues::GPU_PROCESSING
                };
                return queue.to_string();
            }
            if req.cpu_intensive {
                return queues::CPU_ANALYSIS.to_string();
            }
            if req.io_intensive {
                return queues::IO_STORAGE.to_string();
            }
        }

        // 3. Trailing dotted segment against the keyword table
        let segment = task_name.rsplit('.').next().unwrap_or(task_name);
        if let Some(queue) = keyword_match(segment) {
            return queue.to_string();
        }

        // 4. Whole-name keyword scan
        if let Some(queue) = keyword_match(task_name) {
            return queue.to_string();
        }

        // 5. Total-function fallback
        self.registry.fallback().name.clone()
    }
}

/// First queue in the ordered table whose keywords appear in `candidate`
fn keyword_match(candidate: &str) -> Option<&'static str> {
    let lowered = candidate.to_lowercase();
    for (keywords, queue) in TASK_NAME_TABLE {
        if keywords.iter().any(|kw| lowered.contains(kw)) {
            return Some(queue);
        }
    }
    None
}

/// Base priority plus flag modifiers, clamped to [1, 10]
fn compute_priority(base: u8, hints: &RoutingHints) -> u8 {
    let mut priority = i32::from(base);

    if hints.user_initiated {
        priority += 3;
    }
    if hints.real_time {
        priority += 5;
    }
    if hints.batch_operation {
        priority -= 2;
    }
    if hints.background {
        priority -= 3;
    }
    if hints.retry {
        priority -= 1;
    }
    if let Some(batch_size) = hints.batch_size {
        if batch_size > 10 {
            priority -= (batch_size / 20).min(2) as i32;
        }
    }

    // Explicit override wins when it is itself a legal priority
    if let Some(explicit) = hints.priority_override {
        if (PRIORITY_MIN..=PRIORITY_MAX).contains(&explicit) {
            return explicit;
        }
    }

    priority.clamp(i32::from(PRIORITY_MIN), i32::from(PRIORITY_MAX)) as u8
}
