//! Typed routing hints extracted from submission kwargs.
//!
//! The router's contract stays statically checkable: all routing-relevant
//! fields live in [`RoutingHints`], while non-routing kwargs pass through as
//! an opaque payload map. Extraction is tolerant: malformed values are
//! treated as absent, never as errors.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Declared resource needs attached to a submission
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequirements {
    pub gpu: bool,
    pub vram_gb: f64,
    pub cpu_intensive: bool,
    pub io_intensive: bool,
}

/// Routing-relevant subset of a submission's kwargs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingHints {
    /// `priority_task` flag: bypass straight to the priority queue
    pub priority_bypass: bool,
    /// Explicit `priority` value; overrides the computed priority when in [1, 10]
    pub priority_override: Option<u8>,
    pub resource_requirements: Option<ResourceRequirements>,
    pub user_initiated: bool,
    pub real_time: bool,
    pub batch_operation: bool,
    pub background: bool,
    pub retry: bool,
    pub batch_size: Option<u32>,
}

/// Kwarg keys consumed into [`RoutingHints`]
const HINT_KEYS: &[&str] = &[
    "priority_task",
    "priority",
    "resource_requirements",
    "user_initiated",
    "real_time",
    "batch_operation",
    "background",
    "retry",
    "batch_size",
];

impl RoutingHints {
    /// Pull routing hints out of raw kwargs, returning the hints and the
    /// remaining opaque payload
    pub fn extract(
        mut kwargs: HashMap<String, serde_json::Value>,
    ) -> (Self, HashMap<String, serde_json::Value>) {
        let mut hints = Self::default();

        hints.priority_bypass = take_bool(&mut kwargs, "priority_task");
        hints.user_initiated = take_bool(&mut kwargs, "user_initiated");
        hints.real_time = take_bool(&mut kwargs, "real_time");
        hints.batch_operation = take_bool(&mut kwargs, "batch_operation");
        hints.background = take_bool(&mut kwargs, "background");
        hints.retry = take_bool(&mut kwargs, "retry");

        hints.priority_override = kwargs
            .remove("priority")
            .and_then(|v| v.as_u64())
            .and_then(|v| u8::try_from(v).ok());
        hints.batch_size = kwargs
            .remove("batch_size")
            .and_then(|v| v.as_u64())
            .and_then(|v| u32::try_from(v).ok());

        if let Some(raw) = kwargs.remove("resource_requirements") {
            hints.resource_requirements = parse_requirements(&raw);
        }

        (hints, kwargs)
    }

    /// True when any resource requirement is actually declared
    pub fn has_resource_requirements(&self) -> bool {
        self.resource_requirements
            .map(|r| r.gpu || r.cpu_intensive || r.io_intensive)
            .unwrap_or(false)
    }

    /// Canonical cache-key fragment covering every routing-relevant field.
    /// Two submissions with identical fragments route identically.
    pub fn cache_key_fragment(&self) -> String {
        let req = self.resource_requirements.unwrap_or_default();
        format!(
            "pb={};po={:?};gpu={};vram={};cpu={};io={};ui={};rt={};bo={};bg={};re={};bs={:?}",
            self.priority_bypass,
            self.priority_override,
            req.gpu,
            req.vram_gb,
            req.cpu_intensive,
            req.io_intensive,
            self.user_initiated,
            self.real_time,
            self.batch_operation,
            self.background,
            self.retry,
            self.batch_size,
        )
    }

    /// Whether a kwarg key is consumed by hint extraction
    pub fn is_hint_key(key: &str) -> bool {
        HINT_KEYS.contains(&key)
    }
}

fn take_bool(kwargs: &mut HashMap<String, serde_json::Value>, key: &str) -> bool {
    kwargs
        .remove(key)
        .map(|v| v.as_bool().unwrap_or(false))
        .unwrap_or(false)
}

fn parse_requirements(raw: &serde_json::Value) -> Option<ResourceRequirements> {
    let map = raw.as_object()?;
    Some(ResourceRequirements {
        gpu: map.get("gpu").and_then(|v| v.as_bool()).unwrap_or(false),
        vram_gb: map.get("vram_gb").and_then(|v| v.as_f64()).unwrap_or(0.0),
        cpu_intensive: map
            .get("cpu_intensive")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        io_intensive: map
            .get("io_intensive")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
    })
}
