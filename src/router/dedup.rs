//! Duplicate-submission suppression.
//!
//! The digest is deterministic over the logical submission: task name,
//! ordered args, and kwargs with volatile keys (`task_id`, `timestamp`)
//! stripped and remaining keys sorted. Identical logical submissions collide
//! regardless of kwarg ordering. The "processing" marker carries a TTL so a
//! crashed worker that never calls `mark_completed` self-heals.

use crate::constants::VOLATILE_KWARG_KEYS;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// In-flight submission tracker keyed by content hash
pub struct Deduplicator {
    processing: DashMap<String, DateTime<Utc>>,
    ttl: Duration,
}

impl Deduplicator {
    pub fn new(ttl: Duration) -> Self {
        Self {
            processing: DashMap::new(),
            ttl,
        }
    }

    /// Deterministic digest of a logical submission
    pub fn content_hash(
        task_name: &str,
        args: &[serde_json::Value],
        kwargs: &HashMap<String, serde_json::Value>,
    ) -> String {
        let stable: BTreeMap<&String, &serde_json::Value> = kwargs
            .iter()
            .filter(|(k, _)| !VOLATILE_KWARG_KEYS.contains(&k.as_str()))
            .collect();

        let mut canonical = String::with_capacity(64);
        canonical.push_str(task_name);
        canonical.push('|');
        for arg in args {
            canonical.push_str(&arg.to_string());
            canonical.push(',');
        }
        canonical.push('|');
        for (key, value) in stable {
            canonical.push_str(key);
            canonical.push('=');
            canonical.push_str(&value.to_string());
            canonical.push(';');
        }

        format!("{:016x}", fnv1a(canonical.as_bytes()))
    }

    /// Whether a live processing marker exists for this hash
    pub fn is_duplicate(&self, hash: &str) -> bool {
        match self.processing.get(hash) {
            Some(marked_at) => {
                let age = Utc::now().signed_duration_since(*marked_at);
                age.to_std().map(|a| a < self.ttl).unwrap_or(true)
            }
            None => false,
        }
    }

    pub fn mark_processing(&self, hash: &str) {
        self.processing.insert(hash.to_string(), Utc::now());
    }

    /// Atomically claim the hash for processing. Exactly one of any set of
    /// concurrent callers wins; the entry lock makes the check and the
    /// insert a single step. An expired marker counts as absent and is
    /// reclaimed by the winner.
    pub fn try_mark_processing(&self, hash: &str) -> bool {
        let now = Utc::now();
        match self.processing.entry(hash.to_string()) {
            Entry::Occupied(mut occupied) => {
                let age = now.signed_duration_since(*occupied.get());
                let live = age.to_std().map(|a| a < self.ttl).unwrap_or(true);
                if live {
                    false
                } else {
                    occupied.insert(now);
                    true
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(now);
                true
            }
        }
    }

    pub fn mark_completed(&self, hash: &str) {
        self.processing.remove(hash);
    }
}

// FNV-1a: stable across processes, no dependency needed.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}
