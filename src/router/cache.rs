//! TTL cache for routing decisions.
//!
//! Read-mostly: lookups take a shared lock, inserts prune lazily. Stale reads
//! up to the TTL are acceptable because queue definitions never change at
//! runtime; the TTL exists so operators editing the routing tables between
//! deploys see decisions converge.

use super::RoutingDecision;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct CacheEntry {
    decision: RoutingDecision,
    inserted_at: Instant,
}

/// Bounded TTL cache keyed by (task name + routing hint fragment)
pub struct RouteCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl RouteCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries,
        }
    }

    pub fn get(&self, key: &str) -> Option<RoutingDecision> {
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|e| e.inserted_at.elapsed() < self.ttl)
            .map(|e| e.decision.clone())
    }

    /// Insert a decision, dropping all expired entries first when the cache
    /// has outgrown its bound
    pub fn insert(&self, key: String, decision: RoutingDecision) {
        let mut entries = self.entries.write();
        if entries.len() >= self.max_entries {
            let ttl = self.ttl;
            entries.retain(|_, e| e.inserted_at.elapsed() < ttl);
        }
        entries.insert(
            key,
            CacheEntry {
                decision,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
