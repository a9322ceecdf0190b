//! Routing decision cache.
//!
//! A TTL-expiring, eventually-consistent cache keyed on
//! `${type}:${complexity}:${pattern}:${ceil(input_tokens/1000)}k`, mirroring
//! the catalog's prompt cache shape (entry + stats + explicit
//! invalidation) but over `RoutingDecision` rather than prompt text.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::types::{Complexity, RoutingDecision, TaskDescriptor, TaskPattern};

/// Build the cache key for a task descriptor.
pub fn cache_key(descriptor: &TaskDescriptor) -> String {
    let thousands = (descriptor.input_tokens_estimate as f64 / 1000.0).ceil() as u64;
    format!(
        "{}:{}:{}:{}k",
        descriptor.task_type.as_str(),
        complexity_label(descriptor.complexity),
        pattern_label(descriptor.pattern),
        thousands
    )
}

fn complexity_label(complexity: Complexity) -> &'static str {
    match complexity {
        Complexity::Simple => "simple",
        Complexity::Medium => "medium",
        Complexity::Complex => "complex",
        Complexity::Critical => "critical",
    }
}

fn pattern_label(pattern: TaskPattern) -> &'static str {
    match pattern {
        TaskPattern::SingleShot => "single-shot",
        TaskPattern::MultiStep => "multi-step",
        TaskPattern::Iterative => "iterative",
        TaskPattern::ChainOfThought => "chain-of-thought",
    }
}

struct CacheEntry {
    decision: RoutingDecision,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Thread-safe, TTL-expiring store of routing decisions.
pub struct DecisionCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    stats: Mutex<CacheStats>,
    ttl: ChronoDuration,
}

impl DecisionCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            stats: Mutex::new(CacheStats::default()),
            ttl: ChronoDuration::seconds(ttl_secs as i64),
        }
    }

    pub fn get(&self, key: &str, now: DateTime<Utc>) -> Option<RoutingDecision> {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        let hit = match entries.get(key) {
            Some(entry) if now - entry.created_at < self.ttl => Some(entry.decision.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        };
        let mut stats = self.stats.lock().expect("cache lock poisoned");
        if hit.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        hit
    }

    pub fn put(&self, key: String, decision: RoutingDecision, now: DateTime<Utc>) {
        self.entries.lock().expect("cache lock poisoned").insert(
            key,
            CacheEntry {
                decision,
                created_at: now,
            },
        );
    }

    /// Eagerly invalidate every entry (catalog reload, weight change, or an
    /// explicit `clearCache` control-surface call).
    pub fn clear(&self) {
        self.entries.lock().expect("cache lock poisoned").clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.lock().expect("cache lock poisoned").clone()
    }

    /// Zero the hit/miss counters without touching cached entries, for an
    /// explicit `reset --stats` control-surface call.
    pub fn reset_stats(&self) {
        let mut stats = self.stats.lock().expect("cache lock poisoned");
        stats.hits = 0;
        stats.misses = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
