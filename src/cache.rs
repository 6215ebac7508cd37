//! In-memory TTL cache for finished plans.
//!
//! A full agent run costs multiple model turns plus tool calls; identical
//! requests inside the TTL window are served from here instead. Entries
//! expire lazily on read, and insertion evicts oldest-first once the cache
//! reaches capacity. Per-key reads and writes are independent; no
//! cross-request coordination is needed.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use crate::plan::TripPlan;

// ─── Keying ──────────────────────────────────────────────────────────────────

/// Stable cache key for a request: hex SHA-256 of its canonically-serialized
/// fields (serde_json orders object keys, so field order cannot perturb the
/// digest).
pub fn request_key(prompt: &str, language: Option<&str>, currency: Option<&str>) -> String {
    let payload = serde_json::json!({
        "prompt": prompt,
        "language": language,
        "currency": currency,
    });
    let digest = Sha256::digest(payload.to_string().as_bytes());
    format!("plan:{:x}", digest)
}

// ─── PlanCache ───────────────────────────────────────────────────────────────

struct CacheEntry {
    plan: TripPlan,
    expires_at: Instant,
}

/// Cache statistics snapshot.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub active_entries: usize,
    pub expired_entries: usize,
}

/// Bounded TTL map in front of the orchestrator.
pub struct PlanCache {
    ttl: Duration,
    capacity: usize,
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    /// Insertion order, oldest first, for FIFO eviction.
    order: VecDeque<String>,
}

impl PlanCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Fetch a live entry. An expired entry is removed on the way out.
    pub fn get(&self, key: &str) -> Option<TripPlan> {
        let mut inner = self.inner.lock().expect("cache lock");
        match inner.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                tracing::debug!(key, "plan cache hit");
                Some(entry.plan.clone())
            }
            Some(_) => {
                tracing::debug!(key, "plan cache entry expired");
                inner.entries.remove(key);
                inner.order.retain(|k| k != key);
                None
            }
            None => {
                tracing::debug!(key, "plan cache miss");
                None
            }
        }
    }

    /// Store a plan under `key`, evicting oldest entries beyond capacity.
    pub fn put(&self, key: &str, plan: TripPlan) {
        let mut inner = self.inner.lock().expect("cache lock");

        if inner.entries.contains_key(key) {
            inner.order.retain(|k| k != key);
        }
        while inner.entries.len() >= self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                    tracing::debug!(key = %oldest, "plan cache evicted oldest entry");
                }
                None => break,
            }
        }

        inner.entries.insert(
            key.to_string(),
            CacheEntry {
                plan,
                expires_at: Instant::now() + self.ttl,
            },
        );
        inner.order.push_back(key.to_string());
        tracing::debug!(key, ttl_secs = self.ttl.as_secs(), "plan cache set");
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("cache lock");
        inner.entries.clear();
        inner.order.clear();
        tracing::info!("plan cache cleared");
    }

    /// Entry counts, distinguishing live from lazily-expired.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().expect("cache lock");
        let now = Instant::now();
        let active = inner
            .entries
            .values()
            .filter(|e| e.expires_at > now)
            .count();
        CacheStats {
            total_entries: inner.entries.len(),
            active_entries: active,
            expired_entries: inner.entries.len() - active,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
