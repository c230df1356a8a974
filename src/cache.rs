// src/cache.rs
//! Per-expert answer cache with absolute TTL and lazy expiry.
//!
//! - `enabled=false` turns `get` into a permanent miss and `set` into a no-op.
//! - Staleness is evaluated at `get` time; stale entries are dropped on the spot.
//! - Concurrent writers race with "last write wins" semantics.
//! - Ages come from `tokio::time::Instant`, so a paused test clock drives expiry.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use tokio::time::Instant;

use metrics::counter;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub answer: String,
    pub stored_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) < ttl
    }
}

/// Returned when the underlying store can no longer be used (poisoned lock).
#[derive(Debug, thiserror::Error)]
#[error("answer cache unavailable: {0}")]
pub struct CacheUnavailable(pub String);

#[derive(Debug)]
pub struct Cache {
    enabled: bool,
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl Cache {
    pub fn new(enabled: bool, ttl: Duration) -> Self {
        Self {
            enabled,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Cache that never stores anything.
    pub fn disabled() -> Self {
        Self::new(false, Duration::ZERO)
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up `key` verbatim. Expired entries are never returned.
    pub fn get(&self, key: &str) -> Result<Option<String>, CacheUnavailable> {
        if !self.enabled {
            return Ok(None);
        }
        let now = Instant::now();

        // Fast path under the read lock.
        let stale = {
            let guard = self
                .entries
                .read()
                .map_err(|e| CacheUnavailable(e.to_string()))?;
            match guard.get(key) {
                Some(entry) if entry.is_fresh(self.ttl, now) => {
                    counter!("expert_cache_hits_total").increment(1);
                    return Ok(Some(entry.answer.clone()));
                }
                Some(_) => true,
                None => false,
            }
        };

        if stale {
            let mut guard = self
                .entries
                .write()
                .map_err(|e| CacheUnavailable(e.to_string()))?;
            // Double-check: a concurrent writer may have refreshed it.
            if guard
                .get(key)
                .is_some_and(|entry| !entry.is_fresh(self.ttl, Instant::now()))
            {
                guard.remove(key);
            }
        }
        counter!("expert_cache_misses_total").increment(1);
        Ok(None)
    }

    /// Store a substantive answer. Empty answers are ignored.
    pub fn set(&self, key: &str, answer: &str) -> Result<(), CacheUnavailable> {
        if !self.enabled || answer.trim().is_empty() {
            return Ok(());
        }
        let mut guard = self
            .entries
            .write()
            .map_err(|e| CacheUnavailable(e.to_string()))?;
        guard.insert(
            key.to_string(),
            CacheEntry {
                answer: answer.to_string(),
                stored_at: Instant::now(),
            },
        );
        Ok(())
    }

    /// Number of stored entries, fresh or not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Leave the store in the state a panicking writer would.
    #[cfg(test)]
    pub(crate) fn poison(&self) {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = self.entries.write();
            panic!("writer died while holding the answer cache");
        }));
    }
}
