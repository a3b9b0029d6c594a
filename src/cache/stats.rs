//! Cache Statistics Module
//!
//! Counters for hits, misses and expirations, and the read-only snapshot
//! handed out to callers.

use serde::Serialize;

use crate::cache::{Lifetime, MaxSize};

// == Stats Tracker ==
/// Live counters owned by a cache instance. Only the orchestrator touches these.
#[derive(Debug, Clone, Default)]
pub struct StatsTracker {
    hits: u64,
    misses: u64,
    expired: u64,
}

impl StatsTracker {
    /// Creates a tracker with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Record Hit ==
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    // == Record Miss ==
    /// Counts a call that has to run the wrapped function.
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    // == Record Expired ==
    /// Counts a miss caused by a stale entry. Also counts the miss itself.
    pub fn record_expired(&mut self) {
        self.misses += 1;
        self.expired += 1;
    }

    // == Reset ==
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    // == Snapshot ==
    /// Freezes the counters together with the derived fields.
    pub fn snapshot(&self, maxsize: MaxSize, currsize: usize, lifetime: Lifetime) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            maxsize,
            currsize,
            lifetime,
            expired: self.expired,
        }
    }
}

// == Cache Stats ==
/// Point-in-time statistics of one cache instance.
///
/// `misses` and `expired` overlap: a call that found a stale entry counts
/// towards both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Calls answered from the cache
    pub hits: u64,
    /// Calls that ran the wrapped function
    pub misses: u64,
    /// Capacity bound (`null` when unbounded)
    pub maxsize: MaxSize,
    /// Entries stored when the snapshot was taken
    pub currsize: usize,
    /// Entry lifetime in seconds (`null` when entries never expire)
    pub lifetime: Lifetime,
    /// Misses caused by a stale entry
    pub expired: u64,
}

impl CacheStats {
    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no calls have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
