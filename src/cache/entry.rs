//! Cache Entry Module
//!
//! Defines the value half of a stored entry. The key lives in the store's map
//! and in the recency list.

use std::time::{Duration, Instant};

use crate::cache::policy::{is_fresh, Lifetime};

// == Cache Entry ==
/// A cached result together with the instant it was stored.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// When the value was stored or last refreshed
    pub created_at: Instant,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    pub fn new(value: V, created_at: Instant) -> Self {
        Self { value, created_at }
    }

    // == Is Fresh ==
    /// Checks the entry against `lifetime` at `now`.
    pub fn is_fresh(&self, now: Instant, lifetime: Lifetime) -> bool {
        is_fresh(self.created_at, now, lifetime)
    }

    // == Age ==
    /// Time elapsed since the entry was stored.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }
}
