//! TLRU Cache Module
//!
//! The invocation protocol: look up a key, serve it if fresh, otherwise run the
//! caller's thunk outside the lock and store what it returns.

use std::collections::HashSet;
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tokio::sync::Notify;
use tracing::{info, trace};

use crate::cache::{CacheStats, EntryStore, Lifetime, MaxSize, StatsTracker};
use crate::clock::{Clock, MonotonicClock};

// == Herd Policy ==
/// What concurrent misses on the same key do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HerdPolicy {
    /// Every missing caller computes; the last store wins.
    #[default]
    Duplicate,
    /// One caller computes, the others wait for it and then read the cache.
    ///
    /// A thunk that requests its own key through the same cache deadlocks
    /// under this policy.
    SingleFlight,
}

// == Cache Config ==
/// Construction parameters of a cache instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub maxsize: MaxSize,
    pub lifetime: Lifetime,
    /// Whether keys distinguish argument types. Only the key builder reads this.
    pub typed: bool,
    pub herd: HerdPolicy,
}

impl CacheConfig {
    pub fn new(maxsize: impl Into<MaxSize>, lifetime: impl Into<Lifetime>) -> Self {
        Self {
            maxsize: maxsize.into(),
            lifetime: lifetime.into(),
            ..Self::default()
        }
    }

    pub fn with_typed(mut self, typed: bool) -> Self {
        self.typed = typed;
        self
    }

    pub fn with_herd(mut self, herd: HerdPolicy) -> Self {
        self.herd = herd;
        self
    }
}

impl Default for CacheConfig {
    /// 128 entries, 60 second lifetime, untyped keys.
    fn default() -> Self {
        Self {
            maxsize: MaxSize::Bounded(128),
            lifetime: Lifetime::After(Duration::from_secs(60)),
            typed: false,
            herd: HerdPolicy::Duplicate,
        }
    }
}

struct Inner<K, V> {
    store: EntryStore<K, V>,
    stats: StatsTracker,
    /// Keys currently being computed (single-flight only)
    in_flight: HashSet<K>,
    /// Bumped by every clear; a computation started in an older epoch is not stored
    epoch: u64,
}

enum Step<V> {
    Hit(V),
    /// Miss; carries the epoch the computation belongs to
    Compute(u64),
    Wait,
}

// == TLRU Cache ==
/// A time-aware LRU cache for the results of one deterministic function.
///
/// All bookkeeping happens under a single lock. The thunk that produces a
/// missing value always runs with the lock released, so a slow computation
/// does not block other keys and a thunk may call back into the same cache.
///
/// # Example
/// ```
/// use tlru_cache::cache::{CacheConfig, TlruCache};
///
/// let cache: TlruCache<u64, u64> = TlruCache::new(CacheConfig::default());
/// assert_eq!(cache.call(4, || 4 * 4), 16);
/// assert_eq!(cache.call(4, || unreachable!()), 16);
/// assert_eq!(cache.stats().hits, 1);
/// ```
pub struct TlruCache<K, V, C = MonotonicClock> {
    inner: Mutex<Inner<K, V>>,
    flight_done: Condvar,
    flight_notify: Notify,
    config: CacheConfig,
    clock: C,
}

impl<K, V> TlruCache<K, V, MonotonicClock>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    // == Constructor ==
    /// Creates a cache driven by the monotonic system clock.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, MonotonicClock)
    }
}

impl<K, V, C> TlruCache<K, V, C>
where
    K: Hash + Eq + Clone,
    V: Clone,
    C: Clock,
{
    /// Creates a cache that reads time from `clock`.
    pub fn with_clock(config: CacheConfig, clock: C) -> Self {
        Self {
            inner: Mutex::new(Inner {
                store: EntryStore::new(config.maxsize),
                stats: StatsTracker::new(),
                in_flight: HashSet::new(),
                epoch: 0,
            }),
            flight_done: Condvar::new(),
            flight_notify: Notify::new(),
            config,
            clock,
        }
    }

    // == Call ==
    /// Returns the cached value for `key`, or computes it with `thunk`.
    pub fn call<F>(&self, key: K, thunk: F) -> V
    where
        F: FnOnce() -> V,
    {
        match self.try_call(key, || Ok::<V, Infallible>(thunk())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    // == Try Call ==
    /// Like [`call`](Self::call) for fallible thunks.
    ///
    /// An error from `thunk` is returned untouched and nothing is stored.
    pub fn try_call<F, E>(&self, key: K, thunk: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let epoch = {
            let mut inner = self.inner.lock();
            loop {
                match self.step(&mut inner, &key) {
                    Step::Hit(value) => return Ok(value),
                    Step::Compute(epoch) => break epoch,
                    Step::Wait => self.flight_done.wait(&mut inner),
                }
            }
        };

        let flight = Flight::new(self, key, epoch);
        let value = thunk()?;
        flight.complete(value.clone());
        Ok(value)
    }

    // == Call Async ==
    /// Async counterpart of [`call`](Self::call).
    pub async fn call_async<F, Fut>(&self, key: K, thunk: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let result = self
            .try_call_async(key, || async move { Ok::<V, Infallible>(thunk().await) })
            .await;
        match result {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    // == Try Call Async ==
    /// Async counterpart of [`try_call`](Self::try_call).
    ///
    /// The lock is never held across an await point. Dropping the returned
    /// future before the thunk finishes stores nothing.
    pub async fn try_call_async<F, Fut, E>(&self, key: K, thunk: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let epoch = loop {
            let notified = self.flight_notify.notified();
            tokio::pin!(notified);
            {
                let mut inner = self.inner.lock();
                match self.step(&mut inner, &key) {
                    Step::Hit(value) => return Ok(value),
                    Step::Compute(epoch) => break epoch,
                    // Register before the lock is released so the wakeup can't be missed
                    Step::Wait => {
                        notified.as_mut().enable();
                    }
                }
            }
            notified.await;
        };

        let flight = Flight::new(self, key, epoch);
        let value = thunk().await?;
        flight.complete(value.clone());
        Ok(value)
    }

    // == Stats ==
    /// Returns a snapshot of the cache statistics.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        inner
            .stats
            .snapshot(self.config.maxsize, inner.store.len(), self.config.lifetime)
    }

    // == Clear ==
    /// Drops every entry and zeroes the statistics in one step.
    ///
    /// Computations already running return their value to their callers but
    /// do not store it.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let dropped = inner.store.len();
        inner.store.clear();
        inner.epoch = inner.epoch.wrapping_add(1);
        inner.stats.reset();
        info!(dropped, "cache cleared");
    }

    // == Length ==
    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.inner.lock().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Runs one round of the lookup protocol and updates the counters.
    fn step(&self, inner: &mut Inner<K, V>, key: &K) -> Step<V> {
        let now = self.clock.now();
        let lifetime = self.config.lifetime;
        let found = inner.store.get(key).map(|entry| {
            if entry.is_fresh(now, lifetime) {
                Ok(entry.value.clone())
            } else {
                Err(entry.age(now))
            }
        });

        match found {
            Some(Ok(value)) => {
                inner.stats.record_hit();
                trace!("cache hit");
                return Step::Hit(value);
            }
            _ if self.single_flight() && inner.in_flight.contains(key) => {
                trace!("waiting for in-flight computation");
                return Step::Wait;
            }
            Some(Err(age)) => {
                inner.store.remove(key);
                inner.stats.record_expired();
                trace!(?age, "cache entry expired");
            }
            None => {
                inner.stats.record_miss();
                trace!("cache miss");
            }
        }

        if self.single_flight() {
            inner.in_flight.insert(key.clone());
        }
        Step::Compute(inner.epoch)
    }

    fn single_flight(&self) -> bool {
        self.config.herd == HerdPolicy::SingleFlight
    }

    /// Clears the in-flight marker for `key` and wakes every waiter.
    fn release(&self, inner: &mut Inner<K, V>, key: &K) {
        if self.single_flight() {
            inner.in_flight.remove(key);
            self.flight_done.notify_all();
            self.flight_notify.notify_waiters();
        }
    }
}

impl<K, V, C> fmt::Debug for TlruCache<K, V, C>
where
    K: Hash + Eq + Clone,
    V: Clone,
    C: Clock,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlruCache")
            .field("config", &self.config)
            .field("currsize", &self.len())
            .finish()
    }
}

// == Flight ==
/// A computation in progress for one key.
///
/// Completing it stores the value unless the cache was cleared after the
/// computation started. Dropping it without completing (thunk
/// error, panic, or a cancelled future) only releases the key for waiters.
struct Flight<'a, K, V, C>
where
    K: Hash + Eq + Clone,
    V: Clone,
    C: Clock,
{
    cache: &'a TlruCache<K, V, C>,
    key: Option<K>,
    epoch: u64,
}

impl<'a, K, V, C> Flight<'a, K, V, C>
where
    K: Hash + Eq + Clone,
    V: Clone,
    C: Clock,
{
    fn new(cache: &'a TlruCache<K, V, C>, key: K, epoch: u64) -> Self {
        Self {
            cache,
            key: Some(key),
            epoch,
        }
    }

    fn complete(mut self, value: V) {
        if let Some(key) = self.key.take() {
            let mut inner = self.cache.inner.lock();
            self.cache.release(&mut inner, &key);
            if inner.epoch != self.epoch {
                trace!("cache cleared during computation, result not stored");
                return;
            }
            let now = self.cache.clock.now();
            inner.store.put(key, value, now);
        }
    }
}

impl<K, V, C> Drop for Flight<'_, K, V, C>
where
    K: Hash + Eq + Clone,
    V: Clone,
    C: Clock,
{
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            if self.cache.single_flight() {
                let mut inner = self.cache.inner.lock();
                self.cache.release(&mut inner, &key);
            }
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::cell::Cell;

    fn timed_cache(maxsize: usize, lifetime_ms: u64) -> (TlruCache<u32, u32, ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let config = CacheConfig::new(maxsize, Duration::from_millis(lifetime_ms));
        (TlruCache::with_clock(config, clock.clone()), clock)
    }

    fn square(v: u32) -> u32 {
        v * v
    }

    #[test]
    fn test_cache_access() {
        let cache: TlruCache<u32, u32> = TlruCache::new(CacheConfig::default());
        let runs = Cell::new(0);
        let f = |v: u32| {
            runs.set(runs.get() + 1);
            square(v)
        };

        assert_eq!(cache.call(2, || f(2)), 4);
        assert_eq!(cache.call(2, || f(2)), 4);
        assert_eq!(runs.get(), 1, "function not run exactly once");
    }

    #[test]
    fn test_cache_clear() {
        let cache: TlruCache<u32, u32> = TlruCache::new(CacheConfig::default());
        let runs = Cell::new(0);
        let f = |v: u32| {
            runs.set(runs.get() + 1);
            square(v)
        };

        cache.call(2, || f(2));
        cache.call(2, || f(2));
        cache.clear();

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.expired, stats.currsize), (0, 0, 0, 0));

        cache.call(2, || f(2));
        assert_eq!(runs.get(), 2, "function did not run twice");
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_cache_stats_with_expiry() {
        let (cache, clock) = timed_cache(5, 1);

        cache.call(1, || square(1));
        cache.call(2, || square(2));
        cache.call(1, || square(1));
        clock.advance(Duration::from_millis(5));
        cache.call(2, || square(2));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 3);
        assert_eq!(stats.maxsize, MaxSize::Bounded(5));
        // Key 1 is stale but still stored
        assert_eq!(stats.currsize, 2);
        assert_eq!(stats.lifetime, Lifetime::After(Duration::from_millis(1)));
        assert_eq!(stats.expired, 1);
    }

    #[test]
    fn test_cache_lru() {
        let cache: TlruCache<u32, u32> = TlruCache::new(CacheConfig::new(5usize, Lifetime::Never));

        for i in 1..=5 {
            cache.call(i, || square(i));
        }
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.currsize), (0, 5, 5));
        assert_eq!(stats.lifetime, Lifetime::Never);

        cache.call(3, || square(3));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.currsize), (1, 5, 5));

        // Evicts 1
        cache.call(6, || square(6));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.currsize), (1, 6, 5));

        cache.call(1, || square(1));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 7));
    }

    #[test]
    fn test_cache_timed() {
        let (cache, clock) = timed_cache(10, 50);

        for i in 1..=5 {
            cache.call(i, || square(i));
        }
        clock.advance(Duration::from_millis(25));
        for i in 6..=10 {
            cache.call(i, || square(i));
        }
        clock.advance(Duration::from_millis(20));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.currsize), (0, 10, 10));

        cache.call(3, || square(3));
        assert_eq!(cache.stats().hits, 1);

        // First batch is now 65ms old
        clock.advance(Duration::from_millis(20));
        cache.call(1, || square(1));
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 11);
        assert_eq!(stats.currsize, 10);
        assert_eq!(stats.expired, 1);

        // Second batch is 40ms old and still fresh
        cache.call(7, || unreachable!());
        assert_eq!(cache.stats().hits, 2);
    }

    #[test]
    fn test_infinity_cache() {
        let cache: TlruCache<u32, u32> =
            TlruCache::new(CacheConfig::new(MaxSize::Unbounded, Lifetime::Never));

        for i in 0..1024 {
            cache.call(i, || square(i));
        }
        for i in (0..1024).rev() {
            cache.call(i, || square(i));
        }
        for i in 0..1024 {
            cache.call(i, || square(i));
        }

        let stats = cache.stats();
        assert_eq!(stats.hits, 2048);
        assert_eq!(stats.misses, 1024);
        assert_eq!(stats.maxsize, MaxSize::Unbounded);
        assert_eq!(stats.currsize, 1024);
        assert_eq!(stats.expired, 0);
    }

    #[test]
    fn test_unbounded_lifetime_survives_long_gaps() {
        let clock = ManualClock::new();
        let cache = TlruCache::with_clock(CacheConfig::new(4usize, Lifetime::Never), clock.clone());

        cache.call(1u32, || 10u32);
        clock.advance(Duration::from_secs(60 * 60 * 24 * 365));

        assert_eq!(cache.call(1, || unreachable!()), 10);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_zero_capacity_counts_calls() {
        let cache: TlruCache<u32, u32> = TlruCache::new(CacheConfig::new(0usize, Lifetime::Never));
        let runs = Cell::new(0);

        for _ in 0..3 {
            cache.call(7, || {
                runs.set(runs.get() + 1);
                49
            });
        }

        let stats = cache.stats();
        assert_eq!(runs.get(), 3);
        assert_eq!((stats.hits, stats.misses, stats.currsize), (0, 3, 0));
    }

    #[test]
    fn test_zero_lifetime_always_stale() {
        let cache: TlruCache<u32, u32> =
            TlruCache::new(CacheConfig::new(4usize, Lifetime::After(Duration::ZERO)));

        cache.call(1, || 1);
        cache.call(1, || 1);
        cache.call(1, || 1);

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.expired), (0, 3, 2));
        assert_eq!(stats.currsize, 1);
    }

    #[test]
    fn test_expired_counts_as_miss_exactly_once() {
        let (cache, clock) = timed_cache(4, 100);

        cache.call(1, || 1);
        clock.advance(Duration::from_millis(100));
        let before = cache.stats();
        cache.call(1, || 1);
        let after = cache.stats();

        assert_eq!(after.misses - before.misses, 1);
        assert_eq!(after.expired - before.expired, 1);
        assert_eq!(after.hits, before.hits);
    }

    #[test]
    fn test_refresh_restarts_lifetime() {
        let (cache, clock) = timed_cache(4, 100);

        cache.call(1, || 1);
        clock.advance(Duration::from_millis(150));
        cache.call(1, || 2);
        clock.advance(Duration::from_millis(60));

        assert_eq!(cache.call(1, || unreachable!()), 2);
    }

    #[test]
    fn test_lru_ordering_follows_access() {
        let cache: TlruCache<char, u32> = TlruCache::new(CacheConfig::new(3usize, Lifetime::Never));

        cache.call('A', || 1);
        cache.call('B', || 2);
        cache.call('C', || 3);
        cache.call('A', || unreachable!());
        cache.call('D', || 4);

        // B was least recently used
        assert_eq!(cache.call('A', || unreachable!()), 1);
        assert_eq!(cache.call('C', || unreachable!()), 3);
        assert_eq!(cache.call('B', || 20), 20);
    }

    #[test]
    fn test_lru_ordering_capacity_two() {
        let cache: TlruCache<char, u32> = TlruCache::new(CacheConfig::new(2usize, Lifetime::Never));

        for key in ['A', 'B', 'C', 'A', 'D'] {
            cache.call(key, || 0);
        }

        let stats = cache.stats();
        assert_eq!(stats.currsize, 2);
        assert_eq!(cache.call('A', || 1), 0);
        assert_eq!(cache.call('D', || 1), 0);
    }

    #[test]
    fn test_failure_is_not_cached() {
        let cache: TlruCache<u32, u32> = TlruCache::new(CacheConfig::default());

        let first: Result<u32, &str> = cache.try_call(1, || Err("boom"));
        assert_eq!(first, Err("boom"));
        assert_eq!(cache.len(), 0);

        let second: Result<u32, &str> = cache.try_call(1, || Ok(5));
        assert_eq!(second, Ok(5));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (0, 2));
    }

    #[test]
    fn test_failure_on_stale_discards_entry() {
        let (cache, clock) = timed_cache(4, 10);

        cache.call(1, || 1);
        clock.advance(Duration::from_millis(10));

        let result: Result<u32, String> = cache.try_call(1, || Err("down".to_string()));
        assert_eq!(result, Err("down".to_string()));
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().expired, 1);
    }

    #[test]
    fn test_recursive_call_does_not_deadlock() {
        fn fib(cache: &TlruCache<u64, u64>, n: u64) -> u64 {
            cache.call(n, || if n < 2 { n } else { fib(cache, n - 1) + fib(cache, n - 2) })
        }

        let cache = TlruCache::new(CacheConfig::new(MaxSize::Unbounded, Lifetime::Never));
        assert_eq!(fib(&cache, 80), 23_416_728_348_467_685);
        assert_eq!(cache.stats().misses, 81);
    }

    #[test]
    fn test_config_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.maxsize, MaxSize::Bounded(128));
        assert_eq!(config.lifetime, Lifetime::After(Duration::from_secs(60)));
        assert!(!config.typed);
        assert_eq!(config.herd, HerdPolicy::Duplicate);
    }

    #[tokio::test]
    async fn test_call_async() {
        let cache: TlruCache<u32, u32> = TlruCache::new(CacheConfig::default());

        let value = cache.call_async(3, || async { square(3) }).await;
        assert_eq!(value, 9);
        let value = cache.call_async(3, || async { 0 }).await;
        assert_eq!(value, 9);

        let failed: Result<u32, &str> = cache.try_call_async(4, || async { Err("nope") }).await;
        assert_eq!(failed, Err("nope"));
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn test_clear_discards_computation_in_progress() {
        let cache: TlruCache<u32, u32> = TlruCache::new(CacheConfig::default());

        let value = cache.call(1, || {
            cache.clear();
            10
        });
        assert_eq!(value, 10);

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.currsize), (0, 0, 0));
        assert_eq!(cache.call(1, || 20), 20);
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_cancelled_async_call_stores_nothing() {
        let cache: TlruCache<u32, u32> =
            TlruCache::new(CacheConfig::default().with_herd(HerdPolicy::SingleFlight));

        let pending = cache.call_async(1, || std::future::pending::<u32>());
        let timed_out = tokio::time::timeout(Duration::from_millis(20), pending).await;
        assert!(timed_out.is_err());
        assert_eq!(cache.len(), 0);

        // The key is not left marked as in flight
        assert_eq!(cache.call_async(1, || async { 11 }).await, 11);
    }
}
