//! Eviction Policy Module
//!
//! Capacity and lifetime settings plus the staleness rule that combines them
//! with entry timestamps.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};

use crate::error::{CacheError, Result};

// == Max Size ==
/// Capacity bound of a cache instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxSize {
    /// No capacity eviction ever happens.
    Unbounded,
    /// At most this many entries are kept. Zero keeps nothing.
    Bounded(usize),
}

impl MaxSize {
    /// Returns the bound, or `None` when unbounded.
    pub fn limit(&self) -> Option<usize> {
        match self {
            MaxSize::Unbounded => None,
            MaxSize::Bounded(n) => Some(*n),
        }
    }

    /// True when no entry can ever be retained.
    pub fn retains_nothing(&self) -> bool {
        matches!(self, MaxSize::Bounded(0))
    }

    /// True when holding `len` entries is over the bound.
    pub fn is_exceeded_by(&self, len: usize) -> bool {
        match self {
            MaxSize::Unbounded => false,
            MaxSize::Bounded(n) => len > *n,
        }
    }
}

/// Negative sizes clamp to zero.
impl From<i64> for MaxSize {
    fn from(n: i64) -> Self {
        MaxSize::Bounded(usize::try_from(n).unwrap_or(0))
    }
}

impl From<usize> for MaxSize {
    fn from(n: usize) -> Self {
        MaxSize::Bounded(n)
    }
}

impl From<Option<usize>> for MaxSize {
    fn from(n: Option<usize>) -> Self {
        n.map_or(MaxSize::Unbounded, MaxSize::Bounded)
    }
}

impl fmt::Display for MaxSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxSize::Unbounded => write!(f, "unbounded"),
            MaxSize::Bounded(n) => write!(f, "{}", n),
        }
    }
}

impl Serialize for MaxSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.limit().serialize(serializer)
    }
}

// == Lifetime ==
/// How long an entry stays fresh after it was stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// Entries never go stale.
    Never,
    /// Entries go stale once this much time has passed. Zero means always stale.
    After(Duration),
}

impl Lifetime {
    /// Builds a lifetime from fractional seconds.
    ///
    /// Zero or negative values yield `After(Duration::ZERO)`. NaN and infinities
    /// are rejected.
    pub fn from_secs_f64(secs: f64) -> Result<Self> {
        if !secs.is_finite() {
            return Err(CacheError::InvalidConfig(format!(
                "lifetime must be a finite number of seconds, got {}",
                secs
            )));
        }
        if secs <= 0.0 {
            return Ok(Lifetime::After(Duration::ZERO));
        }
        Duration::try_from_secs_f64(secs)
            .map(Lifetime::After)
            .map_err(|e| CacheError::InvalidConfig(format!("lifetime {}s: {}", secs, e)))
    }

    /// Returns the lifetime in seconds, or `None` when entries never expire.
    pub fn as_secs_f64(&self) -> Option<f64> {
        match self {
            Lifetime::Never => None,
            Lifetime::After(d) => Some(d.as_secs_f64()),
        }
    }
}

impl From<Duration> for Lifetime {
    fn from(d: Duration) -> Self {
        Lifetime::After(d)
    }
}

impl From<Option<Duration>> for Lifetime {
    fn from(d: Option<Duration>) -> Self {
        d.map_or(Lifetime::Never, Lifetime::After)
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Never => write!(f, "never"),
            Lifetime::After(d) => write!(f, "{:?}", d),
        }
    }
}

impl Serialize for Lifetime {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.as_secs_f64().serialize(serializer)
    }
}

// == Freshness ==
/// Decides whether an entry stored at `created_at` may still be served at `now`.
///
/// An entry exactly `lifetime` old is stale.
pub fn is_fresh(created_at: Instant, now: Instant, lifetime: Lifetime) -> bool {
    match lifetime {
        Lifetime::Never => true,
        Lifetime::After(ttl) if ttl.is_zero() => false,
        Lifetime::After(ttl) => now.saturating_duration_since(created_at) < ttl,
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_is_always_fresh() {
        let t0 = Instant::now();
        let later = t0 + Duration::from_secs(60 * 60 * 24 * 365);
        assert!(is_fresh(t0, later, Lifetime::Never));
    }

    #[test]
    fn test_zero_lifetime_is_never_fresh() {
        let t0 = Instant::now();
        assert!(!is_fresh(t0, t0, Lifetime::After(Duration::ZERO)));
    }

    #[test]
    fn test_freshness_boundary_is_strict() {
        let t0 = Instant::now();
        let ttl = Lifetime::After(Duration::from_millis(50));

        assert!(is_fresh(t0, t0 + Duration::from_millis(49), ttl));
        assert!(!is_fresh(t0, t0 + Duration::from_millis(50), ttl));
        assert!(!is_fresh(t0, t0 + Duration::from_millis(51), ttl));
    }

    #[test]
    fn test_lifetime_from_secs() {
        assert_eq!(
            Lifetime::from_secs_f64(1.5).unwrap(),
            Lifetime::After(Duration::from_millis(1500))
        );
        assert_eq!(
            Lifetime::from_secs_f64(-3.0).unwrap(),
            Lifetime::After(Duration::ZERO)
        );
        assert!(matches!(
            Lifetime::from_secs_f64(f64::NAN),
            Err(CacheError::InvalidConfig(_))
        ));
        assert!(matches!(
            Lifetime::from_secs_f64(f64::INFINITY),
            Err(CacheError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_maxsize_clamps_negative() {
        assert_eq!(MaxSize::from(-5i64), MaxSize::Bounded(0));
        assert!(MaxSize::from(-5i64).retains_nothing());
        assert_eq!(MaxSize::from(None), MaxSize::Unbounded);
    }

    #[test]
    fn test_maxsize_exceeded() {
        assert!(!MaxSize::Unbounded.is_exceeded_by(usize::MAX));
        assert!(!MaxSize::Bounded(2).is_exceeded_by(2));
        assert!(MaxSize::Bounded(2).is_exceeded_by(3));
    }

    #[test]
    fn test_serialize_as_plain_numbers() {
        assert_eq!(serde_json::to_string(&MaxSize::Bounded(5)).unwrap(), "5");
        assert_eq!(serde_json::to_string(&MaxSize::Unbounded).unwrap(), "null");
        assert_eq!(
            serde_json::to_string(&Lifetime::After(Duration::from_millis(250))).unwrap(),
            "0.25"
        );
        assert_eq!(serde_json::to_string(&Lifetime::Never).unwrap(), "null");
    }
}
