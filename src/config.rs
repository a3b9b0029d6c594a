//! Configuration Module
//!
//! Loads cache and server settings from environment variables. Values that do
//! not parse stop startup instead of silently falling back to defaults.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{CacheConfig, HerdPolicy, Lifetime, MaxSize};
use crate::error::{CacheError, Result};

/// Server configuration parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Entries kept per function cache
    pub maxsize: MaxSize,
    /// How long a cached result stays fresh
    pub lifetime: Lifetime,
    /// Whether argument types take part in cache keys
    pub typed: bool,
    /// Collapse concurrent misses on one key into a single computation
    pub single_flight: bool,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAXSIZE` - Entries per cache, `none` for unbounded (default: 128)
    /// - `CACHE_LIFETIME` - Seconds an entry stays fresh, `none` to never expire (default: 60)
    /// - `CACHE_TYPED` - Distinguish argument types in keys (default: false)
    /// - `CACHE_SINGLE_FLIGHT` - One computation per key at a time (default: false)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with variables read through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            maxsize: read(&lookup, "CACHE_MAXSIZE", parse_maxsize)?.unwrap_or(defaults.maxsize),
            lifetime: read(&lookup, "CACHE_LIFETIME", parse_lifetime)?
                .unwrap_or(defaults.lifetime),
            typed: read(&lookup, "CACHE_TYPED", parse_bool)?.unwrap_or(defaults.typed),
            single_flight: read(&lookup, "CACHE_SINGLE_FLIGHT", parse_bool)?
                .unwrap_or(defaults.single_flight),
            server_port: read(&lookup, "SERVER_PORT", parse_number)?
                .unwrap_or(defaults.server_port),
        })
    }

    /// Settings for each function's cache.
    pub fn cache_config(&self) -> CacheConfig {
        let herd = if self.single_flight {
            HerdPolicy::SingleFlight
        } else {
            HerdPolicy::Duplicate
        };
        CacheConfig::new(self.maxsize, self.lifetime)
            .with_typed(self.typed)
            .with_herd(herd)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            maxsize: MaxSize::Bounded(128),
            lifetime: Lifetime::After(Duration::from_secs(60)),
            typed: false,
            single_flight: false,
            server_port: 3000,
        }
    }
}

fn read<F, T>(lookup: &F, name: &str, parse: fn(&str) -> Option<T>) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => parse(raw.trim())
            .map(Some)
            .ok_or_else(|| CacheError::InvalidConfig(format!("{}={:?}", name, raw))),
    }
}

fn parse_maxsize(raw: &str) -> Option<MaxSize> {
    if is_none_marker(raw) {
        return Some(MaxSize::Unbounded);
    }
    raw.parse::<i64>().ok().map(MaxSize::from)
}

fn parse_lifetime(raw: &str) -> Option<Lifetime> {
    if is_none_marker(raw) {
        return Some(Lifetime::Never);
    }
    raw.parse::<f64>()
        .ok()
        .and_then(|secs| Lifetime::from_secs_f64(secs).ok())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_number<T: FromStr>(raw: &str) -> Option<T> {
    raw.parse().ok()
}

fn is_none_marker(raw: &str) -> bool {
    matches!(
        raw.to_ascii_lowercase().as_str(),
        "none" | "unbounded" | "never"
    )
}
