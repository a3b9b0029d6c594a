//! TLRU Cache - A time-aware LRU memoization engine
//!
//! Caches results of pure functions with per-entry lifetimes and LRU eviction,
//! and exposes a small set of memoized functions over HTTP.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod functions;
pub mod key;
pub mod models;

pub use api::{create_router, AppState};
pub use cache::{CacheConfig, CacheStats, HerdPolicy, Lifetime, MaxSize, TlruCache};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::Config;
pub use error::{CacheError, Result};
pub use functions::{FunctionRegistry, Memoized};
pub use key::{build_key, ArgValue, CallArgs, CallKey};
