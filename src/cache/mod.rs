//! Cache Module
//!
//! Time-aware LRU memoization: entries are dropped by capacity (least recently
//! used first) and ignored once older than the configured lifetime.

mod entry;
mod lru;
mod policy;
mod stats;
mod store;
mod tlru;


// Re-export public types
pub use entry::CacheEntry;
pub use lru::LruList;
pub use policy::{is_fresh, Lifetime, MaxSize};
pub use stats::{CacheStats, StatsTracker};
pub use store::EntryStore;
pub use tlru::{CacheConfig, HerdPolicy, TlruCache};
