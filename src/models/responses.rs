//! Response DTOs for the memoization API
//!
//! Defines the structure of outgoing HTTP response bodies.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::cache::{CacheStats, Lifetime, MaxSize};

/// Response body for a function call (POST /call/:function)
#[derive(Debug, Clone, Serialize)]
pub struct CallResponse {
    /// The function that was called
    pub function: String,
    /// Its result, cached or freshly computed
    pub result: Value,
}

impl CallResponse {
    pub fn new(function: impl Into<String>, result: Value) -> Self {
        Self {
            function: function.into(),
            result,
        }
    }
}

/// Statistics of one function cache (GET /stats/:function)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub maxsize: MaxSize,
    pub currsize: usize,
    pub lifetime: Lifetime,
    pub expired: u64,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            maxsize: stats.maxsize,
            currsize: stats.currsize,
            lifetime: stats.lifetime,
            expired: stats.expired,
            hit_rate: stats.hit_rate(),
        }
    }
}

/// Statistics of every function cache (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsOverviewResponse {
    pub functions: BTreeMap<String, StatsResponse>,
}

/// Response body for clearing a cache (DELETE /cache/:function)
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    /// Success message
    pub message: String,
    /// The function whose cache was cleared
    pub function: String,
}

impl ClearResponse {
    pub fn new(function: impl Into<String>) -> Self {
        let function = function.into();
        Self {
            message: format!("Cache of '{}' cleared", function),
            function,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
