//! API Handlers
//!
//! HTTP request handlers for each endpoint of the memoization service.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use tracing::debug;

use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::functions::FunctionRegistry;
use crate::models::{
    CallRequest, CallResponse, ClearResponse, HealthResponse, StatsOverviewResponse,
    StatsResponse,
};

/// Application state shared across all handlers.
///
/// The registry owns one cache per function; each cache does its own locking.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<FunctionRegistry>,
}

impl AppState {
    /// Creates a new AppState around the given registry.
    pub fn new(registry: FunctionRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Creates the built-in registry with cache settings from the Config.
    pub fn from_config(config: &Config) -> Self {
        Self::new(FunctionRegistry::builtin(config.cache_config()))
    }
}

/// Handler for POST /call/:function
///
/// Calls a registered function through its cache.
pub async fn call_handler(
    State(state): State<AppState>,
    Path(function): Path<String>,
    body: std::result::Result<Json<CallRequest>, JsonRejection>,
) -> Result<Json<CallResponse>> {
    let memoized = state.registry.get(&function)?;

    let Json(req) = body.map_err(|e| CacheError::InvalidRequest(e.body_text()))?;
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let result = memoized.invoke(req.into_call_args()).await?;
    debug!(function = %function, "call served");

    Ok(Json(CallResponse::new(function, result)))
}

/// Handler for GET /stats
///
/// Returns statistics for every function cache.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsOverviewResponse> {
    let functions = state
        .registry
        .iter()
        .map(|memoized| (memoized.name().to_string(), memoized.stats().into()))
        .collect();

    Json(StatsOverviewResponse { functions })
}

/// Handler for GET /stats/:function
pub async fn function_stats_handler(
    State(state): State<AppState>,
    Path(function): Path<String>,
) -> Result<Json<StatsResponse>> {
    let memoized = state.registry.get(&function)?;
    Ok(Json(memoized.stats().into()))
}

/// Handler for DELETE /cache/:function
///
/// Clears one function's cache and statistics.
pub async fn clear_handler(
    State(state): State<AppState>,
    Path(function): Path<String>,
) -> Result<Json<ClearResponse>> {
    state.registry.get(&function)?.clear();
    Ok(Json(ClearResponse::new(function)))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
