//! API Module
//!
//! HTTP handlers and routing for the memoization service.
//!
//! # Endpoints
//! - `POST /call/:function` - Call a function through its cache
//! - `GET /stats` - Statistics of every function cache
//! - `GET /stats/:function` - Statistics of one function cache
//! - `DELETE /cache/:function` - Clear one function cache
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
