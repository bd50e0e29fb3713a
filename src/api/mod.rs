//! API Module
//!
//! HTTP handlers and routing for the offline-first proxy.
//!
//! # Endpoints
//! - `ANY /api/*path` - Forward upstream (GETs cached, writes queued offline)
//! - `GET /stats` - Cache statistics, queue depth and connectivity
//! - `POST /sync` - Replay the offline queue now
//! - `GET /queue` - List pending operations
//! - `DELETE /cache`, `DELETE /cache/:key`, `DELETE /cache/prefix/:prefix`
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
