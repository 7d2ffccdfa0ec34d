//! API Module
//!
//! HTTP handlers and routing for the cache admin REST API.
//!
//! # Endpoints
//! - `GET /state`, `GET /content` - Per-key reads
//! - `PUT /load`, `POST /preload`, `POST /preload-window`, `POST /retry` - Loading
//! - `POST /evict`, `POST /clear`, `POST /memory-pressure` - Removal
//! - `GET /entries`, `GET /stats`, `GET /health` - Introspection

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
