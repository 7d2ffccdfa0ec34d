//! API Routes
//!
//! Configures the Axum router with all admin endpoints.

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, content_handler, entries_handler, evict_handler, health_handler, load_handler,
    memory_pressure_handler, preload_handler, preload_window_handler, retry_handler,
    state_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /state?key=` - Load state of a key
/// - `GET /content?key=` - Metadata of loaded content
/// - `PUT /load` - Start loading a key
/// - `POST /preload` - Load a batch of feed items
/// - `POST /preload-window` - Warm the window around a feed position
/// - `POST /retry` - Reload a failed key
/// - `POST /evict` - Drop one key
/// - `POST /clear` - Drop everything
/// - `POST /memory-pressure` - Queue an eviction sweep
/// - `GET /entries` - Per-entry summary
/// - `GET /stats` - Cache statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/state", get(state_handler))
        .route("/content", get(content_handler))
        .route("/load", put(load_handler))
        .route("/preload", post(preload_handler))
        .route("/preload-window", post(preload_window_handler))
        .route("/retry", post(retry_handler))
        .route("/evict", post(evict_handler))
        .route("/clear", post(clear_handler))
        .route("/memory-pressure", post(memory_pressure_handler))
        .route("/entries", get(entries_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
