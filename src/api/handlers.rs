//! API Handlers
//!
//! HTTP request handlers for each admin endpoint.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use tokio::task::JoinHandle;

use crate::cache::{LoadPriority, MediaCache, MediaKind, WindowSpec};
use crate::error::{ApiError, Result};
use crate::models::{
    ClearResponse, ContentResponse, EntryResponse, EvictResponse, HealthResponse, KeyRequest,
    LoadRequest, PreloadRequest, PreloadResponse, PreloadWindowRequest, PressureResponse,
    StateResponse, StatsResponse,
};
use crate::tasks::{spawn_pressure_task, MemoryPressure, MemoryPressureMonitor};

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Shared media cache handle
    pub cache: MediaCache,
    /// Queues eviction sweeps
    pub pressure: MemoryPressureMonitor,
}

impl AppState {
    /// Creates a new AppState from a cache and a pressure monitor.
    pub fn new(cache: MediaCache, pressure: MemoryPressureMonitor) -> Self {
        Self { cache, pressure }
    }

    /// Creates the state and starts the memory-pressure task for `cache`.
    pub fn with_pressure_task(cache: MediaCache) -> (Self, JoinHandle<()>) {
        let (pressure, rx) = MemoryPressureMonitor::channel();
        let handle = spawn_pressure_task(cache.clone(), rx);
        (Self::new(cache, pressure), handle)
    }
}

fn check(problem: Option<String>) -> Result<()> {
    match problem {
        Some(message) => Err(ApiError::InvalidRequest(message)),
        None => Ok(()),
    }
}

/// Handler for GET /state?key=
///
/// Pure read; unknown keys report `idle`.
pub async fn state_handler(
    State(state): State<AppState>,
    Query(req): Query<KeyRequest>,
) -> Result<Json<StateResponse>> {
    check(req.validate())?;
    let key = req.media_key();
    let current = state.cache.state(&key).await;

    Ok(Json(StateResponse::new(key, &current)))
}

/// Handler for GET /content?key=
///
/// Describes the loaded payload and refreshes its last access.
pub async fn content_handler(
    State(state): State<AppState>,
    Query(req): Query<KeyRequest>,
) -> Result<Json<ContentResponse>> {
    check(req.validate())?;
    let key = req.media_key();
    let content = state
        .cache
        .content(&key)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("No content loaded for '{}'", key)))?;

    Ok(Json(ContentResponse::new(key, &content)))
}

/// Handler for PUT /load
///
/// Starts a load and reports the state right after dispatch.
pub async fn load_handler(
    State(state): State<AppState>,
    Json(req): Json<LoadRequest>,
) -> Result<Json<StateResponse>> {
    check(req.validate())?;
    let key = req.media_key();
    state.cache.load(&key, req.kind, req.priority).await;
    let current = state.cache.state(&key).await;

    Ok(Json(StateResponse::new(key, &current)))
}

/// Handler for POST /preload
pub async fn preload_handler(
    State(state): State<AppState>,
    Json(req): Json<PreloadRequest>,
) -> Result<Json<PreloadResponse>> {
    check(req.validate())?;
    let requested = req.items.len();
    let requests = req.items.iter().map(|item| (item.key(), item.kind()));
    state.cache.preload(requests, req.priority).await;

    Ok(Json(PreloadResponse::new(requested, None)))
}

/// Handler for POST /preload-window
///
/// An explicit `lookahead` uses the default back-window of two items.
/// Otherwise the configured window for `kind` is used, or both configured
/// windows when no kind is given (the image window is reported).
pub async fn preload_window_handler(
    State(state): State<AppState>,
    Json(req): Json<PreloadWindowRequest>,
) -> Result<Json<PreloadResponse>> {
    check(req.validate())?;
    let cache = &state.cache;
    let config = cache.config();
    let index = req.current_index;

    let window = match (req.lookahead, req.kind) {
        (Some(lookahead), kind) => cache.preload_window(index, &req.items, lookahead, kind).await,
        (None, Some(kind)) => {
            let spec = match kind {
                MediaKind::Image => WindowSpec::images(config),
                MediaKind::Video => WindowSpec::videos(config),
            };
            cache
                .preload_window_with(spec, index, &req.items, LoadPriority::Low)
                .await
        }
        (None, None) => {
            cache.preload_around(index, &req.items).await;
            WindowSpec::images(config).range(index, req.items.len())
        }
    };

    let requested = window.as_ref().map_or(0, |range| range.clone().count());
    Ok(Json(PreloadResponse::new(requested, window)))
}

/// Handler for POST /retry
///
/// No-op unless the key's last load failed.
pub async fn retry_handler(
    State(state): State<AppState>,
    Json(req): Json<KeyRequest>,
) -> Result<Json<StateResponse>> {
    check(req.validate())?;
    let key = req.media_key();
    state.cache.retry_failed(&key).await;
    let current = state.cache.state(&key).await;

    Ok(Json(StateResponse::new(key, &current)))
}

/// Handler for POST /evict
pub async fn evict_handler(
    State(state): State<AppState>,
    Json(req): Json<KeyRequest>,
) -> Result<Json<EvictResponse>> {
    check(req.validate())?;
    let key = req.media_key();
    if !state.cache.evict(&key).await {
        return Err(ApiError::NotFound(format!("Key '{}' not cached", key)));
    }

    Ok(Json(EvictResponse::new(vec![key])))
}

/// Handler for POST /clear
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    let cleared = state.cache.clear().await;
    Json(ClearResponse::new(cleared))
}

/// Handler for POST /memory-pressure
///
/// Queues a sweep on the memory-pressure task.
pub async fn memory_pressure_handler(
    State(state): State<AppState>,
) -> (StatusCode, Json<PressureResponse>) {
    let queued = state.pressure.notify(MemoryPressure::Http);
    let status = if queued {
        StatusCode::ACCEPTED
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(PressureResponse::new(queued)))
}

/// Handler for GET /entries
pub async fn entries_handler(State(state): State<AppState>) -> Json<Vec<EntryResponse>> {
    let entries = state.cache.snapshot().await;
    Json(entries.into_iter().map(EntryResponse::from).collect())
}

/// Handler for GET /stats
///
/// Returns current cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.cache.stats().await))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
