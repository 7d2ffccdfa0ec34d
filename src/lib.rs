//! Feed Media Cache - media acquisition layer for scrolling feeds
//!
//! Keyed cache of downsampled images and ready-to-play video sessions, with
//! bounded video admission, preload windows and memory-pressure eviction.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod feed;
pub mod media;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{LoadPriority, LoadState, MediaCache, MediaKey, MediaKind};
pub use config::{CacheConfig, Config};
pub use error::MediaError;
pub use feed::MediaDescriptor;
pub use tasks::{spawn_pressure_task, MemoryPressure, MemoryPressureMonitor};
