//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing HTTP response bodies.

use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::{CacheStats, Content, EntrySnapshot, LoadState, MediaKey, MediaKind};
use crate::error::MediaError;
use crate::media::Playback;

fn display_time(timestamp_us: u64) -> String {
    DateTime::<Utc>::from_timestamp_micros(timestamp_us as i64)
        .map(|time| time.to_rfc3339())
        .unwrap_or_default()
}

/// Response body for GET /state, PUT /load and POST /retry
#[derive(Debug, Clone, Serialize)]
pub struct StateResponse {
    pub key: MediaKey,
    /// `idle`, `loading`, `loaded` or `failed`
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<MediaError>,
}

impl StateResponse {
    pub fn new(key: MediaKey, state: &LoadState) -> Self {
        Self {
            key,
            state: state.label(),
            error: state.error().cloned(),
        }
    }
}

/// Response body for GET /content: metadata of the loaded payload
#[derive(Debug, Clone, Serialize)]
pub struct ContentResponse {
    pub key: MediaKey,
    pub kind: MediaKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Dimensions of the encoded source before downsampling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_height: Option<u32>,
    /// Decoded bitmap size in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playback: Option<Playback>,
}

impl ContentResponse {
    pub fn new(key: MediaKey, content: &Content) -> Self {
        let mut response = Self {
            key,
            kind: content.kind(),
            width: None,
            height: None,
            source_width: None,
            source_height: None,
            bytes: None,
            playback: None,
        };

        match content {
            Content::Image(image) => {
                let (source_width, source_height) = image.source_dimensions();
                response.width = Some(image.width());
                response.height = Some(image.height());
                response.source_width = Some(source_width);
                response.source_height = Some(source_height);
                response.bytes = Some(image.byte_len());
            }
            Content::Video(session) => response.playback = Some(session.playback()),
        }
        response
    }
}

/// Response body for GET /entries
#[derive(Debug, Clone, Serialize)]
pub struct EntryResponse {
    pub key: MediaKey,
    pub kind: MediaKind,
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<MediaError>,
    /// Last access in ISO 8601 format
    pub last_access: String,
    pub waiting_for_slot: bool,
}

impl From<EntrySnapshot> for EntryResponse {
    fn from(entry: EntrySnapshot) -> Self {
        Self {
            last_access: display_time(entry.last_access),
            key: entry.key,
            kind: entry.kind,
            state: entry.state,
            error: entry.error,
            waiting_for_slot: entry.waiting_for_slot,
        }
    }
}

/// Response body for POST /preload and POST /preload-window
#[derive(Debug, Clone, Serialize)]
pub struct PreloadResponse {
    /// Items considered
    pub requested: usize,
    /// Closed index range of the window, when one was computed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<[usize; 2]>,
}

impl PreloadResponse {
    pub fn new(requested: usize, window: Option<RangeInclusive<usize>>) -> Self {
        Self {
            requested,
            window: window.map(|range| [*range.start(), *range.end()]),
        }
    }
}

/// Response body for POST /evict
#[derive(Debug, Clone, Serialize)]
pub struct EvictResponse {
    pub message: String,
    pub evicted: Vec<MediaKey>,
}

impl EvictResponse {
    pub fn new(evicted: Vec<MediaKey>) -> Self {
        Self {
            message: format!("{} entries evicted", evicted.len()),
            evicted,
        }
    }
}

/// Response body for POST /memory-pressure
#[derive(Debug, Clone, Serialize)]
pub struct PressureResponse {
    pub message: String,
    /// False once the sweep task has stopped
    pub queued: bool,
}

impl PressureResponse {
    pub fn new(queued: bool) -> Self {
        let message = if queued {
            "Eviction sweep queued"
        } else {
            "Eviction task is not running"
        };
        Self {
            message: message.to_string(),
            queued,
        }
    }
}

/// Response body for POST /clear
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
    /// Entries dropped
    pub cleared: usize,
}

impl ClearResponse {
    pub fn new(cleared: usize) -> Self {
        Self {
            message: "Cache cleared".to_string(),
            cleared,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: CacheStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            stats,
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
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_support::{decoded_image, video_content};

    #[test]
    fn test_state_response_carries_error() {
        let state = LoadState::Failed(MediaError::BadResponse(404));
        let json = serde_json::to_value(StateResponse::new("https://cdn.test/a".into(), &state))
            .unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["error"]["kind"], "bad_response");

        let json = serde_json::to_value(StateResponse::new(
            "https://cdn.test/a".into(),
            &LoadState::Idle,
        ))
        .unwrap();
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_content_response_image_and_video() {
        let image = ContentResponse::new("k".into(), &Content::Image(decoded_image()));
        assert_eq!(image.kind, MediaKind::Image);
        assert_eq!(image.width, Some(4));
        assert!(image.playback.is_none());

        let (video, _) = video_content();
        let video = ContentResponse::new("k".into(), &video);
        assert_eq!(video.playback, Some(Playback::Paused));
        assert!(video.width.is_none());
    }

    #[test]
    fn test_stats_response_flattens() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_miss();
        let json = serde_json::to_value(StatsResponse::from(stats)).unwrap();
        assert_eq!(json["hits"], 1);
        assert_eq!(json["hit_rate"], 0.5);
    }

    #[test]
    fn test_entry_response_formats_time() {
        let entry = EntrySnapshot {
            key: "k".into(),
            kind: MediaKind::Image,
            state: "loaded",
            error: None,
            last_access: 1_700_000_000_000_000,
            waiting_for_slot: false,
        };
        let response = EntryResponse::from(entry);
        assert!(response.last_access.starts_with("2023-11-14T22:13:20"));
    }

    #[test]
    fn test_preload_response_window() {
        let json = serde_json::to_value(PreloadResponse::new(8, Some(8..=15))).unwrap();
        assert_eq!(json["window"], serde_json::json!([8, 15]));
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }
}
