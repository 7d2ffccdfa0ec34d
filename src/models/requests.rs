//! Request DTOs for the admin API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::Deserialize;

use crate::cache::{LoadPriority, MediaKey, MediaKind};
use crate::feed::MediaDescriptor;

/// Maximum accepted key length in bytes
const MAX_KEY_LENGTH: usize = 2048;

fn validate_key(key: &str) -> Option<String> {
    if key.is_empty() {
        return Some("Key cannot be empty".to_string());
    }
    if key.len() > MAX_KEY_LENGTH {
        return Some(format!(
            "Key exceeds maximum length of {} characters",
            MAX_KEY_LENGTH
        ));
    }
    None
}

fn default_kind() -> MediaKind {
    MediaKind::Image
}

/// Query string or body naming a single key
/// (`GET /state`, `GET /content`, `POST /retry`, `POST /evict`)
#[derive(Debug, Clone, Deserialize)]
pub struct KeyRequest {
    /// Content URL of the entry
    pub key: String,
}

impl KeyRequest {
    pub fn validate(&self) -> Option<String> {
        validate_key(&self.key)
    }

    pub fn media_key(&self) -> MediaKey {
        MediaKey::new(self.key.clone())
    }
}

/// Request body for PUT /load
#[derive(Debug, Clone, Deserialize)]
pub struct LoadRequest {
    /// Content URL to load
    pub key: String,
    /// Load path; images when omitted
    #[serde(default = "default_kind")]
    pub kind: MediaKind,
    #[serde(default)]
    pub priority: LoadPriority,
}

impl LoadRequest {
    pub fn validate(&self) -> Option<String> {
        validate_key(&self.key)
    }

    pub fn media_key(&self) -> MediaKey {
        MediaKey::new(self.key.clone())
    }
}

/// Request body for POST /preload
#[derive(Debug, Clone, Deserialize)]
pub struct PreloadRequest {
    pub items: Vec<MediaDescriptor>,
    #[serde(default)]
    pub priority: LoadPriority,
}

impl PreloadRequest {
    pub fn validate(&self) -> Option<String> {
        self.items.iter().find_map(|item| validate_key(&item.url))
    }
}

/// Request body for POST /preload-window
///
/// Without `lookahead`, both configured windows (images and videos) are
/// warmed around `current_index`.
#[derive(Debug, Clone, Deserialize)]
pub struct PreloadWindowRequest {
    /// Flat feed, all loaded pages concatenated
    pub items: Vec<MediaDescriptor>,
    /// Index of the item on screen
    pub current_index: usize,
    #[serde(default)]
    pub lookahead: Option<usize>,
    /// Restrict the window to one kind
    #[serde(default)]
    pub kind: Option<MediaKind>,
}

impl PreloadWindowRequest {
    pub fn validate(&self) -> Option<String> {
        self.items.iter().find_map(|item| validate_key(&item.url))
    }
}
