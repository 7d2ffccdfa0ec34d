//! Cache Entry Module
//!
//! Per-key record and the load state machine:
//! `Idle -> Loading -> {Loaded | Failed}`, `Failed -> Loading` on explicit
//! retry, `Loaded -> Idle` by removal on eviction.

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::MediaError;
use crate::media::{DecodedImage, MediaSession};

// == Media Key ==
/// Resolved content URL identifying one cached resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaKey(String);

impl MediaKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the key as a URL, failing with `InvalidKey`.
    pub fn to_url(&self) -> Result<Url, MediaError> {
        Url::parse(&self.0).map_err(|e| MediaError::InvalidKey(format!("{}: {}", self.0, e)))
    }
}

impl fmt::Display for MediaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MediaKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for MediaKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

// == Media Kind ==
/// Selects the load path. Fixed for the lifetime of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

// == Load Priority ==
/// Caller hint carried with a request. The video queue stays strictly FIFO
/// regardless of priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadPriority {
    Low,
    #[default]
    Normal,
    High,
}

// == Content ==
/// Loaded payload of an entry.
///
/// Equality is handle identity: two `Content`s are equal only when they point
/// at the same bitmap or session.
#[derive(Debug, Clone)]
pub enum Content {
    Image(Arc<DecodedImage>),
    Video(Arc<dyn MediaSession>),
}

impl Content {
    pub fn kind(&self) -> MediaKind {
        match self {
            Content::Image(_) => MediaKind::Image,
            Content::Video(_) => MediaKind::Video,
        }
    }

    pub fn as_image(&self) -> Option<&Arc<DecodedImage>> {
        match self {
            Content::Image(image) => Some(image),
            Content::Video(_) => None,
        }
    }

    pub fn as_session(&self) -> Option<&Arc<dyn MediaSession>> {
        match self {
            Content::Video(session) => Some(session),
            Content::Image(_) => None,
        }
    }

    /// Releases the player behind a video; no-op for images.
    pub fn release(&self) {
        if let Content::Video(session) = self {
            session.release();
        }
    }
}

impl PartialEq for Content {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Content::Image(a), Content::Image(b)) => Arc::ptr_eq(a, b),
            (Content::Video(a), Content::Video(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            _ => false,
        }
    }
}

// == Load State ==
/// Exactly one of these holds for every key at any instant.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Loaded(Content),
    Failed(MediaError),
}

impl LoadState {
    pub fn label(&self) -> &'static str {
        match self {
            LoadState::Idle => "idle",
            LoadState::Loading => "loading",
            LoadState::Loaded(_) => "loaded",
            LoadState::Failed(_) => "failed",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, LoadState::Idle)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadState::Loaded(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, LoadState::Failed(_))
    }

    pub fn content(&self) -> Option<&Content> {
        match self {
            LoadState::Loaded(content) => Some(content),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&MediaError> {
        match self {
            LoadState::Failed(error) => Some(error),
            _ => None,
        }
    }
}

// == In-Flight Task ==
/// Handle on the single running load of a key.
#[derive(Debug, Clone)]
pub(crate) struct InFlight {
    /// Cancels the task cooperatively
    pub token: CancellationToken,
    /// Identifies the task; results from any other generation are stale
    pub generation: u64,
}

// == Cache Entry ==
/// Per-key record owned by the cache store.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: MediaKey,
    pub kind: MediaKind,
    pub state: LoadState,
    /// Access clock reading (Unix microseconds, strictly increasing)
    pub last_access: u64,
    pub(crate) in_flight: Option<InFlight>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an `Idle` entry.
    pub fn new(key: MediaKey, kind: MediaKind, now: u64) -> Self {
        Self {
            key,
            kind,
            state: LoadState::Idle,
            last_access: now,
            in_flight: None,
        }
    }

    pub fn content(&self) -> Option<&Content> {
        self.state.content()
    }

    pub fn has_task(&self) -> bool {
        self.in_flight.is_some()
    }

    /// True for a video parked in the admission queue: loading, no task yet.
    pub fn is_waiting(&self) -> bool {
        self.state.is_loading() && self.in_flight.is_none()
    }

    /// Cancels and forgets the in-flight task, if any.
    pub(crate) fn cancel_task(&mut self) -> Option<InFlight> {
        let task = self.in_flight.take();
        if let Some(task) = &task {
            task.token.cancel();
        }
        task
    }
}

// == Access Clock ==
/// Timestamp source for `last_access`.
///
/// Readings are Unix microseconds, bumped when needed so that no two
/// readings are equal and eviction order is total.
#[derive(Debug, Default)]
pub struct AccessClock {
    last: u64,
}

impl AccessClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self) -> u64 {
        self.last = current_timestamp_us().max(self.last + 1);
        self.last
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in microseconds.
pub fn current_timestamp_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or_default()
}
