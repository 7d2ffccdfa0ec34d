//! Video Session Module
//!
//! Video content is an opaque playable session. The cache only sees the
//! [`MediaSession`] capability and a one-shot readiness signal; the concrete
//! player lives behind [`SessionFactory`].

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::debug;
use url::Url;

use crate::error::MediaError;

// == Playback ==
/// Observable playback state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Playback {
    Paused,
    Playing,
    Released,
}

impl Playback {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Playback::Playing,
            2 => Playback::Released,
            _ => Playback::Paused,
        }
    }
}

// == Media Session ==
/// Capability interface of a playable video handle.
pub trait MediaSession: Send + Sync + fmt::Debug {
    fn play(&self);
    fn pause(&self);
    /// Frees the underlying player. Idempotent.
    fn release(&self);
    fn playback(&self) -> Playback;
}

/// Readiness outcome delivered once by a session.
pub type Readiness = Result<(), MediaError>;

// == Pending Session ==
/// A freshly created session plus its one-shot readiness signal.
#[derive(Debug)]
pub struct PendingSession {
    pub session: Arc<dyn MediaSession>,
    pub ready: oneshot::Receiver<Readiness>,
}

impl PendingSession {
    /// Pairs a session with a new readiness channel, returning the sender the
    /// player uses to report ready or failed.
    pub fn new(session: Arc<dyn MediaSession>) -> (Self, oneshot::Sender<Readiness>) {
        let (tx, ready) = oneshot::channel();
        (Self { session, ready }, tx)
    }
}

// == Session Factory ==
/// Creates sessions for video URLs.
pub trait SessionFactory: Send + Sync + 'static {
    fn create(&self, url: &Url) -> PendingSession;
}

// == Playback Flag ==
/// Lock-free playback state shared by session implementations.
#[derive(Debug, Default)]
pub struct PlaybackFlag(AtomicU8);

impl PlaybackFlag {
    pub fn get(&self) -> Playback {
        Playback::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves to `next` unless already released.
    pub fn set(&self, next: Playback) {
        let value = match next {
            Playback::Paused => 0,
            Playback::Playing => 1,
            Playback::Released => 2,
        };
        let _ = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current != 2).then_some(value)
            });
    }
}

// == HTTP Probe Session ==
/// Headless session: ready once the stream URL answers with a playable
/// content type.
#[derive(Debug)]
pub struct HttpProbeSession {
    url: Url,
    playback: PlaybackFlag,
    probe: Mutex<Option<AbortHandle>>,
}

impl HttpProbeSession {
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl MediaSession for HttpProbeSession {
    fn play(&self) {
        self.playback.set(Playback::Playing);
    }

    fn pause(&self) {
        self.playback.set(Playback::Paused);
    }

    fn release(&self) {
        self.playback.set(Playback::Released);
        if let Ok(mut probe) = self.probe.lock() {
            if let Some(handle) = probe.take() {
                handle.abort();
            }
        }
    }

    fn playback(&self) -> Playback {
        self.playback.get()
    }
}

/// Creates [`HttpProbeSession`]s. Must be used inside a tokio runtime.
#[derive(Debug, Clone)]
pub struct HttpProbeSessionFactory {
    client: reqwest::Client,
}

impl HttpProbeSessionFactory {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl SessionFactory for HttpProbeSessionFactory {
    fn create(&self, url: &Url) -> PendingSession {
        let session = Arc::new(HttpProbeSession {
            url: url.clone(),
            playback: PlaybackFlag::default(),
            probe: Mutex::new(None),
        });
        let (pending, ready) = PendingSession::new(session.clone());

        let client = self.client.clone();
        let target = url.clone();
        let task = tokio::spawn(async move {
            let outcome = probe(&client, &target).await;
            debug!("Session probe for {} finished: {:?}", target, outcome);
            let _ = ready.send(outcome);
        });

        if let Ok(mut slot) = session.probe.lock() {
            *slot = Some(task.abort_handle());
        }

        pending
    }
}

async fn probe(client: &reqwest::Client, url: &Url) -> Readiness {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| MediaError::SessionFailure(e.to_string()))?;

    if !response.status().is_success() {
        return Err(MediaError::SessionFailure(format!(
            "stream answered {}",
            response.status().as_u16()
        )));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if is_playable_content_type(&content_type) {
        Ok(())
    } else {
        Err(MediaError::SessionFailure(format!(
            "unsupported format: {}",
            if content_type.is_empty() { "unknown" } else { &content_type }
        )))
    }
}

/// Returns true for progressive video and streaming manifest types.
pub fn is_playable_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    essence.starts_with("video/")
        || matches!(
            essence.as_str(),
            "application/vnd.apple.mpegurl" | "application/x-mpegurl" | "application/dash+xml"
        )
}
