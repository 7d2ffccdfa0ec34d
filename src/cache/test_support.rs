//! Shared fixtures for cache unit tests.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::cache::{Content, MediaKey};
use crate::error::MediaError;
use crate::media::{
    DecodedImage, Downsampler, FetchResponse, Fetcher, MediaSession, PendingSession, Playback,
    PlaybackFlag, SessionFactory,
};

#[derive(Debug, Default)]
pub struct StubSession(pub PlaybackFlag);

impl MediaSession for StubSession {
    fn play(&self) {
        self.0.set(Playback::Playing);
    }
    fn pause(&self) {
        self.0.set(Playback::Paused);
    }
    fn release(&self) {
        self.0.set(Playback::Released);
    }
    fn playback(&self) -> Playback {
        self.0.get()
    }
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    image::DynamicImage::new_rgb8(width, height)
        .write_to(&mut bytes, image::ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

pub fn decoded_image() -> Arc<DecodedImage> {
    Arc::new(Downsampler::new(8).decode_sync(&png(4, 4)).unwrap())
}

/// Answers every fetch with a small PNG.
#[derive(Debug)]
pub struct PngFetcher;

#[async_trait]
impl Fetcher for PngFetcher {
    async fn fetch(&self, _url: &Url) -> Result<FetchResponse, MediaError> {
        Ok(FetchResponse::ok(png(8, 8)))
    }
}

/// Sessions that fail immediately.
#[derive(Debug)]
pub struct NoSessions;

impl SessionFactory for NoSessions {
    fn create(&self, _url: &Url) -> PendingSession {
        let (pending, tx) = PendingSession::new(Arc::new(StubSession::default()));
        let _ = tx.send(Err(MediaError::SessionFailure("no player".into())));
        pending
    }
}

pub fn image_content() -> Content {
    Content::Image(decoded_image())
}

pub fn video_content() -> (Content, Arc<StubSession>) {
    let session = Arc::new(StubSession::default());
    (Content::Video(session.clone()), session)
}

pub fn image_key(name: &str) -> MediaKey {
    MediaKey::from(format!("https://cdn.test/img/{name}.jpg"))
}

pub fn video_key(name: &str) -> MediaKey {
    MediaKey::from(format!("https://cdn.test/vid/{name}.mp4"))
}
