//! Media Module
//!
//! Load paths behind the cache: network fetch and downsampled decode for
//! images, session creation for videos.

mod downsample;
mod fetch;
mod session;

pub use downsample::{target_dimensions, DecodedImage, Downsampler};
pub use fetch::{FetchResponse, Fetcher, HttpFetcher};
pub use session::{
    is_playable_content_type, HttpProbeSession, HttpProbeSessionFactory, MediaSession,
    PendingSession, Playback, PlaybackFlag, Readiness, SessionFactory,
};
