//! Configuration Module
//!
//! Handles loading and managing cache and server configuration from
//! environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

// == Cache Config ==
/// Tunables of the media cache itself.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of video loads in progress at once
    pub max_video_slots: usize,
    /// Longest edge of a decoded image, in pixels
    pub max_image_dimension: u32,
    /// Items behind the current position warmed by an image window
    pub image_lookbehind: usize,
    /// Items ahead of the current position warmed by an image window
    pub image_lookahead: usize,
    /// Items ahead of the current position warmed by a video window
    pub video_lookahead: usize,
    /// Share of loaded images removed by one memory-pressure sweep
    pub eviction_fraction: f64,
    /// Deadline for a single network fetch
    pub fetch_timeout: Duration,
    /// Deadline for a video session to report ready
    pub session_ready_timeout: Duration,
    /// Capacity of the state-change broadcast channel
    pub event_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_video_slots: 3,
            max_image_dimension: 600,
            image_lookbehind: 2,
            image_lookahead: 5,
            video_lookahead: 2,
            eviction_fraction: 0.5,
            fetch_timeout: Duration::from_secs(30),
            session_ready_timeout: Duration::from_secs(30),
            event_capacity: 256,
        }
    }
}

impl CacheConfig {
    /// Loads cache tunables from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_VIDEO_SLOTS` - Concurrent video loads (default: 3, min 1)
    /// - `MAX_IMAGE_DIMENSION` - Decode bound in pixels (default: 600, min 1)
    /// - `IMAGE_LOOKBEHIND` / `IMAGE_LOOKAHEAD` - Image window (default: 2 / 5)
    /// - `VIDEO_LOOKAHEAD` - Video window, no look-behind (default: 2)
    /// - `EVICTION_FRACTION` - Sweep fraction in (0, 1] (default: 0.5)
    /// - `FETCH_TIMEOUT_SECS` - Fetch deadline (default: 30)
    /// - `SESSION_READY_TIMEOUT_SECS` - Video readiness deadline (default: 30)
    /// - `EVENT_CAPACITY` - Broadcast buffer (default: 256)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_video_slots: env_or("MAX_VIDEO_SLOTS", defaults.max_video_slots),
            max_image_dimension: env_or("MAX_IMAGE_DIMENSION", defaults.max_image_dimension),
            image_lookbehind: env_or("IMAGE_LOOKBEHIND", defaults.image_lookbehind),
            image_lookahead: env_or("IMAGE_LOOKAHEAD", defaults.image_lookahead),
            video_lookahead: env_or("VIDEO_LOOKAHEAD", defaults.video_lookahead),
            eviction_fraction: env_or("EVICTION_FRACTION", defaults.eviction_fraction),
            fetch_timeout: Duration::from_secs(env_or(
                "FETCH_TIMEOUT_SECS",
                defaults.fetch_timeout.as_secs(),
            )),
            session_ready_timeout: Duration::from_secs(env_or(
                "SESSION_READY_TIMEOUT_SECS",
                defaults.session_ready_timeout.as_secs(),
            )),
            event_capacity: env_or("EVENT_CAPACITY", defaults.event_capacity),
        }
        .normalized()
    }

    /// Clamps values into their usable ranges.
    pub fn normalized(mut self) -> Self {
        self.max_video_slots = self.max_video_slots.max(1);
        self.max_image_dimension = self.max_image_dimension.max(1);
        self.event_capacity = self.event_capacity.max(1);
        if !(self.eviction_fraction > 0.0 && self.eviction_fraction <= 1.0) {
            self.eviction_fraction = Self::default().eviction_fraction;
        }
        self
    }
}

// == Server Config ==
/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cache tunables
    pub cache: CacheConfig,
    /// HTTP admin server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// `SERVER_PORT` selects the admin port (default: 3000); see
    /// [`CacheConfig::from_env`] for the rest.
    pub fn from_env() -> Self {
        Self {
            cache: CacheConfig::from_env(),
            server_port: env_or("SERVER_PORT", 3000),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            server_port: 3000,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.max_video_slots, 3);
        assert_eq!(config.max_image_dimension, 600);
        assert_eq!(config.image_lookbehind, 2);
        assert_eq!(config.image_lookahead, 5);
        assert_eq!(config.eviction_fraction, 0.5);
        assert_eq!(config.fetch_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_normalized_clamps_out_of_range() {
        let config = CacheConfig {
            max_video_slots: 0,
            max_image_dimension: 0,
            eviction_fraction: 1.7,
            event_capacity: 0,
            ..CacheConfig::default()
        }
        .normalized();

        assert_eq!(config.max_video_slots, 1);
        assert_eq!(config.max_image_dimension, 1);
        assert_eq!(config.eviction_fraction, 0.5);
        assert_eq!(config.event_capacity, 1);
    }

    #[test]
    fn test_normalized_keeps_full_sweep() {
        let config = CacheConfig {
            eviction_fraction: 1.0,
            ..CacheConfig::default()
        }
        .normalized();
        assert_eq!(config.eviction_fraction, 1.0);
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("MAX_VIDEO_SLOTS");
        env::remove_var("MAX_IMAGE_DIMENSION");
        env::remove_var("EVICTION_FRACTION");
        env::remove_var("SERVER_PORT");

        let config = Config::from_env();
        assert_eq!(config.cache.max_video_slots, 3);
        assert_eq!(config.cache.max_image_dimension, 600);
        assert_eq!(config.cache.eviction_fraction, 0.5);
        assert_eq!(config.server_port, 3000);
    }
}
