//! Feed Module
//!
//! The only shape the cache consumes from the content lister: a flat,
//! ordered sequence of media descriptors (all loaded pages concatenated).

use serde::{Deserialize, Serialize};

use crate::cache::{MediaKey, MediaKind};

// == Media Descriptor ==
/// One feed item as listed by the content service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    /// Listing identifier (not used as cache key)
    pub id: String,
    /// Resolved content URL
    pub url: String,
    /// Whether the item plays as a video
    #[serde(default)]
    pub is_video: bool,
}

impl MediaDescriptor {
    pub fn image(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            is_video: false,
        }
    }

    pub fn video(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            is_video: true,
        }
    }

    /// Cache key: the content URL itself.
    pub fn key(&self) -> MediaKey {
        MediaKey::new(self.url.clone())
    }

    pub fn kind(&self) -> MediaKind {
        if self.is_video {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_deserialize_defaults_to_image() {
        let json = r#"{"id": "42", "url": "https://cdn.test/42.jpg"}"#;
        let item: MediaDescriptor = serde_json::from_str(json).unwrap();

        assert_eq!(item.kind(), MediaKind::Image);
        assert_eq!(item.key().as_str(), "https://cdn.test/42.jpg");
    }

    #[test]
    fn test_descriptor_video_kind() {
        let item = MediaDescriptor::video("7", "https://cdn.test/7.mp4");
        assert_eq!(item.kind(), MediaKind::Video);
    }
}
