//! Preload Window Module
//!
//! Index arithmetic for warming the items around the scroll position.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::cache::MediaKind;
use crate::config::CacheConfig;
use crate::feed::MediaDescriptor;

// == Window Spec ==
/// Shape of a preload window around the current index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    /// Items behind the current index
    pub behind: usize,
    /// Items ahead of the current index
    pub ahead: usize,
    /// Restrict the window to one kind
    pub kind: Option<MediaKind>,
}

impl WindowSpec {
    /// Default back-window of two items, any kind.
    pub fn around(lookahead: usize) -> Self {
        Self {
            behind: 2,
            ahead: lookahead,
            kind: None,
        }
    }

    /// Image window from configuration.
    pub fn images(config: &CacheConfig) -> Self {
        Self {
            behind: config.image_lookbehind,
            ahead: config.image_lookahead,
            kind: Some(MediaKind::Image),
        }
    }

    /// Video window from configuration: ahead only.
    pub fn videos(config: &CacheConfig) -> Self {
        Self {
            behind: 0,
            ahead: config.video_lookahead,
            kind: Some(MediaKind::Video),
        }
    }

    /// Closed index range `[max(0, i - behind), min(len - 1, i + ahead)]`.
    ///
    /// `None` when `items_len` is zero or the index lies so far past the end
    /// that the range is empty.
    pub fn range(&self, current_index: usize, items_len: usize) -> Option<RangeInclusive<usize>> {
        if items_len == 0 {
            return None;
        }
        let start = current_index.saturating_sub(self.behind);
        let end = current_index.saturating_add(self.ahead).min(items_len - 1);
        (start <= end).then_some(start..=end)
    }

    /// Items of `items` inside the window, filtered by kind.
    pub fn select<'a>(
        &self,
        current_index: usize,
        items: &'a [MediaDescriptor],
    ) -> Vec<&'a MediaDescriptor> {
        let Some(range) = self.range(current_index, items.len()) else {
            return Vec::new();
        };

        items[range]
            .iter()
            .filter(|item| self.kind.map_or(true, |kind| item.kind() == kind))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(len: usize) -> Vec<MediaDescriptor> {
        (0..len)
            .map(|i| {
                let url = format!("https://cdn.test/{i}");
                if i % 3 == 0 {
                    MediaDescriptor::video(i.to_string(), url)
                } else {
                    MediaDescriptor::image(i.to_string(), url)
                }
            })
            .collect()
    }

    #[test]
    fn test_range_middle_of_feed() {
        assert_eq!(WindowSpec::around(5).range(10, 20), Some(8..=15));
    }

    #[test]
    fn test_range_clamps_at_start() {
        assert_eq!(WindowSpec::around(5).range(0, 20), Some(0..=5));
        assert_eq!(WindowSpec::around(5).range(1, 20), Some(0..=6));
    }

    #[test]
    fn test_range_clamps_at_end() {
        assert_eq!(WindowSpec::around(5).range(19, 20), Some(17..=19));
    }

    #[test]
    fn test_range_empty_feed() {
        assert_eq!(WindowSpec::around(5).range(0, 0), None);
    }

    #[test]
    fn test_range_index_past_end() {
        assert_eq!(WindowSpec::around(5).range(21, 20), Some(19..=19));
        assert_eq!(WindowSpec::around(5).range(40, 20), None);
    }

    #[test]
    fn test_video_window_has_no_back_window() {
        let spec = WindowSpec::videos(&CacheConfig::default());
        assert_eq!(spec.range(10, 20), Some(10..=12));
    }

    #[test]
    fn test_select_filters_kind() {
        let items = feed(20);
        let spec = WindowSpec::videos(&CacheConfig::default());

        // 9..=11 -> only index 9 is a video
        let selected = spec.select(9, &items);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, "9");

        let all = WindowSpec::around(5).select(10, &items);
        assert_eq!(all.len(), 8);
    }
}
