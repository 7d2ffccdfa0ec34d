//! Eviction Module
//!
//! Victim selection for the memory-pressure sweep.

use crate::cache::{CacheEntry, MediaKey, MediaKind};

/// Number of victims a sweep takes out of `candidates` loaded images.
///
/// `ceil(candidates * fraction)`, at least one when there is any candidate,
/// never more than `candidates`.
pub fn victim_count(candidates: usize, fraction: f64) -> usize {
    if candidates == 0 {
        return 0;
    }
    let wanted = (candidates as f64 * fraction).ceil() as usize;
    wanted.clamp(1, candidates)
}

/// Picks the least recently accessed loaded images.
///
/// Videos and entries that are not `Loaded` are never selected. Victims are
/// returned oldest first.
pub fn select_victims<'a, I>(entries: I, fraction: f64) -> Vec<MediaKey>
where
    I: IntoIterator<Item = &'a CacheEntry>,
{
    let mut candidates: Vec<(u64, &MediaKey)> = entries
        .into_iter()
        .filter(|e| e.kind == MediaKind::Image && e.state.is_loaded())
        .map(|e| (e.last_access, &e.key))
        .collect();

    candidates.sort();

    let count = victim_count(candidates.len(), fraction);
    candidates
        .into_iter()
        .take(count)
        .map(|(_, key)| key.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_support::{image_content, image_key, video_content, video_key};
    use crate::cache::LoadState;
    use crate::error::MediaError;

    fn entry(key: MediaKey, kind: MediaKind, state: LoadState, last_access: u64) -> CacheEntry {
        let mut entry = CacheEntry::new(key, kind, last_access);
        entry.state = state;
        entry
    }

    fn loaded_image(name: &str, last_access: u64) -> CacheEntry {
        entry(
            image_key(name),
            MediaKind::Image,
            LoadState::Loaded(image_content()),
            last_access,
        )
    }

    #[test]
    fn test_victim_count() {
        assert_eq!(victim_count(0, 0.5), 0);
        assert_eq!(victim_count(1, 0.5), 1);
        assert_eq!(victim_count(3, 0.5), 2);
        assert_eq!(victim_count(10, 0.5), 5);
        assert_eq!(victim_count(10, 0.01), 1);
        assert_eq!(victim_count(10, 1.0), 10);
    }

    #[test]
    fn test_selects_oldest_half() {
        let entries: Vec<CacheEntry> = [5, 1, 9, 3, 7, 2]
            .iter()
            .map(|t| loaded_image(&t.to_string(), *t))
            .collect();

        let victims = select_victims(&entries, 0.5);

        assert_eq!(victims, vec![image_key("1"), image_key("2"), image_key("3")]);
    }

    #[test]
    fn test_single_loaded_image_is_evicted() {
        let entries = vec![loaded_image("only", 10)];
        assert_eq!(select_victims(&entries, 0.5), vec![image_key("only")]);
    }

    #[test]
    fn test_videos_are_never_selected() {
        let (video, _) = video_content();
        let entries = vec![
            entry(video_key("old"), MediaKind::Video, LoadState::Loaded(video), 0),
            loaded_image("a", 5),
            loaded_image("b", 6),
        ];

        let victims = select_victims(&entries, 1.0);

        assert_eq!(victims, vec![image_key("a"), image_key("b")]);
    }

    #[test]
    fn test_non_loaded_images_are_never_selected() {
        let entries = vec![
            entry(image_key("loading"), MediaKind::Image, LoadState::Loading, 1),
            entry(
                image_key("failed"),
                MediaKind::Image,
                LoadState::Failed(MediaError::BadResponse(500)),
                2,
            ),
            entry(image_key("idle"), MediaKind::Image, LoadState::Idle, 3),
        ];

        assert!(select_victims(&entries, 1.0).is_empty());
    }
}
