//! Cache Module
//!
//! Keyed media cache with a per-key load state machine, bounded video
//! admission and memory-pressure eviction of images.

mod entry;
mod events;
mod eviction;
mod gate;
mod media_cache;
mod stats;
mod store;
mod window;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export public types
pub use entry::{
    current_timestamp_us, AccessClock, CacheEntry, Content, LoadPriority, LoadState, MediaKey,
    MediaKind,
};
pub use events::{CacheEvent, KeySubscription};
pub use eviction::{select_victims, victim_count};
pub use gate::{Admission, ConcurrencyGate, PendingVideoRequest};
pub use media_cache::MediaCache;
pub use stats::CacheStats;
pub use store::{CacheStore, Completion, Dispatch, EntrySnapshot, Removal};
pub use window::WindowSpec;
