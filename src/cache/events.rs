//! Cache Events Module
//!
//! Change notifications for observers: per-key state changes plus bulk
//! eviction and clear events.

use tokio::sync::broadcast;
use tracing::warn;

use crate::cache::{LoadState, MediaCache, MediaKey};

// == Cache Event ==
#[derive(Debug, Clone)]
pub enum CacheEvent {
    /// A key moved to a new state
    StateChanged { key: MediaKey, state: LoadState },
    /// Entries removed in one sweep or explicit eviction; each key also got
    /// its own `StateChanged` to `Idle`
    Evicted { keys: Vec<MediaKey> },
    /// Every entry was dropped
    Cleared,
}

// == Key Subscription ==
/// Observes the state of one key.
#[derive(Debug)]
pub struct KeySubscription {
    key: MediaKey,
    cache: MediaCache,
    rx: broadcast::Receiver<CacheEvent>,
}

impl KeySubscription {
    pub(crate) fn new(key: MediaKey, cache: MediaCache, rx: broadcast::Receiver<CacheEvent>) -> Self {
        Self { key, cache, rx }
    }

    pub fn key(&self) -> &MediaKey {
        &self.key
    }

    /// Waits for the key's next state.
    ///
    /// After falling behind the channel, yields the current state read from
    /// the cache instead of the missed sequence. Returns `None` if the event
    /// channel closes.
    pub async fn changed(&mut self) -> Option<LoadState> {
        loop {
            match self.rx.recv().await {
                Ok(CacheEvent::StateChanged { key, state }) if key == self.key => {
                    return Some(state)
                }
                Ok(CacheEvent::Cleared) => return Some(LoadState::Idle),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Subscription for {} lagged by {} events", self.key, missed);
                    return Some(self.cache.state(&self.key).await);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
