//! Media Cache Module
//!
//! Async handle over [`CacheStore`]. Owns the collaborators, runs load tasks
//! on the tokio runtime and feeds their results back into the store.

use std::fmt;
use std::future::Future;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::store::{Dispatch, EntrySnapshot};
use crate::cache::{
    CacheEvent, CacheStats, CacheStore, Content, KeySubscription, LoadPriority, LoadState,
    MediaKey, MediaKind, WindowSpec,
};
use crate::config::CacheConfig;
use crate::error::MediaError;
use crate::feed::MediaDescriptor;
use crate::media::{
    Downsampler, Fetcher, HttpFetcher, HttpProbeSessionFactory, PendingSession, SessionFactory,
};

struct Shared {
    store: RwLock<CacheStore>,
    fetcher: Arc<dyn Fetcher>,
    sessions: Arc<dyn SessionFactory>,
    downsampler: Downsampler,
    config: CacheConfig,
}

// == Media Cache ==
/// Keyed media cache for a scrolling feed.
///
/// Cloning is cheap; every clone drives the same cache.
#[derive(Clone)]
pub struct MediaCache {
    inner: Arc<Shared>,
}

impl fmt::Debug for MediaCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaCache")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl MediaCache {
    // == Constructor ==
    /// Creates a cache over the given fetch and session collaborators.
    pub fn new(
        config: CacheConfig,
        fetcher: Arc<dyn Fetcher>,
        sessions: Arc<dyn SessionFactory>,
    ) -> Self {
        let config = config.normalized();
        let store = CacheStore::new(
            config.max_video_slots,
            config.eviction_fraction,
            config.event_capacity,
        );

        Self {
            inner: Arc::new(Shared {
                store: RwLock::new(store),
                fetcher,
                sessions,
                downsampler: Downsampler::new(config.max_image_dimension),
                config,
            }),
        }
    }

    /// Creates a cache that fetches over HTTP and probes video streams with
    /// the same pooled client.
    pub fn with_http(config: CacheConfig) -> Result<Self, MediaError> {
        let fetcher = HttpFetcher::new(config.fetch_timeout)?;
        let sessions = HttpProbeSessionFactory::new(fetcher.client());
        Ok(Self::new(config, Arc::new(fetcher), Arc::new(sessions)))
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    // == Reads ==
    /// Current state of `key`; `Idle` when unknown.
    pub async fn state(&self, key: &MediaKey) -> LoadState {
        self.inner.store.read().await.state(key)
    }

    /// Loaded content of `key`, refreshing its last access.
    pub async fn content(&self, key: &MediaKey) -> Option<Content> {
        self.inner.store.write().await.content(key)
    }

    pub async fn stats(&self) -> CacheStats {
        self.inner.store.read().await.stats()
    }

    pub async fn snapshot(&self) -> Vec<EntrySnapshot> {
        self.inner.store.read().await.snapshot()
    }

    /// Videos waiting for an admission slot, oldest first.
    pub async fn pending_videos(&self) -> Vec<MediaKey> {
        self.inner.store.read().await.pending_videos()
    }

    // == Load ==
    /// Starts loading `key` unless it is already loading or loaded.
    ///
    /// Concurrent calls for one key share a single task.
    pub async fn load(&self, key: &MediaKey, kind: MediaKind, priority: LoadPriority) {
        let dispatch = self.inner.store.write().await.begin_load(key, kind, priority);
        if let Some(dispatch) = dispatch {
            self.spawn(dispatch);
        }
    }

    /// Loads every idle or failed key; loading and loaded keys are skipped.
    pub async fn preload<I>(&self, requests: I, priority: LoadPriority)
    where
        I: IntoIterator<Item = (MediaKey, MediaKind)>,
    {
        let dispatches: Vec<Dispatch> = {
            let mut store = self.inner.store.write().await;
            requests
                .into_iter()
                .filter_map(|(key, kind)| store.begin_load(&key, kind, priority))
                .collect()
        };

        for dispatch in dispatches {
            self.spawn(dispatch);
        }
    }

    /// Preloads `[current - 2, current + lookahead]` of `items`, optionally
    /// restricted to one kind. Returns the index range that was considered.
    pub async fn preload_window(
        &self,
        current_index: usize,
        items: &[MediaDescriptor],
        lookahead: usize,
        kind: Option<MediaKind>,
    ) -> Option<RangeInclusive<usize>> {
        let spec = WindowSpec {
            kind,
            ..WindowSpec::around(lookahead)
        };
        self.preload_window_with(spec, current_index, items, LoadPriority::Low)
            .await
    }

    pub async fn preload_window_with(
        &self,
        spec: WindowSpec,
        current_index: usize,
        items: &[MediaDescriptor],
        priority: LoadPriority,
    ) -> Option<RangeInclusive<usize>> {
        let range = spec.range(current_index, items.len())?;
        let requests: Vec<(MediaKey, MediaKind)> = spec
            .select(current_index, items)
            .into_iter()
            .map(|item| (item.key(), item.kind()))
            .collect();

        debug!(
            "Preloading {} items in window {:?} around {}",
            requests.len(),
            range,
            current_index
        );
        self.preload(requests, priority).await;
        Some(range)
    }

    /// Warms the configured image and video windows around `current_index`.
    pub async fn preload_around(&self, current_index: usize, items: &[MediaDescriptor]) {
        let config = self.config();
        for spec in [WindowSpec::images(config), WindowSpec::videos(config)] {
            self.preload_window_with(spec, current_index, items, LoadPriority::Low)
                .await;
        }
    }

    /// Reloads `key` if, and only if, its last load failed.
    pub async fn retry_failed(&self, key: &MediaKey) {
        let dispatch = self
            .inner
            .store
            .write()
            .await
            .begin_retry(key, LoadPriority::Normal);
        if let Some(dispatch) = dispatch {
            self.spawn(dispatch);
        }
    }

    // == Removal ==
    /// Drops one entry, cancelling its load and releasing its player.
    /// Returns `false` for unknown keys.
    pub async fn evict(&self, key: &MediaKey) -> bool {
        let removal = self.inner.store.write().await.evict(key);
        let Some(removal) = removal else {
            return false;
        };

        removal.released.iter().for_each(Content::release);
        for dispatch in removal.next {
            self.spawn(dispatch);
        }
        true
    }

    /// Evicts the least recently used half of the loaded images.
    pub async fn handle_memory_pressure(&self) -> Vec<MediaKey> {
        let evicted = self.inner.store.write().await.sweep();
        info!("Memory pressure: evicted {} images", evicted.len());
        evicted
    }

    /// Cancels all work, releases every player and empties the cache.
    /// Returns the number of entries dropped.
    pub async fn clear(&self) -> usize {
        let (dropped, released) = {
            let mut store = self.inner.store.write().await;
            (store.len(), store.clear())
        };
        released.iter().for_each(Content::release);
        dropped
    }

    // == Observation ==
    pub async fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.inner.store.read().await.subscribe()
    }

    /// Observes the state of a single key.
    pub async fn subscribe_key(&self, key: MediaKey) -> KeySubscription {
        let rx = self.subscribe().await;
        KeySubscription::new(key, self.clone(), rx)
    }

    // == Load Tasks ==
    fn spawn(&self, dispatch: Dispatch) {
        debug!(
            "Starting {:?} load of {} (generation {}, {:?})",
            dispatch.kind, dispatch.key, dispatch.generation, dispatch.priority
        );
        let cache = self.clone();
        tokio::spawn(async move { cache.run(dispatch).await });
    }

    async fn run(self, dispatch: Dispatch) {
        let result = match dispatch.kind {
            MediaKind::Image => self.load_image(&dispatch).await,
            MediaKind::Video => self.load_video(&dispatch).await,
        };

        // Whoever cancelled already took the entry and its slot.
        if dispatch.token.is_cancelled() {
            debug!("Dropping result of cancelled load for {}", dispatch.key);
            if let Ok(content) = &result {
                content.release();
            }
            return;
        }

        let completion =
            self.inner
                .store
                .write()
                .await
                .complete(&dispatch.key, dispatch.generation, result);

        if let Some(content) = completion.discarded {
            content.release();
        }
        for next in completion.next {
            self.spawn(next);
        }
    }

    async fn load_image(&self, dispatch: &Dispatch) -> Result<Content, MediaError> {
        let response = guarded(
            &dispatch.token,
            self.inner.config.fetch_timeout,
            self.inner.fetcher.fetch(&dispatch.url),
        )
        .await?;

        if !response.is_success() {
            return Err(MediaError::BadResponse(response.status));
        }

        let image = self.inner.downsampler.decode(response.body).await?;
        if dispatch.token.is_cancelled() {
            return Err(MediaError::Cancelled);
        }
        Ok(Content::Image(Arc::new(image)))
    }

    async fn load_video(&self, dispatch: &Dispatch) -> Result<Content, MediaError> {
        let PendingSession { session, ready } = self.inner.sessions.create(&dispatch.url);

        let readiness = guarded(
            &dispatch.token,
            self.inner.config.session_ready_timeout,
            async move {
                ready.await.unwrap_or_else(|_| {
                    Err(MediaError::SessionFailure(
                        "session dropped before reporting readiness".to_string(),
                    ))
                })
            },
        )
        .await;

        match readiness {
            Ok(()) => Ok(Content::Video(session)),
            Err(error) => {
                session.release();
                Err(error)
            }
        }
    }
}

/// Runs `work` until it finishes, `limit` elapses or `token` fires.
async fn guarded<T, F>(token: &CancellationToken, limit: Duration, work: F) -> Result<T, MediaError>
where
    F: Future<Output = Result<T, MediaError>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(MediaError::Cancelled),
        outcome = tokio::time::timeout(limit, work) => {
            outcome.unwrap_or_else(|_| Err(MediaError::Timeout(limit.as_millis() as u64)))
        }
    }
}
