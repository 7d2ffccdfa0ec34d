//! Cache Store Module
//!
//! The serialized core of the cache: the entry map, the video admission gate
//! and the state machine. Every method runs under the owner's write lock and
//! performs no I/O; loads are handed out as [`Dispatch`] tickets and their
//! results come back through [`CacheStore::complete`].

use std::collections::HashMap;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::entry::InFlight;
use crate::cache::eviction::select_victims;
use crate::cache::gate::{Admission, ConcurrencyGate};
use crate::cache::{
    AccessClock, CacheEntry, CacheEvent, CacheStats, Content, LoadPriority, LoadState, MediaKey,
    MediaKind,
};
use crate::error::MediaError;

// == Dispatch ==
/// Ticket for one load task the owner must run.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub key: MediaKey,
    pub kind: MediaKind,
    pub url: Url,
    pub priority: LoadPriority,
    /// Must be handed back to `complete`
    pub generation: u64,
    /// Checked by the task at every suspension point
    pub token: CancellationToken,
}

// == Completion ==
/// What the owner must do after a task finished.
#[derive(Debug, Default)]
pub struct Completion {
    /// Video loads admitted by the freed slot
    pub next: Vec<Dispatch>,
    /// Content from a stale task, to be released
    pub discarded: Option<Content>,
}

// == Removal ==
/// What the owner must do after an explicit eviction.
#[derive(Debug, Default)]
pub struct Removal {
    /// Content that left the cache and may hold a player
    pub released: Vec<Content>,
    /// Video loads admitted by the freed slot
    pub next: Vec<Dispatch>,
}

// == Entry Snapshot ==
/// Read-only view of one entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySnapshot {
    pub key: MediaKey,
    pub kind: MediaKind,
    pub state: &'static str,
    pub error: Option<MediaError>,
    pub last_access: u64,
    pub waiting_for_slot: bool,
}

// == Cache Store ==
/// Entry map, admission gate and statistics behind one lock.
#[derive(Debug)]
pub struct CacheStore {
    entries: HashMap<MediaKey, CacheEntry>,
    gate: ConcurrencyGate,
    stats: CacheStats,
    clock: AccessClock,
    /// Share of loaded images removed per sweep
    eviction_fraction: f64,
    next_generation: u64,
    events: broadcast::Sender<CacheEvent>,
}

impl CacheStore {
    // == Constructor ==
    /// Creates an empty store.
    ///
    /// # Arguments
    /// * `max_video_slots` - Concurrent video loads allowed
    /// * `eviction_fraction` - Share of loaded images one sweep removes
    /// * `event_capacity` - Buffer of the change broadcast
    pub fn new(max_video_slots: usize, eviction_fraction: f64, event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            entries: HashMap::new(),
            gate: ConcurrencyGate::new(max_video_slots),
            stats: CacheStats::new(),
            clock: AccessClock::new(),
            eviction_fraction,
            next_generation: 0,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    // == State ==
    /// Current state; `Idle` for unknown keys. Never creates an entry.
    pub fn state(&self, key: &MediaKey) -> LoadState {
        self.entries
            .get(key)
            .map(|entry| entry.state.clone())
            .unwrap_or_default()
    }

    pub fn entry(&self, key: &MediaKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    // == Content ==
    /// Returns loaded content and refreshes the entry's last access.
    pub fn content(&mut self, key: &MediaKey) -> Option<Content> {
        let now = self.clock.tick();
        let content = self.entries.get_mut(key).and_then(|entry| {
            let content = entry.content().cloned();
            if content.is_some() {
                entry.last_access = now;
            }
            content
        });

        if content.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        content
    }

    // == Begin Load ==
    /// Moves `key` to `Loading` unless it is already loading or loaded.
    ///
    /// Returns a ticket when a task must start now. Videos beyond the slot
    /// limit stay `Loading` without a ticket until a slot frees up.
    pub fn begin_load(
        &mut self,
        key: &MediaKey,
        kind: MediaKind,
        priority: LoadPriority,
    ) -> Option<Dispatch> {
        let now = self.clock.tick();
        let entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(key.clone(), kind, now));

        if entry.state.is_loading() || entry.state.is_loaded() {
            debug!("Load of {} ignored: already {}", key, entry.state.label());
            return None;
        }
        if entry.kind != kind {
            warn!(
                "{} requested as {:?} but cached as {:?}; keeping {:?}",
                key, kind, entry.kind, entry.kind
            );
        }
        let kind = entry.kind;
        entry.last_access = now;

        self.set_state(key, LoadState::Loading);
        self.stats.record_load_started();

        let url = match key.to_url() {
            Ok(url) => url,
            Err(error) => {
                self.fail(key, error);
                return None;
            }
        };

        let generation = self.next_generation();
        match kind {
            MediaKind::Image => Some(self.arm(key, kind, url, priority, generation)),
            MediaKind::Video => match self.gate.request(key, priority, generation) {
                Admission::Start => Some(self.arm(key, kind, url, priority, generation)),
                Admission::Queued => {
                    debug!(
                        "Video {} queued ({} active, {} waiting)",
                        key,
                        self.gate.active_count(),
                        self.gate.pending_len()
                    );
                    None
                }
                Admission::Duplicate => None,
            },
        }
    }

    // == Begin Retry ==
    /// Restarts a `Failed` key; no-op in any other state.
    pub fn begin_retry(&mut self, key: &MediaKey, priority: LoadPriority) -> Option<Dispatch> {
        let kind = self
            .entries
            .get(key)
            .filter(|entry| entry.state.is_failed())
            .map(|entry| entry.kind)?;

        self.begin_load(key, kind, priority)
    }

    // == Complete ==
    /// Records the result of the task that held `generation`.
    ///
    /// Results from any other generation are stale (the entry was evicted,
    /// cleared or reloaded since) and never touch the entry.
    pub fn complete(
        &mut self,
        key: &MediaKey,
        generation: u64,
        result: Result<Content, MediaError>,
    ) -> Completion {
        let mut completion = Completion::default();

        let is_current = self
            .entries
            .get(key)
            .and_then(|entry| entry.in_flight.as_ref())
            .is_some_and(|task| task.generation == generation);
        let freed_slot = self.gate.release(key, generation);

        if is_current {
            let now = self.clock.tick();
            if let Some(entry) = self.entries.get_mut(key) {
                entry.in_flight = None;
                entry.last_access = now;
            }

            match result {
                Ok(content) => {
                    debug!("Loaded {}", key);
                    self.set_state(key, LoadState::Loaded(content));
                    self.stats.record_load_succeeded();
                }
                Err(MediaError::Cancelled) => {
                    self.entries.remove(key);
                    self.publish_state(key, LoadState::Idle);
                    self.stats.record_discarded();
                }
                Err(error) => self.fail(key, error),
            }
        } else {
            debug!("Discarding stale result for {} (generation {})", key, generation);
            self.stats.record_discarded();
            completion.discarded = result.ok();
        }

        if freed_slot {
            completion.next = self.admit_pending();
        }
        completion
    }

    // == Evict ==
    /// Removes one entry of any kind, cancelling its task and freeing its
    /// video slot. Returns `None` for unknown keys.
    pub fn evict(&mut self, key: &MediaKey) -> Option<Removal> {
        let mut entry = self.entries.remove(key)?;
        let mut removal = Removal::default();

        self.gate.remove_pending(key);
        if let Some(task) = entry.cancel_task() {
            if self.gate.release(key, task.generation) {
                removal.next = self.admit_pending();
            }
        }
        if let LoadState::Loaded(content) = entry.state {
            removal.released.push(content);
        }

        self.stats.record_evictions(1);
        self.publish_state(key, LoadState::Idle);
        self.publish(CacheEvent::Evicted {
            keys: vec![key.clone()],
        });
        Some(removal)
    }

    // == Sweep ==
    /// Memory-pressure sweep: drops the least recently accessed share of
    /// loaded images. Videos are never touched.
    pub fn sweep(&mut self) -> Vec<MediaKey> {
        let victims = select_victims(self.entries.values(), self.eviction_fraction);

        for key in &victims {
            if let Some(mut entry) = self.entries.remove(key) {
                entry.cancel_task();
            }
            self.publish_state(key, LoadState::Idle);
        }

        if !victims.is_empty() {
            self.stats.record_evictions(victims.len());
            self.publish(CacheEvent::Evicted {
                keys: victims.clone(),
            });
        }
        victims
    }

    // == Clear ==
    /// Drops every entry, cancels every task and resets the gate.
    ///
    /// Returns loaded content so the owner can release video players.
    pub fn clear(&mut self) -> Vec<Content> {
        let mut released = Vec::new();
        for (_, mut entry) in self.entries.drain() {
            entry.cancel_task();
            if let LoadState::Loaded(content) = entry.state {
                released.push(content);
            }
        }
        self.gate.reset();

        info!("Cache cleared ({} loaded entries released)", released.len());
        self.publish(CacheEvent::Cleared);
        released
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.total_entries = self.entries.len();
        stats.active_video_loads = self.gate.active_count();
        stats.pending_video_loads = self.gate.pending_len();
        stats
    }

    // == Snapshot ==
    /// Every entry, sorted by key.
    pub fn snapshot(&self) -> Vec<EntrySnapshot> {
        let mut entries: Vec<EntrySnapshot> = self
            .entries
            .values()
            .map(|entry| EntrySnapshot {
                key: entry.key.clone(),
                kind: entry.kind,
                state: entry.state.label(),
                error: entry.state.error().cloned(),
                last_access: entry.last_access,
                waiting_for_slot: entry.is_waiting(),
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }

    pub fn active_video_loads(&self) -> usize {
        self.gate.active_count()
    }

    /// Videos waiting for a slot, in admission order.
    pub fn pending_videos(&self) -> Vec<MediaKey> {
        self.gate.pending_keys()
    }

    // == Length ==
    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Internals ==
    fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    fn arm(
        &mut self,
        key: &MediaKey,
        kind: MediaKind,
        url: Url,
        priority: LoadPriority,
        generation: u64,
    ) -> Dispatch {
        let token = CancellationToken::new();
        if let Some(entry) = self.entries.get_mut(key) {
            entry.in_flight = Some(InFlight {
                token: token.clone(),
                generation,
            });
        }

        Dispatch {
            key: key.clone(),
            kind,
            url,
            priority,
            generation,
            token,
        }
    }

    /// Starts queued videos while slots are free, skipping keys that no
    /// longer wait (evicted or cleared since they were queued).
    fn admit_pending(&mut self) -> Vec<Dispatch> {
        let mut started = Vec::new();

        while self.gate.has_free_slot() {
            let Some(request) = self.gate.next_pending() else {
                break;
            };

            let waiting = self
                .entries
                .get(&request.key)
                .is_some_and(|entry| entry.is_waiting());
            if !waiting {
                debug!("Skipping queued {}: no longer waiting", request.key);
                continue;
            }

            let url = match request.key.to_url() {
                Ok(url) => url,
                Err(error) => {
                    self.fail(&request.key, error);
                    continue;
                }
            };

            let generation = self.next_generation();
            self.gate.activate(request.key.clone(), generation);
            debug!("Admitting queued video {}", request.key);
            started.push(self.arm(&request.key, MediaKind::Video, url, request.priority, generation));
        }

        started
    }

    fn fail(&mut self, key: &MediaKey, error: MediaError) {
        warn!("Load of {} failed: {}", key, error);
        self.set_state(key, LoadState::Failed(error));
        self.stats.record_load_failed();
    }

    /// Updates an existing entry and publishes the change. Equal states are
    /// not republished.
    fn set_state(&mut self, key: &MediaKey, state: LoadState) {
        let Some(entry) = self.entries.get_mut(key) else {
            return;
        };
        if entry.state == state {
            return;
        }
        entry.state = state.clone();
        self.publish_state(key, state);
    }

    fn publish_state(&self, key: &MediaKey, state: LoadState) {
        self.publish(CacheEvent::StateChanged {
            key: key.clone(),
            state,
        });
    }

    fn publish(&self, event: CacheEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
