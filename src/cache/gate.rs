//! Concurrency Gate Module
//!
//! Admission control for video loads: at most `max_slots` run at once, the
//! rest wait in a strict FIFO queue.

use std::collections::{HashMap, VecDeque};

use crate::cache::{LoadPriority, MediaKey};

// == Pending Video Request ==
/// A video load waiting for a free slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingVideoRequest {
    pub key: MediaKey,
    pub priority: LoadPriority,
}

// == Admission ==
/// Outcome of asking the gate for a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A slot was taken; start the load now
    Start,
    /// Parked at the back of the queue
    Queued,
    /// Key is already active or queued; nothing to do
    Duplicate,
}

// == Concurrency Gate ==
/// Tracks active video loads (by generation) and the wait queue.
///
/// Queue order:
/// - Front = Next to be admitted
/// - Back = Most recently parked
#[derive(Debug)]
pub struct ConcurrencyGate {
    max_slots: usize,
    /// Active key -> generation of the task holding the slot
    active: HashMap<MediaKey, u64>,
    pending: VecDeque<PendingVideoRequest>,
}

impl ConcurrencyGate {
    // == Constructor ==
    pub fn new(max_slots: usize) -> Self {
        Self {
            max_slots: max_slots.max(1),
            active: HashMap::new(),
            pending: VecDeque::new(),
        }
    }

    // == Request ==
    /// Admits `key` under `generation` if a slot is free, otherwise queues it.
    pub fn request(&mut self, key: &MediaKey, priority: LoadPriority, generation: u64) -> Admission {
        if self.is_active(key) || self.is_pending(key) {
            return Admission::Duplicate;
        }

        if self.has_free_slot() {
            self.active.insert(key.clone(), generation);
            Admission::Start
        } else {
            self.pending.push_back(PendingVideoRequest {
                key: key.clone(),
                priority,
            });
            Admission::Queued
        }
    }

    // == Activate ==
    /// Gives a slot to a request popped from the queue.
    pub fn activate(&mut self, key: MediaKey, generation: u64) {
        self.active.insert(key, generation);
    }

    // == Release ==
    /// Frees the slot held by `key` if `generation` still owns it.
    ///
    /// Returns false for stale generations (e.g. a task that outlived
    /// `reset`), so a late completion never frees someone else's slot.
    pub fn release(&mut self, key: &MediaKey, generation: u64) -> bool {
        match self.active.get(key) {
            Some(owner) if *owner == generation => {
                self.active.remove(key);
                true
            }
            _ => false,
        }
    }

    // == Next Pending ==
    /// Pops the head of the queue.
    pub fn next_pending(&mut self) -> Option<PendingVideoRequest> {
        self.pending.pop_front()
    }

    // == Remove Pending ==
    /// Drops a queued request; returns whether it was queued.
    pub fn remove_pending(&mut self, key: &MediaKey) -> bool {
        let before = self.pending.len();
        self.pending.retain(|r| &r.key != key);
        self.pending.len() != before
    }

    // == Reset ==
    /// Forgets every slot and queued request.
    pub fn reset(&mut self) {
        self.active.clear();
        self.pending.clear();
    }

    pub fn has_free_slot(&self) -> bool {
        self.active.len() < self.max_slots
    }

    pub fn is_active(&self, key: &MediaKey) -> bool {
        self.active.contains_key(key)
    }

    pub fn is_pending(&self, key: &MediaKey) -> bool {
        self.pending.iter().any(|r| &r.key == key)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn max_slots(&self) -> usize {
        self.max_slots
    }

    /// Queued keys in admission order.
    pub fn pending_keys(&self) -> Vec<MediaKey> {
        self.pending.iter().map(|r| r.key.clone()).collect()
    }
}
