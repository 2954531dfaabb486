// src/pipeline/dedupe.rs

//! Memory of which events have already been alerted.
//!
//! Entries are keyed by feed event id and keep the time the event was first
//! alerted. The poller evicts entries past the retention window once per
//! cycle, so the map is bounded by the number of events the feed can report
//! within that window. Not synchronized: a single poller owns it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

#[derive(Debug, Default)]
pub struct DedupeStore {
    seen: HashMap<String, DateTime<Utc>>,
}

impl DedupeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_seen(&self, id: &str) -> bool {
        self.seen.contains_key(id)
    }

    /// Record `id` as alerted at `at`. A second call keeps the first time.
    pub fn mark_seen(&mut self, id: &str, at: DateTime<Utc>) {
        if !self.seen.contains_key(id) {
            self.seen.insert(id.to_string(), at);
        }
    }

    /// First time `id` was marked, if it is still remembered.
    pub fn first_seen(&self, id: &str) -> Option<DateTime<Utc>> {
        self.seen.get(id).copied()
    }

    /// Drop entries first seen strictly before `cutoff`. Returns how many.
    pub fn evict_older_than(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.seen.len();
        self.seen.retain(|_, first_seen| *first_seen >= cutoff);
        before - self.seen.len()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
