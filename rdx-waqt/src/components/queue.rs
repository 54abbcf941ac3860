//! A time-ordered collection of pending occurrences with dedup by id.
//!
//! Entries live in a slotmap arena. Two indexes point into it: one by id for
//! idempotent upserts, one ordered by `(trigger_at, id)` so the earliest due
//! entry is found in O(log n). Ids handed out by `next_due` are remembered in
//! a ledger until `reset`, which is what stops a same-day regeneration from
//! dispatching something twice.

use crate::common::{Category, OccurrenceId, QueueKey};
use crate::occurrence::Occurrence;
use chrono::NaiveDateTime;
use slotmap::SlotMap;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::trace;

/// What `upsert` did with the offered occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    /// A pending entry with the same id moved to the new trigger time.
    Replaced,
    /// A pending entry with the same id and trigger time already exists.
    Unchanged,
    /// The id was already dispatched today; nothing was queued.
    AlreadyDispatched,
}

#[derive(Default)]
pub struct OccurrenceQueue {
    entries: SlotMap<QueueKey, Occurrence>,
    by_id: HashMap<OccurrenceId, QueueKey>,
    by_time: BTreeMap<(NaiveDateTime, OccurrenceId), QueueKey>,
    dispatched: HashSet<OccurrenceId>,
}

impl OccurrenceQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `occurrence` unless an identical pending one exists.
    pub fn upsert(&mut self, mut occurrence: Occurrence) -> UpsertOutcome {
        if self.dispatched.contains(&occurrence.id) {
            return UpsertOutcome::AlreadyDispatched;
        }
        occurrence.dispatched = false;

        if let Some(&key) = self.by_id.get(&occurrence.id) {
            let Some(existing) = self.entries.get_mut(key) else {
                return UpsertOutcome::Unchanged;
            };
            if existing.trigger_at == occurrence.trigger_at {
                return UpsertOutcome::Unchanged;
            }
            self.by_time
                .remove(&(existing.trigger_at, existing.id.clone()));
            self.by_time
                .insert((occurrence.trigger_at, occurrence.id.clone()), key);
            trace!("moved {} to {}", occurrence.id, occurrence.trigger_at);
            *existing = occurrence;
            return UpsertOutcome::Replaced;
        }

        let id = occurrence.id.clone();
        let trigger_at = occurrence.trigger_at;
        let key = self.entries.insert(occurrence);
        self.by_id.insert(id.clone(), key);
        self.by_time.insert((trigger_at, id), key);
        UpsertOutcome::Inserted
    }

    /// Drops every pending occurrence of `category`. Returns how many went.
    pub fn remove_by_category(&mut self, category: Category) -> usize {
        let doomed: Vec<QueueKey> = self
            .entries
            .iter()
            .filter(|(_, o)| o.category == category)
            .map(|(key, _)| key)
            .collect();
        for key in &doomed {
            self.remove_key(*key);
        }
        doomed.len()
    }

    /// Removes and returns the earliest occurrence due at `now`, marked dispatched.
    pub fn next_due(&mut self, now: NaiveDateTime) -> Option<Occurrence> {
        let &key = self.by_time.values().next()?;
        if !self.entries.get(key)?.is_due(now) {
            return None;
        }
        let mut occurrence = self.remove_key(key)?;
        occurrence.dispatched = true;
        self.dispatched.insert(occurrence.id.clone());
        Some(occurrence)
    }

    /// The next `n` pending occurrences in trigger order.
    pub fn peek_upcoming(&self, n: usize) -> Vec<Occurrence> {
        self.by_time
            .values()
            .take(n)
            .filter_map(|key| self.entries.get(*key).cloned())
            .collect()
    }

    pub fn is_dispatched(&self, id: &OccurrenceId) -> bool {
        self.dispatched.contains(id)
    }

    /// Drops pending entries but keeps the dispatch ledger.
    pub fn clear_pending(&mut self) {
        self.entries.clear();
        self.by_id.clear();
        self.by_time.clear();
    }

    /// Drops pending entries and the dispatch ledger; used on day rollover.
    pub fn reset(&mut self) {
        self.clear_pending();
        self.dispatched.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn remove_key(&mut self, key: QueueKey) -> Option<Occurrence> {
        let occurrence = self.entries.remove(key)?;
        self.by_id.remove(&occurrence.id);
        self.by_time
            .remove(&(occurrence.trigger_at, occurrence.id.clone()));
        Some(occurrence)
    }
}
