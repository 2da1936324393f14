//! # Deadline Index - Pending Requests Ordered by Expiry
//!
//! ## Data Structures
//!
//! - `by_key`: O(1) lookup by `(correlation_id, kind)`
//! - `by_deadline`: O(log n) ordered set on `(deadline, correlation_id, kind)`
//! - `by_owner`: O(1) per-owner membership for quota checks and bulk termination
//!
//! ## Invariants Enforced
//!
//! - At most one entry per `(correlation_id, kind)`; re-inserting replaces
//! - `peek_min()` always equals the true minimum deadline among live entries
//! - `drain_expired(now)` removes exactly the prefix with `deadline <= now`,
//!   so an entry is never returned twice

use super::entities::{CorrelationId, EntryKey, OwnerId, PendingEntry, RequestKind};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Instant;

/// Ordered index of pending requests keyed by expiry time.
#[derive(Debug)]
pub struct DeadlineIndex<T> {
    /// All entries by key.
    by_key: HashMap<EntryKey, PendingEntry<T>>,

    /// Entries ordered by deadline, ties broken by key.
    by_deadline: BTreeSet<(Instant, EntryKey)>,

    /// Keys grouped by owner.
    by_owner: HashMap<OwnerId, HashSet<EntryKey>>,
}

impl<T> Default for DeadlineIndex<T> {
    fn default() -> Self {
        Self {
            by_key: HashMap::new(),
            by_deadline: BTreeSet::new(),
            by_owner: HashMap::new(),
        }
    }
}

impl<T> DeadlineIndex<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn contains(&self, correlation_id: CorrelationId, kind: RequestKind) -> bool {
        self.by_key
            .contains_key(&EntryKey::new(correlation_id, kind))
    }

    pub fn get(&self, correlation_id: CorrelationId, kind: RequestKind) -> Option<&PendingEntry<T>> {
        self.by_key.get(&EntryKey::new(correlation_id, kind))
    }

    /// Inserts an entry, replacing any entry with the same key.
    ///
    /// Returns the replaced entry, if there was one.
    pub fn insert(&mut self, entry: PendingEntry<T>) -> Option<PendingEntry<T>> {
        let key = entry.key();
        let replaced = self.remove_key(&key);

        self.by_deadline.insert((entry.deadline, key));
        self.by_owner.entry(entry.owner_id).or_default().insert(key);
        self.by_key.insert(key, entry);

        replaced
    }

    /// Removes an entry by key.
    pub fn remove(
        &mut self,
        correlation_id: CorrelationId,
        kind: RequestKind,
    ) -> Option<PendingEntry<T>> {
        self.remove_key(&EntryKey::new(correlation_id, kind))
    }

    /// Moves an entry to a new deadline.
    ///
    /// Returns false if no such entry exists.
    pub fn update_deadline(
        &mut self,
        correlation_id: CorrelationId,
        kind: RequestKind,
        new_deadline: Instant,
    ) -> bool {
        let key = EntryKey::new(correlation_id, kind);
        let Some(entry) = self.by_key.get_mut(&key) else {
            return false;
        };

        self.by_deadline.remove(&(entry.deadline, key));
        entry.deadline = new_deadline;
        self.by_deadline.insert((new_deadline, key));
        true
    }

    /// Earliest deadline among live entries, or `None` when empty.
    pub fn peek_min(&self) -> Option<Instant> {
        self.by_deadline.first().map(|(deadline, _)| *deadline)
    }

    /// Removes and returns every entry whose deadline is `<= now`,
    /// earliest first.
    pub fn drain_expired(&mut self, now: Instant) -> Vec<PendingEntry<T>> {
        let mut expired = Vec::new();

        while let Some(&(deadline, key)) = self.by_deadline.first() {
            if deadline > now {
                break;
            }
            if let Some(entry) = self.remove_key(&key) {
                expired.push(entry);
            } else {
                // Orphaned ordering node; drop it so the loop makes progress
                self.by_deadline.pop_first();
            }
        }

        expired
    }

    /// Number of entries (all kinds) owned by `owner`.
    pub fn owner_count(&self, owner: OwnerId) -> usize {
        self.by_owner.get(&owner).map(|keys| keys.len()).unwrap_or(0)
    }

    /// Removes every entry owned by `owner`.
    pub fn remove_owner(&mut self, owner: OwnerId) -> Vec<PendingEntry<T>> {
        let keys: Vec<EntryKey> = self
            .by_owner
            .get(&owner)
            .map(|keys| keys.iter().copied().collect())
            .unwrap_or_default();

        keys.iter().filter_map(|key| self.remove_key(key)).collect()
    }

    /// Removes every entry of the given kind.
    pub fn remove_kind(&mut self, kind: RequestKind) -> Vec<PendingEntry<T>> {
        let keys: Vec<EntryKey> = self
            .by_key
            .keys()
            .filter(|key| key.kind == kind)
            .copied()
            .collect();

        keys.iter().filter_map(|key| self.remove_key(key)).collect()
    }

    /// Internal remove keeping all three indices consistent.
    fn remove_key(&mut self, key: &EntryKey) -> Option<PendingEntry<T>> {
        let entry = self.by_key.remove(key)?;

        self.by_deadline.remove(&(entry.deadline, *key));

        if let Some(keys) = self.by_owner.get_mut(&entry.owner_id) {
            keys.remove(key);
            if keys.is_empty() {
                self.by_owner.remove(&entry.owner_id);
            }
        }

        Some(entry)
    }
}
