//! Notification table - HMI notifications tracked by opaque handle.
//!
//! Notifications are never rate limited and carry no correlation id, so they
//! live apart from the [`DeadlineIndex`](super::deadline_index::DeadlineIndex),
//! but are indexed the same way: a map by handle beside a set ordered on
//! `(deadline, handle)`.

use super::entities::{NotificationEntry, NotificationHandle};
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

#[derive(Debug)]
pub struct NotificationTable<T> {
    by_handle: HashMap<NotificationHandle, NotificationEntry<T>>,
    by_deadline: BTreeSet<(Instant, NotificationHandle)>,
}

impl<T> Default for NotificationTable<T> {
    fn default() -> Self {
        Self {
            by_handle: HashMap::new(),
            by_deadline: BTreeSet::new(),
        }
    }
}

impl<T> NotificationTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a payload until `deadline`, returning its freshly minted handle.
    pub fn insert(&mut self, payload: T, deadline: Instant) -> NotificationHandle {
        let handle = NotificationHandle::new();
        self.by_deadline.insert((deadline, handle));
        self.by_handle.insert(
            handle,
            NotificationEntry {
                handle,
                deadline,
                payload,
            },
        );
        handle
    }

    /// Remove by handle. Unknown and nil handles yield `None`.
    pub fn remove(&mut self, handle: NotificationHandle) -> Option<NotificationEntry<T>> {
        if handle.is_nil() {
            return None;
        }
        let entry = self.by_handle.remove(&handle)?;
        self.by_deadline.remove(&(entry.deadline, handle));
        Some(entry)
    }

    pub fn contains(&self, handle: NotificationHandle) -> bool {
        self.by_handle.contains_key(&handle)
    }

    pub fn peek_min(&self) -> Option<Instant> {
        self.by_deadline.first().map(|(deadline, _)| *deadline)
    }

    /// Remove and return every notification whose deadline is `<= now`,
    /// earliest first.
    pub fn drain_expired(&mut self, now: Instant) -> Vec<NotificationEntry<T>> {
        let mut expired = Vec::new();

        while let Some(&(deadline, handle)) = self.by_deadline.first() {
            if deadline > now {
                break;
            }
            self.by_deadline.pop_first();
            if let Some(entry) = self.by_handle.remove(&handle) {
                expired.push(entry);
            }
        }

        expired
    }

    pub fn len(&self) -> usize {
        self.by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_handle.is_empty()
    }
}
