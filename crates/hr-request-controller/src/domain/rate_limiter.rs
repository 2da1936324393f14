//! # Per-Owner Sliding Window Rate Limiter
//!
//! Answers "has owner X already been admitted N times within the last W?".
//!
//! ## Algorithm: Sliding-Window-Log
//!
//! 1. Prune the owner's timestamp log to the window (lazily, on every check)
//! 2. If the remaining count already equals the maximum: reject, record nothing
//! 3. Otherwise append `now` and admit
//!
//! Two scopes exist per owner. The global scope applies to every mobile
//! admission; the NONE scope is consulted only while the owning application
//! sits at visibility level NONE, so unseen applications cannot flood the
//! queue before the user brings them forward.

use super::config::RateLimitConfig;
use super::entities::OwnerId;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Which window a check is counted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateScope {
    /// Every admission for the owner.
    Global,
    /// Admissions made while the owner was at visibility level NONE.
    NoneLevel,
}

/// Sliding-window counters keyed by `(owner, scope)`.
///
/// INVARIANT: after a check, every stored timestamp for that key lies in
/// `(now - window, now]`.
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: HashMap<(OwnerId, RateScope), VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prune, compare, and record in one step.
    ///
    /// Returns `false` (and records nothing) when the owner already has `max`
    /// admissions inside `window`.
    pub fn check_and_record(
        &mut self,
        owner: OwnerId,
        scope: RateScope,
        window: Duration,
        max: u32,
        now: Instant,
    ) -> bool {
        let log = self.windows.entry((owner, scope)).or_default();
        prune(log, window, now);

        if log.len() >= max as usize {
            return false;
        }

        log.push_back(now);
        true
    }

    /// [`check_and_record`](Self::check_and_record) driven by a config entry.
    ///
    /// A disabled limit admits without recording.
    pub fn check_limit(
        &mut self,
        owner: OwnerId,
        scope: RateScope,
        limit: &RateLimitConfig,
        now: Instant,
    ) -> bool {
        if !limit.is_enabled() {
            return true;
        }
        self.check_and_record(owner, scope, limit.window, limit.max_requests, now)
    }

    /// Would a check succeed right now? Does not record.
    pub fn would_admit(
        &mut self,
        owner: OwnerId,
        scope: RateScope,
        limit: &RateLimitConfig,
        now: Instant,
    ) -> bool {
        if !limit.is_enabled() {
            return true;
        }
        let Some(log) = self.windows.get_mut(&(owner, scope)) else {
            return true;
        };
        prune(log, limit.window, now);
        log.len() < limit.max_requests as usize
    }

    /// Admissions currently recorded for the key (after pruning).
    pub fn count(&mut self, owner: OwnerId, scope: RateScope, window: Duration, now: Instant) -> usize {
        match self.windows.get_mut(&(owner, scope)) {
            Some(log) => {
                prune(log, window, now);
                log.len()
            }
            None => 0,
        }
    }

    /// Drop logs that have fully aged out of `max_window`.
    ///
    /// Returns the number of keys removed.
    pub fn cleanup(&mut self, max_window: Duration, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, log| {
            prune(log, max_window, now);
            !log.is_empty()
        });
        before - self.windows.len()
    }

    /// Number of `(owner, scope)` keys tracked.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

/// Remove timestamps that are `window` or more in the past.
fn prune(log: &mut VecDeque<Instant>, window: Duration, now: Instant) {
    while log
        .front()
        .is_some_and(|oldest| now.saturating_duration_since(*oldest) >= window)
    {
        log.pop_front();
    }
}
