//! Controller statistics.
//!
//! Counters are relaxed atomics bumped on the hot path; readers take a
//! [`StatsSnapshot`] which is consistent per counter, not across counters.

use super::errors::AdmissionResult;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for the request controller
#[derive(Debug, Default)]
pub struct ControllerStats {
    /// Mobile and HMI requests accepted
    pub admitted: AtomicU64,
    /// Rejected with INVALID_DATA
    pub rejected_invalid: AtomicU64,
    /// Rejected with TOO_MANY_REQUESTS
    pub rejected_too_many: AtomicU64,
    /// Rejected with TOO_MANY_PENDING_REQUESTS
    pub rejected_too_many_pending: AtomicU64,
    /// Rejected with NONE_HMI_LEVEL_MANY_REQUESTS
    pub rejected_none_level: AtomicU64,
    /// Requests handed to a worker
    pub dispatched: AtomicU64,
    /// Entries removed by an explicit terminate call
    pub terminated: AtomicU64,
    /// Request timeouts delivered
    pub timeouts: AtomicU64,
    /// Notification timeouts delivered
    pub notification_timeouts: AtomicU64,
    /// Queued requests dropped by pool teardown
    pub discarded_on_shutdown: AtomicU64,
}

impl ControllerStats {
    /// Count an admission outcome against the matching counter.
    pub fn record_admission(&self, result: AdmissionResult) {
        let counter = match result {
            AdmissionResult::Success => &self.admitted,
            AdmissionResult::TooManyRequests => &self.rejected_too_many,
            AdmissionResult::TooManyPendingRequests => &self.rejected_too_many_pending,
            AdmissionResult::NoneHmiLevelManyRequests => &self.rejected_none_level,
            AdmissionResult::InvalidData => &self.rejected_invalid,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            admitted: self.admitted.load(Ordering::Relaxed),
            rejected_invalid: self.rejected_invalid.load(Ordering::Relaxed),
            rejected_too_many: self.rejected_too_many.load(Ordering::Relaxed),
            rejected_too_many_pending: self.rejected_too_many_pending.load(Ordering::Relaxed),
            rejected_none_level: self.rejected_none_level.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            terminated: self.terminated.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            notification_timeouts: self.notification_timeouts.load(Ordering::Relaxed),
            discarded_on_shutdown: self.discarded_on_shutdown.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ControllerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub admitted: u64,
    pub rejected_invalid: u64,
    pub rejected_too_many: u64,
    pub rejected_too_many_pending: u64,
    pub rejected_none_level: u64,
    pub dispatched: u64,
    pub terminated: u64,
    pub timeouts: u64,
    pub notification_timeouts: u64,
    pub discarded_on_shutdown: u64,
}

impl StatsSnapshot {
    /// Sum of all rejection counters.
    pub fn rejected(&self) -> u64 {
        self.rejected_invalid
            + self.rejected_too_many
            + self.rejected_too_many_pending
            + self.rejected_none_level
    }
}
