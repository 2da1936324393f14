//! Request controller service - the façade behind [`RequestControllerApi`].
//!
//! Owns the work queue, the deadline index, the notification table, the rate
//! limiter, the worker pool and the timeout scheduler.
//!
//! ## Locking
//!
//! Each structure has its own lock. When more than one is needed the order is
//! always queue, then index, then rate limiter. No lock is held while calling
//! `invoke()` or `on_timeout()`.

use crate::domain::{
    AdmissionResult, ControllerConfig, ControllerResult, ControllerStats, CorrelationId,
    DeadlineIndex, NotificationHandle, NotificationTable, OwnerId, PendingEntry, PoolState,
    RateLimiter, RateScope, RequestKind, StatsSnapshot, VisibilityLevel,
};
use crate::ports::{
    NotificationPtr, RequestControllerApi, RequestPtr, SystemTimeSource, TimeSource,
};
use crate::runtime::{QueueState, TimeoutScheduler, WorkQueue, WorkerPool};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// State shared between caller threads and the scheduler thread.
struct Core {
    config: ControllerConfig,
    clock: Arc<dyn TimeSource>,
    queue: Arc<WorkQueue>,
    index: Mutex<DeadlineIndex<RequestPtr>>,
    notifications: Mutex<NotificationTable<NotificationPtr>>,
    limiter: Mutex<RateLimiter>,
    stats: Arc<ControllerStats>,
}

impl Core {
    /// Admission checks 1-5, in order. Records into the rate limiter only
    /// when every check passes.
    fn check_admission(
        &self,
        queue: &QueueState,
        index: &DeadlineIndex<RequestPtr>,
        correlation_id: CorrelationId,
        owner_id: OwnerId,
        visibility_level: VisibilityLevel,
        now: Instant,
    ) -> AdmissionResult {
        if correlation_id == 0 || index.contains(correlation_id, RequestKind::Mobile) {
            return AdmissionResult::InvalidData;
        }

        let max_queue = self.config.max_queue_length;
        if max_queue > 0 && queue.load() >= max_queue {
            return AdmissionResult::TooManyRequests;
        }

        let max_pending = self.config.max_pending_per_owner;
        if max_pending > 0 && index.owner_count(owner_id) >= max_pending {
            return AdmissionResult::TooManyPendingRequests;
        }

        let mut limiter = self.limiter.lock();
        let none_level = visibility_level.is_none();

        if none_level
            && !limiter.would_admit(
                owner_id,
                RateScope::NoneLevel,
                &self.config.none_level_rate_limit,
                now,
            )
        {
            return AdmissionResult::NoneHmiLevelManyRequests;
        }

        if !limiter.check_limit(owner_id, RateScope::Global, &self.config.rate_limit, now) {
            return AdmissionResult::TooManyRequests;
        }

        if none_level {
            limiter.check_limit(
                owner_id,
                RateScope::NoneLevel,
                &self.config.none_level_rate_limit,
                now,
            );
        }

        AdmissionResult::Success
    }

    /// One scheduler pass. Returns the next deadline across both tables.
    fn sweep(&self, now: Instant) -> Option<Instant> {
        let expired = {
            let mut queue = self.queue.lock();
            let mut index = self.index.lock();
            let expired = index.drain_expired(now);

            let mobile: HashSet<CorrelationId> = expired
                .iter()
                .filter(|e| e.kind == RequestKind::Mobile)
                .map(|e| e.correlation_id)
                .collect();
            if !mobile.is_empty() {
                let purged = queue.remove_where(|r| mobile.contains(&r.correlation_id()));
                if purged > 0 {
                    debug!(purged = purged, "Purged expired requests from work queue");
                }
            }
            expired
        };
        let expired_notifications = self.notifications.lock().drain_expired(now);

        let max_window = self
            .config
            .rate_limit
            .window
            .max(self.config.none_level_rate_limit.window);
        self.limiter.lock().cleanup(max_window, now);

        for entry in expired {
            warn!(
                correlation_id = entry.correlation_id,
                owner_id = entry.owner_id,
                kind = %entry.kind,
                "Request timed out"
            );
            self.stats.timeouts.fetch_add(1, Ordering::Relaxed);
            if catch_unwind(AssertUnwindSafe(|| entry.payload.on_timeout())).is_err() {
                error!(
                    correlation_id = entry.correlation_id,
                    "Request panicked in timeout callback"
                );
            }
        }

        for entry in expired_notifications {
            debug!(handle = %entry.handle, "Notification timed out");
            self.stats
                .notification_timeouts
                .fetch_add(1, Ordering::Relaxed);
            if catch_unwind(AssertUnwindSafe(|| entry.payload.on_timeout())).is_err() {
                error!(handle = %entry.handle, "Notification panicked in timeout callback");
            }
        }

        let next_request = self.index.lock().peek_min();
        let next_notification = self.notifications.lock().peek_min();
        match (next_request, next_notification) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Longest timeout honoured; anything larger is clamped to this.
const MAX_TIMEOUT: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// `now + timeout`, clamped so an oversized timeout never overflows `Instant`.
fn deadline_after(now: Instant, timeout: Duration) -> Instant {
    now.checked_add(timeout.min(MAX_TIMEOUT)).unwrap_or(now)
}

/// Milliseconds for log fields, saturating at `u64::MAX`.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// True when `deadline` becomes the new earliest entry.
fn is_new_minimum(previous: Option<Instant>, deadline: Instant) -> bool {
    previous.map_or(true, |min| deadline < min)
}

/// Request lifecycle governor.
///
/// Safe to share across threads (`Arc<RequestController>`). Dropping it
/// stops the worker pool and the scheduler, waiting for both.
pub struct RequestController {
    core: Arc<Core>,
    pool: WorkerPool,
    scheduler: TimeoutScheduler,
}

impl RequestController {
    /// Create a controller on the system clock and start its scheduler.
    ///
    /// The worker pool is not started; call
    /// [`initialize_thread_pool`](RequestControllerApi::initialize_thread_pool).
    pub fn new(config: ControllerConfig) -> ControllerResult<Self> {
        Self::with_time_source(config, Arc::new(SystemTimeSource))
    }

    pub fn with_time_source(
        config: ControllerConfig,
        clock: Arc<dyn TimeSource>,
    ) -> ControllerResult<Self> {
        config.validate()?;

        let stats = Arc::new(ControllerStats::default());
        let queue = Arc::new(WorkQueue::new());

        let core = Arc::new(Core {
            config,
            clock: Arc::clone(&clock),
            queue: Arc::clone(&queue),
            index: Mutex::new(DeadlineIndex::new()),
            notifications: Mutex::new(NotificationTable::new()),
            limiter: Mutex::new(RateLimiter::new()),
            stats: Arc::clone(&stats),
        });

        let pool = WorkerPool::new(queue, stats);

        let sweep_core = Arc::clone(&core);
        let scheduler = TimeoutScheduler::spawn(clock, move |now| sweep_core.sweep(now))?;

        info!(
            thread_pool_size = core.config.thread_pool_size,
            max_queue_length = core.config.max_queue_length,
            max_pending_per_owner = core.config.max_pending_per_owner,
            "Request controller created"
        );

        Ok(Self {
            core,
            pool,
            scheduler,
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.core.config
    }

    /// Stop the timeout scheduler and wait for it to exit.
    ///
    /// Entries stay in the index but no further timeouts are delivered.
    pub fn shutdown_scheduler(&self) {
        self.scheduler.shutdown();
    }

    pub fn is_scheduler_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn is_pending(&self, correlation_id: CorrelationId, kind: RequestKind) -> bool {
        self.core.index.lock().contains(correlation_id, kind)
    }

    pub fn notification_count(&self) -> usize {
        self.core.notifications.lock().len()
    }

    fn deadline_for(&self, timeout: Option<Duration>) -> Instant {
        deadline_after(
            self.core.clock.now(),
            self.core.config.timeout_or_default(timeout),
        )
    }
}

impl RequestControllerApi for RequestController {
    fn add_mobile_request(
        &self,
        request: RequestPtr,
        visibility_level: VisibilityLevel,
    ) -> AdmissionResult {
        let correlation_id = request.correlation_id();
        let owner_id = request.owner_id();
        let now = self.core.clock.now();
        let timeout = self.core.config.timeout_or_default(request.timeout());
        let deadline = deadline_after(now, timeout);

        let (result, queued, wake) = {
            let mut queue = self.core.queue.lock();
            let mut index = self.core.index.lock();

            let result = self.core.check_admission(
                &queue,
                &index,
                correlation_id,
                owner_id,
                visibility_level,
                now,
            );

            if result.is_success() {
                let queued = queue.push(Arc::clone(&request));
                let wake = is_new_minimum(index.peek_min(), deadline);
                index.insert(PendingEntry {
                    correlation_id,
                    owner_id,
                    kind: RequestKind::Mobile,
                    visibility_level: Some(visibility_level),
                    deadline,
                    payload: request,
                });
                (result, queued, wake)
            } else {
                (result, false, false)
            }
        };

        self.core.stats.record_admission(result);

        if !result.is_success() {
            warn!(
                correlation_id = correlation_id,
                owner_id = owner_id,
                level = %visibility_level,
                result = %result,
                "Mobile request rejected"
            );
            return result;
        }

        if queued {
            self.core.queue.notify_one();
        } else {
            ControllerStats::add(&self.core.stats.discarded_on_shutdown, 1);
            warn!(
                correlation_id = correlation_id,
                owner_id = owner_id,
                "Worker pool stopped; request tracked for timeout only"
            );
        }
        if wake {
            self.scheduler.wake();
        }

        debug!(
            correlation_id = correlation_id,
            owner_id = owner_id,
            level = %visibility_level,
            deadline_in_ms = millis(deadline.saturating_duration_since(now)),
            "Mobile request admitted"
        );
        result
    }

    fn add_hmi_request(&self, request: RequestPtr) -> AdmissionResult {
        let correlation_id = request.correlation_id();
        let owner_id = request.owner_id();

        if correlation_id == 0 {
            self.core.stats.record_admission(AdmissionResult::InvalidData);
            warn!(owner_id = owner_id, "HMI request with zero correlation id rejected");
            return AdmissionResult::InvalidData;
        }

        let deadline = self.deadline_for(request.timeout());
        let (replaced, wake) = {
            let mut index = self.core.index.lock();
            let wake = is_new_minimum(index.peek_min(), deadline);
            let replaced = index.insert(PendingEntry {
                correlation_id,
                owner_id,
                kind: RequestKind::Hmi,
                visibility_level: None,
                deadline,
                payload: request,
            });
            (replaced.is_some(), wake)
        };

        if replaced {
            warn!(
                correlation_id = correlation_id,
                owner_id = owner_id,
                "Duplicate HMI request replaced existing entry"
            );
        }
        if wake {
            self.scheduler.wake();
        }

        self.core.stats.record_admission(AdmissionResult::Success);
        debug!(correlation_id = correlation_id, owner_id = owner_id, "HMI request tracked");
        AdmissionResult::Success
    }

    fn add_notification(&self, notification: NotificationPtr) -> NotificationHandle {
        let deadline = self.deadline_for(notification.timeout());

        let (handle, wake) = {
            let mut notifications = self.core.notifications.lock();
            let wake = is_new_minimum(notifications.peek_min(), deadline);
            (notifications.insert(notification, deadline), wake)
        };

        if wake {
            self.scheduler.wake();
        }
        debug!(handle = %handle, "Notification tracked");
        handle
    }

    fn remove_notification(&self, handle: NotificationHandle) {
        if self.core.notifications.lock().remove(handle).is_some() {
            debug!(handle = %handle, "Notification removed");
        }
    }

    fn terminate_mobile_request(&self, correlation_id: CorrelationId) {
        let removed = {
            let mut queue = self.core.queue.lock();
            queue.remove_where(|r| r.correlation_id() == correlation_id);
            let mut index = self.core.index.lock();
            index.remove(correlation_id, RequestKind::Mobile)
        };

        if let Some(entry) = removed {
            self.core.stats.terminated.fetch_add(1, Ordering::Relaxed);
            debug!(
                correlation_id = correlation_id,
                owner_id = entry.owner_id,
                "Mobile request terminated"
            );
        }
    }

    fn terminate_hmi_request(&self, correlation_id: CorrelationId) {
        let removed = self
            .core
            .index
            .lock()
            .remove(correlation_id, RequestKind::Hmi);

        if let Some(entry) = removed {
            self.core.stats.terminated.fetch_add(1, Ordering::Relaxed);
            debug!(
                correlation_id = correlation_id,
                owner_id = entry.owner_id,
                "HMI request terminated"
            );
        }
    }

    fn terminate_app_requests(&self, owner_id: OwnerId) {
        let (dequeued, removed) = {
            let mut queue = self.core.queue.lock();
            let dequeued = queue.remove_where(|r| r.owner_id() == owner_id);
            let mut index = self.core.index.lock();
            (dequeued, index.remove_owner(owner_id))
        };

        if !removed.is_empty() {
            ControllerStats::add(&self.core.stats.terminated, removed.len());
        }
        debug!(
            owner_id = owner_id,
            removed = removed.len(),
            dequeued = dequeued,
            "Application requests terminated"
        );
    }

    fn terminate_all_hmi_requests(&self) {
        let removed = self.core.index.lock().remove_kind(RequestKind::Hmi);

        if !removed.is_empty() {
            ControllerStats::add(&self.core.stats.terminated, removed.len());
        }
        debug!(removed = removed.len(), "All HMI requests terminated");
    }

    fn update_request_timeout(
        &self,
        owner_id: OwnerId,
        correlation_id: CorrelationId,
        new_timeout: Duration,
    ) {
        let deadline = deadline_after(self.core.clock.now(), new_timeout);

        let wake = {
            let mut index = self.core.index.lock();
            let owned = index
                .get(correlation_id, RequestKind::Mobile)
                .is_some_and(|e| e.owner_id == owner_id);
            if !owned {
                debug!(
                    correlation_id = correlation_id,
                    owner_id = owner_id,
                    "Timeout update for unknown request ignored"
                );
                return;
            }

            let wake = is_new_minimum(index.peek_min(), deadline);
            index.update_deadline(correlation_id, RequestKind::Mobile, deadline);
            wake
        };

        if wake {
            self.scheduler.wake();
        }
        debug!(
            correlation_id = correlation_id,
            owner_id = owner_id,
            timeout_ms = millis(new_timeout),
            "Request timeout updated"
        );
    }

    fn initialize_thread_pool(&self) -> ControllerResult<()> {
        self.pool.initialize(self.core.config.thread_pool_size)
    }

    fn destroy_thread_pool(&self) {
        self.pool.destroy();
    }

    fn pending_count(&self) -> usize {
        self.core.index.lock().len()
    }

    fn owner_pending_count(&self, owner_id: OwnerId) -> usize {
        self.core.index.lock().owner_count(owner_id)
    }

    fn queue_len(&self) -> usize {
        self.core.queue.len()
    }

    fn pool_state(&self) -> PoolState {
        self.pool.state()
    }

    fn stats(&self) -> StatsSnapshot {
        self.core.stats.snapshot()
    }
}

impl Drop for RequestController {
    fn drop(&mut self) {
        self.pool.destroy();
        self.scheduler.shutdown();
    }
}
