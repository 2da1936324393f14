//! # Worker Pool - Bounded Dispatch of Admitted Mobile Requests
//!
//! A FIFO [`WorkQueue`] shared with a fixed set of long-lived worker threads.
//!
//! ## Worker Loop
//!
//! 1. Wait on the queue condvar until an item is available or stop is set
//! 2. Stop set and queue empty: exit
//! 3. Pop one request, bump `executing`, release the lock
//! 4. `invoke()` with no lock held, then drop `executing`
//!
//! ## Shutdown
//!
//! `destroy()` sets stop, discards everything still queued, wakes every
//! worker and joins them all before returning. The pool lock is released
//! before joining, so a worker inside `invoke()` may still query or tear
//! down the pool. A second caller waits until the first has joined every
//! worker; a worker calling `destroy()` on its own pool returns at once.

use crate::domain::{ControllerError, ControllerResult, ControllerStats, PoolState};
use crate::ports::RequestPtr;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use tracing::{debug, error, info, warn};

/// Queue contents guarded by the [`WorkQueue`] lock.
#[derive(Default)]
pub struct QueueState {
    items: VecDeque<RequestPtr>,
    /// Requests popped by a worker and still inside `invoke()`
    executing: usize,
    stop: bool,
}

impl QueueState {
    /// Queued plus executing; the figure checked against the capacity bound.
    pub fn load(&self) -> usize {
        self.items.len() + self.executing
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn executing(&self) -> usize {
        self.executing
    }

    pub fn is_stopped(&self) -> bool {
        self.stop
    }

    /// Append a request. Returns `false` (and drops nothing) once stopped.
    pub fn push(&mut self, request: RequestPtr) -> bool {
        if self.stop {
            return false;
        }
        self.items.push_back(request);
        true
    }

    /// Drop every queued request matching `pred`. Returns how many went.
    pub fn remove_where<F>(&mut self, mut pred: F) -> usize
    where
        F: FnMut(&RequestPtr) -> bool,
    {
        let before = self.items.len();
        self.items.retain(|r| !pred(r));
        before - self.items.len()
    }
}

/// FIFO of admitted mobile requests awaiting a worker.
#[derive(Default)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the queue. Callers that also need the deadline index must take
    /// this lock first.
    pub fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock()
    }

    /// Wake one idle worker. Call after releasing the guard used to push.
    pub fn notify_one(&self) {
        self.available.notify_one();
    }

    pub fn len(&self) -> usize {
        self.state.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().is_empty()
    }

    fn next(&self) -> Option<RequestPtr> {
        let mut state = self.state.lock();
        loop {
            if let Some(request) = state.items.pop_front() {
                state.executing += 1;
                return Some(request);
            }
            if state.stop {
                return None;
            }
            self.available.wait(&mut state);
        }
    }

    fn finish(&self) {
        let mut state = self.state.lock();
        state.executing = state.executing.saturating_sub(1);
    }
}

/// Releases the `executing` slot even if `invoke()` unwinds.
struct ExecutingGuard<'a>(&'a WorkQueue);

impl Drop for ExecutingGuard<'_> {
    fn drop(&mut self) {
        self.0.finish();
    }
}

struct PoolInner {
    state: PoolState,
    handles: Vec<JoinHandle<()>>,
    /// Worker thread ids, kept until every worker has been joined
    workers: Vec<ThreadId>,
    /// A destroyer is joining workers outside the lock
    joining: bool,
}

/// Fixed-size worker thread pool.
///
/// State transitions are checked under the same lock that owns the join
/// handles, so "is the pool running" is never read torn. Joining happens
/// with that lock released.
pub struct WorkerPool {
    queue: Arc<WorkQueue>,
    stats: Arc<ControllerStats>,
    inner: Mutex<PoolInner>,
    joined: Condvar,
}

impl WorkerPool {
    pub fn new(queue: Arc<WorkQueue>, stats: Arc<ControllerStats>) -> Self {
        Self {
            queue,
            stats,
            inner: Mutex::new(PoolInner {
                state: PoolState::Uninitialized,
                handles: Vec::new(),
                workers: Vec::new(),
                joining: false,
            }),
            joined: Condvar::new(),
        }
    }

    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }

    pub fn state(&self) -> PoolState {
        self.inner.lock().state
    }

    pub fn worker_count(&self) -> usize {
        self.inner.lock().handles.len()
    }

    /// `Uninitialized -> Running`, spawning `workers` threads.
    ///
    /// If any spawn fails, already-started workers are stopped and joined and
    /// the pool stays `Uninitialized`.
    pub fn initialize(&self, workers: usize) -> ControllerResult<()> {
        let mut inner = self.inner.lock();

        if !inner.state.can_transition_to(PoolState::Running) {
            return Err(ControllerError::InvalidPoolTransition {
                from: inner.state,
                to: PoolState::Running,
            });
        }
        if workers == 0 {
            return Err(crate::domain::ConfigError::InvalidPoolSize.into());
        }

        let mut handles = Vec::with_capacity(workers);
        for i in 0..workers {
            let queue = Arc::clone(&self.queue);
            let stats = Arc::clone(&self.stats);
            let name = format!("hr-worker-{i}");

            match thread::Builder::new()
                .name(name.clone())
                .spawn(move || run_worker(queue, stats))
            {
                Ok(handle) => handles.push(handle),
                Err(source) => {
                    error!(worker = %name, error = %source, "Failed to spawn worker");
                    self.abort_spawn(handles);
                    return Err(ControllerError::Spawn { name, source });
                }
            }
        }

        inner.workers = handles.iter().map(|h| h.thread().id()).collect();
        inner.handles = handles;
        inner.state = PoolState::Running;
        info!(workers = workers, "Worker pool started");
        Ok(())
    }

    /// Stop every worker and wait for all of them to exit.
    ///
    /// Returns the number of queued requests discarded. A pool that is not
    /// running only records the move to `Stopped`.
    pub fn destroy(&self) -> usize {
        let current = thread::current().id();

        let (handles, discarded) = {
            let mut inner = self.inner.lock();

            match inner.state {
                PoolState::Stopped => {
                    // A worker cannot wait for its own join
                    if !inner.workers.contains(&current) {
                        while inner.joining {
                            self.joined.wait(&mut inner);
                        }
                    }
                    debug!("Worker pool already stopped");
                    return 0;
                }
                PoolState::Uninitialized => {
                    debug!("Destroying worker pool that was never started");
                }
                PoolState::Running => {}
            }

            let discarded = {
                let mut queue = self.queue.lock();
                queue.stop = true;
                let discarded = queue.items.len();
                queue.items.clear();
                discarded
            };

            inner.state = PoolState::Stopped;
            inner.joining = true;
            (std::mem::take(&mut inner.handles), discarded)
        };
        self.queue.available.notify_all();

        if discarded > 0 {
            ControllerStats::add(&self.stats.discarded_on_shutdown, discarded);
            warn!(discarded = discarded, "Discarded queued requests on pool shutdown");
        }

        for handle in handles {
            // A worker tearing down its own pool cannot join itself; it exits
            // once its invoke() returns.
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                error!("Worker thread panicked during shutdown");
            }
        }

        {
            let mut inner = self.inner.lock();
            inner.joining = false;
            inner.workers.clear();
        }
        self.joined.notify_all();

        info!("Worker pool stopped");
        discarded
    }

    fn abort_spawn(&self, handles: Vec<JoinHandle<()>>) {
        self.queue.lock().stop = true;
        self.queue.available.notify_all();
        for handle in handles {
            let _ = handle.join();
        }
        self.queue.lock().stop = false;
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn run_worker(queue: Arc<WorkQueue>, stats: Arc<ControllerStats>) {
    debug!("Worker started");

    while let Some(request) = queue.next() {
        let _slot = ExecutingGuard(&queue);
        stats.dispatched.fetch_add(1, Ordering::Relaxed);

        let correlation_id = request.correlation_id();
        debug!(
            correlation_id = correlation_id,
            owner_id = request.owner_id(),
            "Dispatching request"
        );

        if catch_unwind(AssertUnwindSafe(|| request.invoke())).is_err() {
            error!(correlation_id = correlation_id, "Request panicked during invoke");
        }
    }

    debug!("Worker exiting");
}
