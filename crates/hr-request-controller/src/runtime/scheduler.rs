//! # Timeout Scheduler
//!
//! One dedicated thread that sleeps until the earliest known deadline, runs a
//! sweep, and goes back to sleep. It never busy-polls.
//!
//! The sweep itself is supplied by the owner as a closure: it receives `now`,
//! expires whatever is due (delivering callbacks with no lock held) and
//! returns the next deadline, or `None` to sleep until woken.
//!
//! ## Wakeups
//!
//! Inserting an entry with an earlier deadline than the current minimum must
//! call [`TimeoutScheduler::wake`]. A wake that arrives while a sweep is in
//! progress is latched in `wakeup_pending`, so it is never lost between the
//! sweep computing its next deadline and the thread going to sleep.

use crate::domain::{ControllerError, ControllerResult};
use crate::ports::TimeSource;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, info};

#[derive(Default)]
struct SignalState {
    stop: bool,
    wakeup_pending: bool,
}

#[derive(Default)]
struct Signal {
    state: Mutex<SignalState>,
    cv: Condvar,
}

/// Handle to the running scheduler thread.
pub struct TimeoutScheduler {
    signal: Arc<Signal>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TimeoutScheduler {
    /// Spawn the scheduler thread.
    pub fn spawn<F>(clock: Arc<dyn TimeSource>, sweep: F) -> ControllerResult<Self>
    where
        F: FnMut(Instant) -> Option<Instant> + Send + 'static,
    {
        let signal = Arc::new(Signal::default());
        let thread_signal = Arc::clone(&signal);
        let name = "hr-timeout-scheduler".to_string();

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_scheduler(thread_signal, clock, sweep))
            .map_err(|source| ControllerError::Spawn { name, source })?;

        info!("Timeout scheduler started");
        Ok(Self {
            signal,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Force an early sweep.
    pub fn wake(&self) {
        let mut state = self.signal.state.lock();
        state.wakeup_pending = true;
        self.signal.cv.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.handle.lock().is_some()
    }

    /// Stop the thread and wait for it to exit. Idempotent.
    ///
    /// Called from a timeout callback (i.e. on the scheduler thread itself)
    /// this only signals; the thread exits when the callback returns.
    pub fn shutdown(&self) {
        let Some(handle) = self.handle.lock().take() else {
            return;
        };

        {
            let mut state = self.signal.state.lock();
            state.stop = true;
            self.signal.cv.notify_all();
        }

        if handle.thread().id() == thread::current().id() {
            debug!("Timeout scheduler stopping itself");
            return;
        }
        if handle.join().is_err() {
            error!("Timeout scheduler thread panicked");
        }
        info!("Timeout scheduler stopped");
    }
}

impl Drop for TimeoutScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_scheduler<F>(signal: Arc<Signal>, clock: Arc<dyn TimeSource>, mut sweep: F)
where
    F: FnMut(Instant) -> Option<Instant>,
{
    loop {
        if signal.state.lock().stop {
            break;
        }

        let next = sweep(clock.now());

        let mut state = signal.state.lock();
        if state.stop {
            break;
        }
        if state.wakeup_pending {
            state.wakeup_pending = false;
            continue;
        }

        match next {
            Some(deadline) => {
                let now = clock.now();
                if deadline > now {
                    signal.cv.wait_for(&mut state, deadline - now);
                }
            }
            None => signal.cv.wait(&mut state),
        }
        state.wakeup_pending = false;
    }

    debug!("Timeout scheduler exiting");
}
