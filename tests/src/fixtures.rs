//! Test fixtures shared by the integration suites.

use hr_request_controller::{
    ControllerConfig, CorrelationId, Notification, OwnerId, Request, RequestController,
    RequestControllerApi,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

/// What a [`TestRequest`] does when it is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnInvoke {
    Nothing,
    Sleep(Duration),
    /// Call `terminate_mobile_request` on itself.
    TerminateSelf,
}

/// Request that records every callback it receives.
pub struct TestRequest {
    pub id: CorrelationId,
    pub owner: OwnerId,
    pub timeout: Option<Duration>,
    pub on_invoke: OnInvoke,
    pub invoked: AtomicUsize,
    pub timed_out: AtomicUsize,
    /// Requests currently inside `invoke()`, shared across a batch
    pub active: Arc<AtomicUsize>,
    controller: Mutex<Weak<RequestController>>,
}

impl TestRequest {
    pub fn new(id: CorrelationId, owner: OwnerId) -> Arc<Self> {
        Self::build(id, owner, None, OnInvoke::Nothing)
    }

    pub fn with_timeout(id: CorrelationId, owner: OwnerId, timeout: Duration) -> Arc<Self> {
        Self::build(id, owner, Some(timeout), OnInvoke::Nothing)
    }

    pub fn build(
        id: CorrelationId,
        owner: OwnerId,
        timeout: Option<Duration>,
        on_invoke: OnInvoke,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            owner,
            timeout,
            on_invoke,
            invoked: AtomicUsize::new(0),
            timed_out: AtomicUsize::new(0),
            active: Arc::new(AtomicUsize::new(0)),
            controller: Mutex::new(Weak::new()),
        })
    }

    /// Request that sleeps in `invoke()`, reporting into a shared `active` gauge.
    pub fn sleeping(
        id: CorrelationId,
        owner: OwnerId,
        sleep: Duration,
        active: &Arc<AtomicUsize>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            owner,
            timeout: None,
            on_invoke: OnInvoke::Sleep(sleep),
            invoked: AtomicUsize::new(0),
            timed_out: AtomicUsize::new(0),
            active: Arc::clone(active),
            controller: Mutex::new(Weak::new()),
        })
    }

    /// Give the request a way back into the controller.
    pub fn attach(&self, controller: &Arc<RequestController>) {
        *self.controller.lock() = Arc::downgrade(controller);
    }

    pub fn invocations(&self) -> usize {
        self.invoked.load(Ordering::SeqCst)
    }

    pub fn timeouts(&self) -> usize {
        self.timed_out.load(Ordering::SeqCst)
    }
}

impl Request for TestRequest {
    fn correlation_id(&self) -> CorrelationId {
        self.id
    }

    fn owner_id(&self) -> OwnerId {
        self.owner
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn invoke(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
        self.invoked.fetch_add(1, Ordering::SeqCst);

        match self.on_invoke {
            OnInvoke::Nothing => {}
            OnInvoke::Sleep(d) => thread::sleep(d),
            OnInvoke::TerminateSelf => {
                let controller = self.controller.lock().upgrade();
                if let Some(controller) = controller {
                    controller.terminate_mobile_request(self.id);
                }
            }
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    fn on_timeout(&self) {
        self.timed_out.fetch_add(1, Ordering::SeqCst);
    }
}

/// Notification that counts its timeouts.
#[derive(Default)]
pub struct TestNotification {
    pub timeout: Option<Duration>,
    pub timed_out: AtomicUsize,
}

impl TestNotification {
    pub fn with_timeout(timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            timeout: Some(timeout),
            timed_out: AtomicUsize::new(0),
        })
    }

    pub fn timeouts(&self) -> usize {
        self.timed_out.load(Ordering::SeqCst)
    }
}

impl Notification for TestNotification {
    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn on_timeout(&self) {
        self.timed_out.fetch_add(1, Ordering::SeqCst);
    }
}

/// Controller with logging hooked up to the test harness.
pub fn controller(config: ControllerConfig) -> Arc<RequestController> {
    hr_telemetry::init_test_logging();
    match RequestController::new(config) {
        Ok(controller) => Arc::new(controller),
        Err(e) => panic!("controller construction failed: {e}"),
    }
}

/// Poll `cond` until it holds or `limit` elapses.
pub fn wait_until(limit: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < limit {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}
