//! # Lifecycle Tests
//!
//! Pool and scheduler start/stop guarantees:
//!
//! - `destroy_thread_pool` returns only after every worker has exited
//! - a running request may query the pool while it is being destroyed
//! - requests discarded by teardown still time out
//! - stopping the scheduler stops timeout delivery
//! - dropping the controller stops everything

#[cfg(test)]
mod tests {
    use crate::fixtures::{controller, wait_until, TestRequest};
    use hr_request_controller::{
        ControllerConfig, ControllerError, PoolState, Request, RequestController,
        RequestControllerApi, VisibilityLevel,
    };
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc, Weak};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_pool_state_is_monotonic() {
        let controller = controller(ControllerConfig::default());
        assert_eq!(controller.pool_state(), PoolState::Uninitialized);

        controller.initialize_thread_pool().unwrap();
        assert_eq!(controller.pool_state(), PoolState::Running);
        assert!(matches!(
            controller.initialize_thread_pool(),
            Err(ControllerError::InvalidPoolTransition { .. })
        ));

        controller.destroy_thread_pool();
        controller.destroy_thread_pool();
        assert_eq!(controller.pool_state(), PoolState::Stopped);
        assert!(controller.initialize_thread_pool().is_err());
    }

    #[test]
    fn test_destroy_waits_for_running_workers() {
        let controller = controller(ControllerConfig {
            thread_pool_size: 3,
            ..ControllerConfig::default()
        });
        let active = Arc::new(AtomicUsize::new(0));
        controller.initialize_thread_pool().unwrap();

        let requests: Vec<_> = (1..=6)
            .map(|id| TestRequest::sleeping(id, 1, Duration::from_millis(100), &active))
            .collect();
        for request in &requests {
            controller.add_mobile_request(request.clone(), VisibilityLevel::Full);
        }

        assert!(wait_until(Duration::from_secs(2), || active.load(Ordering::SeqCst) > 0));
        controller.destroy_thread_pool();

        assert_eq!(active.load(Ordering::SeqCst), 0);
        let invoked: usize = requests.iter().map(|r| r.invocations()).sum();
        let discarded = controller.stats().discarded_on_shutdown as usize;
        assert_eq!(invoked + discarded, requests.len());
    }

    /// Polls `pool_state()` from inside `invoke()` until it reads `Stopped`.
    struct PoolWatcher {
        controller: Mutex<Weak<RequestController>>,
        started: Mutex<Option<mpsc::Sender<()>>>,
        last_seen: Mutex<Option<PoolState>>,
    }

    impl Request for PoolWatcher {
        fn correlation_id(&self) -> u32 {
            1
        }
        fn owner_id(&self) -> u32 {
            1
        }
        fn invoke(&self) {
            if let Some(tx) = self.started.lock().take() {
                let _ = tx.send(());
            }
            let Some(controller) = self.controller.lock().upgrade() else {
                return;
            };
            for _ in 0..300 {
                let state = controller.pool_state();
                *self.last_seen.lock() = Some(state);
                if state == PoolState::Stopped {
                    break;
                }
                thread::sleep(Duration::from_millis(10));
            }
        }
        fn on_timeout(&self) {}
    }

    #[test]
    fn test_invoke_may_read_pool_state_during_destroy() {
        let controller = controller(ControllerConfig::default());
        let (started_tx, started_rx) = mpsc::channel();
        let watcher = Arc::new(PoolWatcher {
            controller: Mutex::new(Arc::downgrade(&controller)),
            started: Mutex::new(Some(started_tx)),
            last_seen: Mutex::new(None),
        });

        controller.initialize_thread_pool().unwrap();
        assert!(controller
            .add_mobile_request(watcher.clone(), VisibilityLevel::Full)
            .is_success());
        started_rx.recv_timeout(Duration::from_secs(3)).unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        let destroyer = {
            let controller = Arc::clone(&controller);
            thread::spawn(move || {
                controller.destroy_thread_pool();
                let _ = done_tx.send(());
            })
        };

        assert!(done_rx.recv_timeout(Duration::from_secs(3)).is_ok());
        destroyer.join().unwrap();
        assert_eq!(*watcher.last_seen.lock(), Some(PoolState::Stopped));
        assert_eq!(controller.pool_state(), PoolState::Stopped);
    }

    #[test]
    fn test_discarded_requests_still_time_out() {
        let controller = controller(ControllerConfig::default());
        let request = TestRequest::with_timeout(1, 1, Duration::from_millis(100));

        controller.add_mobile_request(request.clone(), VisibilityLevel::Full);
        controller.destroy_thread_pool();
        assert_eq!(controller.queue_len(), 0);
        assert_eq!(controller.stats().discarded_on_shutdown, 1);

        assert!(wait_until(Duration::from_secs(2), || request.timeouts() == 1));
        assert_eq!(request.invocations(), 0);
    }

    #[test]
    fn test_scheduler_shutdown_stops_timeouts() {
        let controller = controller(ControllerConfig::default());
        let request = TestRequest::with_timeout(1, 1, Duration::from_millis(50));

        controller.add_hmi_request(request.clone());
        controller.shutdown_scheduler();
        assert!(!controller.is_scheduler_running());

        thread::sleep(Duration::from_millis(150));
        assert_eq!(request.timeouts(), 0);
        assert_eq!(controller.pending_count(), 1);
    }

    #[test]
    fn test_drop_stops_workers_and_scheduler() {
        hr_telemetry::init_test_logging();
        let controller = RequestController::new(ControllerConfig {
            thread_pool_size: 2,
            ..ControllerConfig::default()
        })
        .unwrap();
        controller.initialize_thread_pool().unwrap();

        let request = TestRequest::with_timeout(1, 1, Duration::from_millis(50));
        controller.add_hmi_request(request.clone());
        drop(controller);

        thread::sleep(Duration::from_millis(150));
        assert_eq!(request.timeouts(), 0);
    }
}
