//! # Admission and Timeout Scenarios
//!
//! End-to-end behaviour of the controller as seen by the protocol layer:
//!
//! 1. **Backpressure**: a full pool rejects with `TOO_MANY_REQUESTS`
//! 2. **NONE-level cap**: applies only while the application is at NONE
//! 3. **HMI timeout**: fires exactly once and clears the entry
//! 4. **Bulk termination**: one application's requests, nobody else's

#[cfg(test)]
mod tests {
    use crate::fixtures::{controller, wait_until, TestNotification, TestRequest};
    use hr_request_controller::{
        AdmissionResult, ControllerConfig, RateLimitConfig, RequestControllerApi, RequestKind,
        VisibilityLevel,
    };
    use std::thread;
    use std::time::Duration;

    const OWNER_A: u32 = 0xA;
    const OWNER_B: u32 = 0xB;

    // =============================================================================
    // SCENARIO 1: POOL CAPACITY
    // =============================================================================

    #[test]
    fn test_scenario_pool_capacity_five() {
        let controller = controller(ControllerConfig {
            max_queue_length: 5,
            ..ControllerConfig::default()
        });

        for id in 1..=5 {
            assert_eq!(
                controller.add_mobile_request(TestRequest::new(id, id), VisibilityLevel::Full),
                AdmissionResult::Success
            );
        }
        assert_eq!(
            controller.add_mobile_request(TestRequest::new(6, 6), VisibilityLevel::Full),
            AdmissionResult::TooManyRequests
        );
    }

    #[test]
    fn test_capacity_frees_up_after_termination() {
        let controller = controller(ControllerConfig {
            max_queue_length: 2,
            ..ControllerConfig::default()
        });

        controller.add_mobile_request(TestRequest::new(1, 1), VisibilityLevel::Full);
        controller.add_mobile_request(TestRequest::new(2, 1), VisibilityLevel::Full);
        assert_eq!(
            controller.add_mobile_request(TestRequest::new(3, 1), VisibilityLevel::Full),
            AdmissionResult::TooManyRequests
        );

        controller.terminate_mobile_request(1);
        assert!(controller
            .add_mobile_request(TestRequest::new(3, 1), VisibilityLevel::Full)
            .is_success());
    }

    // =============================================================================
    // SCENARIO 2: NONE-LEVEL RATE CAP
    // =============================================================================

    #[test]
    fn test_scenario_none_level_cap() {
        let controller = controller(ControllerConfig {
            none_level_rate_limit: RateLimitConfig::new(Duration::from_secs(10), 1),
            ..ControllerConfig::default()
        });

        assert_eq!(
            controller.add_mobile_request(TestRequest::new(1, OWNER_A), VisibilityLevel::None),
            AdmissionResult::Success
        );
        assert_eq!(
            controller.add_mobile_request(TestRequest::new(2, OWNER_A), VisibilityLevel::None),
            AdmissionResult::NoneHmiLevelManyRequests
        );
        assert_eq!(
            controller.add_mobile_request(TestRequest::new(3, OWNER_A), VisibilityLevel::Full),
            AdmissionResult::Success
        );
    }

    #[test]
    fn test_rate_window_reopens_after_window_elapses() {
        let window = Duration::from_millis(300);
        let controller = controller(ControllerConfig {
            rate_limit: RateLimitConfig::new(window, 3),
            ..ControllerConfig::default()
        });

        for id in 1..=3 {
            assert!(controller
                .add_mobile_request(TestRequest::new(id, OWNER_A), VisibilityLevel::Full)
                .is_success());
        }
        assert_eq!(
            controller.add_mobile_request(TestRequest::new(4, OWNER_A), VisibilityLevel::Full),
            AdmissionResult::TooManyRequests
        );

        thread::sleep(window + Duration::from_millis(50));
        assert!(controller
            .add_mobile_request(TestRequest::new(5, OWNER_A), VisibilityLevel::Full)
            .is_success());
    }

    #[test]
    fn test_pending_limit_precedes_rate_limits() {
        let controller = controller(ControllerConfig {
            max_pending_per_owner: 1,
            none_level_rate_limit: RateLimitConfig::new(Duration::from_secs(10), 1),
            ..ControllerConfig::default()
        });

        controller.add_mobile_request(TestRequest::new(1, OWNER_A), VisibilityLevel::None);
        // Both the pending cap and the NONE cap would reject; pending wins
        assert_eq!(
            controller.add_mobile_request(TestRequest::new(2, OWNER_A), VisibilityLevel::None),
            AdmissionResult::TooManyPendingRequests
        );
    }

    // =============================================================================
    // SCENARIO 3: HMI TIMEOUT
    // =============================================================================

    #[test]
    fn test_scenario_hmi_timeout_fires_once() {
        let controller = controller(ControllerConfig::default());
        let request = TestRequest::with_timeout(42, OWNER_A, Duration::from_millis(500));

        assert!(controller.add_hmi_request(request.clone()).is_success());
        assert_eq!(request.timeouts(), 0);

        assert!(wait_until(Duration::from_secs(3), || request.timeouts() == 1));
        assert!(!controller.is_pending(42, RequestKind::Hmi));

        thread::sleep(Duration::from_millis(100));
        assert_eq!(request.timeouts(), 1);
    }

    #[test]
    fn test_earlier_deadline_wakes_sleeping_scheduler() {
        let controller = controller(ControllerConfig::default());
        let slow = TestRequest::with_timeout(1, OWNER_A, Duration::from_secs(30));
        let fast = TestRequest::with_timeout(2, OWNER_A, Duration::from_millis(100));

        controller.add_hmi_request(slow.clone());
        controller.add_hmi_request(fast.clone());

        assert!(wait_until(Duration::from_secs(2), || fast.timeouts() == 1));
        assert_eq!(slow.timeouts(), 0);
    }

    #[test]
    fn test_timeout_deferral() {
        let controller = controller(ControllerConfig::default());
        let request = TestRequest::with_timeout(7, OWNER_A, Duration::from_millis(200));

        controller.add_mobile_request(request.clone(), VisibilityLevel::Full);
        controller.update_request_timeout(OWNER_A, 7, Duration::from_millis(800));

        thread::sleep(Duration::from_millis(400));
        assert_eq!(request.timeouts(), 0);
        assert!(controller.is_pending(7, RequestKind::Mobile));

        assert!(wait_until(Duration::from_secs(3), || request.timeouts() == 1));
    }

    #[test]
    fn test_terminated_request_never_times_out() {
        let controller = controller(ControllerConfig::default());
        let request = TestRequest::with_timeout(9, OWNER_A, Duration::from_millis(100));

        controller.add_hmi_request(request.clone());
        controller.terminate_hmi_request(9);

        thread::sleep(Duration::from_millis(300));
        assert_eq!(request.timeouts(), 0);
    }

    #[test]
    fn test_notification_expires_unless_removed() {
        let controller = controller(ControllerConfig::default());
        let kept = TestNotification::with_timeout(Duration::from_millis(100));
        let removed = TestNotification::with_timeout(Duration::from_millis(100));

        controller.add_notification(kept.clone());
        let handle = controller.add_notification(removed.clone());
        controller.remove_notification(handle);

        assert!(wait_until(Duration::from_secs(2), || kept.timeouts() == 1));
        assert_eq!(removed.timeouts(), 0);
    }

    // =============================================================================
    // SCENARIO 4: BULK TERMINATION
    // =============================================================================

    #[test]
    fn test_scenario_terminate_app_requests() {
        let controller = controller(ControllerConfig::default());

        for id in 1..=3 {
            controller.add_mobile_request(TestRequest::new(id, OWNER_A), VisibilityLevel::Full);
        }
        for id in 4..=5 {
            controller.add_mobile_request(TestRequest::new(id, OWNER_B), VisibilityLevel::Full);
        }

        controller.terminate_app_requests(OWNER_A);

        assert_eq!(controller.owner_pending_count(OWNER_A), 0);
        assert_eq!(controller.owner_pending_count(OWNER_B), 2);
    }

    #[test]
    fn test_terminate_calls_are_idempotent() {
        let controller = controller(ControllerConfig::default());

        controller.add_mobile_request(TestRequest::new(1, OWNER_A), VisibilityLevel::Full);
        controller.add_hmi_request(TestRequest::new(2, OWNER_A));
        controller.add_hmi_request(TestRequest::new(3, OWNER_B));
        controller.add_mobile_request(TestRequest::new(4, OWNER_B), VisibilityLevel::Full);

        for _ in 0..2 {
            controller.terminate_mobile_request(1);
            controller.terminate_hmi_request(2);
            controller.terminate_all_hmi_requests();
            controller.terminate_app_requests(OWNER_A);
            controller.terminate_mobile_request(999);
        }

        assert_eq!(controller.pending_count(), 1);
        assert!(controller.is_pending(4, RequestKind::Mobile));
        assert_eq!(controller.stats().terminated, 3);
    }
}
