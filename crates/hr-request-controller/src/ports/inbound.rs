//! # Inbound Port - RequestControllerApi
//!
//! Primary driving port called by the connection/protocol layer, from any
//! number of threads at once.
//!
//! | Method | Returns |
//! |--------|---------|
//! | `add_mobile_request` | `AdmissionResult` (all five codes) |
//! | `add_hmi_request` | `Success` or `InvalidData` |
//! | `add_notification` | `NotificationHandle` |
//! | `terminate_*`, `remove_notification` | nothing; idempotent |
//! | `initialize_thread_pool` | `ControllerResult<()>` |

use super::outbound::{NotificationPtr, RequestPtr};
use crate::domain::{
    AdmissionResult, ControllerResult, CorrelationId, NotificationHandle, OwnerId, PoolState,
    StatsSnapshot, VisibilityLevel,
};
use std::time::Duration;

/// Public API of the request controller.
///
/// # Example
///
/// ```rust,ignore
/// use hr_request_controller::{RequestController, RequestControllerApi, VisibilityLevel};
///
/// let controller = RequestController::new(config)?;
/// controller.initialize_thread_pool()?;
///
/// match controller.add_mobile_request(request, VisibilityLevel::Full) {
///     AdmissionResult::Success => {}
///     rejected => send_error_response(rejected),
/// }
/// ```
pub trait RequestControllerApi: Send + Sync {
    /// Admit an application request for dispatch and timeout tracking.
    ///
    /// Never blocks on capacity; a full pool is reported as
    /// `TooManyRequests`.
    fn add_mobile_request(
        &self,
        request: RequestPtr,
        visibility_level: VisibilityLevel,
    ) -> AdmissionResult;

    /// Track an HMI request for timeout only. It is not queued for dispatch.
    fn add_hmi_request(&self, request: RequestPtr) -> AdmissionResult;

    /// Track a notification until it is removed or expires.
    fn add_notification(&self, notification: NotificationPtr) -> NotificationHandle;

    /// Stop tracking a notification. Unknown handles are ignored.
    fn remove_notification(&self, handle: NotificationHandle);

    /// Stop tracking a mobile request and drop it from the queue if undispatched.
    fn terminate_mobile_request(&self, correlation_id: CorrelationId);

    /// Stop tracking an HMI request.
    fn terminate_hmi_request(&self, correlation_id: CorrelationId);

    /// Remove every entry (both kinds) owned by an application.
    fn terminate_app_requests(&self, owner_id: OwnerId);

    /// Remove every HMI entry.
    fn terminate_all_hmi_requests(&self);

    /// Reset a mobile request's deadline to `now + new_timeout`.
    ///
    /// No-op unless a mobile entry with this id belongs to `owner_id`.
    fn update_request_timeout(
        &self,
        owner_id: OwnerId,
        correlation_id: CorrelationId,
        new_timeout: Duration,
    );

    /// Spawn the configured number of workers.
    ///
    /// # Errors
    /// - `InvalidPoolTransition`: pool is already running or stopped
    /// - `Spawn`: the OS refused a worker thread
    fn initialize_thread_pool(&self) -> ControllerResult<()>;

    /// Stop and join every worker. Queued requests are discarded uninvoked.
    fn destroy_thread_pool(&self);

    /// Live pending entries (mobile and HMI).
    fn pending_count(&self) -> usize;

    /// Live pending entries owned by `owner_id`.
    fn owner_pending_count(&self, owner_id: OwnerId) -> usize;

    /// Requests queued and not yet picked up by a worker.
    fn queue_len(&self) -> usize;

    fn pool_state(&self) -> PoolState;

    fn stats(&self) -> StatsSnapshot;
}
