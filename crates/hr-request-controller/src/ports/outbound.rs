//! Outbound (Driven) ports for the request controller.
//!
//! Capabilities supplied by the protocol layer. The controller never looks
//! inside a request; it only needs identity, ownership, an optional timeout
//! and the two callbacks.

use crate::domain::{CorrelationId, OwnerId};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A request relayed between an application and the HMI.
///
/// `invoke()` and `on_timeout()` are always called with no controller lock
/// held, so implementations may call back into the controller (for example
/// to terminate themselves).
pub trait Request: Send + Sync {
    /// Correlation ID pairing this request with its response. Must be nonzero.
    fn correlation_id(&self) -> CorrelationId;

    /// Connection/session key of the owning application.
    fn owner_id(&self) -> OwnerId;

    /// Per-request timeout. `None` applies the configured default.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Execute the request. Called at most once, on a worker thread.
    fn invoke(&self);

    /// No response arrived in time. Called at most once, on the scheduler thread.
    fn on_timeout(&self);
}

/// An HMI notification with an expiry.
pub trait Notification: Send + Sync {
    /// Lifetime of the notification. `None` applies the configured default.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// The notification expired before being removed.
    fn on_timeout(&self);
}

/// Shared request capability.
pub type RequestPtr = Arc<dyn Request>;

/// Shared notification capability.
pub type NotificationPtr = Arc<dyn Notification>;

/// Monotonic clock abstraction.
///
/// Abstracted to allow testing with deterministic time.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
}

/// Default system time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for testing.
#[cfg(test)]
pub struct MockTimeSource {
    base: Instant,
    offset_ms: std::sync::atomic::AtomicU64,
}

#[cfg(test)]
impl Default for MockTimeSource {
    fn default() -> Self {
        Self {
            base: Instant::now(),
            offset_ms: std::sync::atomic::AtomicU64::new(0),
        }
    }
}

#[cfg(test)]
impl MockTimeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        let ms = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.offset_ms
            .fetch_add(ms, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
impl TimeSource for MockTimeSource {
    fn now(&self) -> Instant {
        self.base
            + Duration::from_millis(self.offset_ms.load(std::sync::atomic::Ordering::SeqCst))
    }
}
