//! Domain layer for the request controller.
//!
//! Pure data structures with no threads and no locks. Every time-dependent
//! operation takes `now` explicitly; the runtime layer owns the clock.

pub mod config;
pub mod deadline_index;
pub mod entities;
pub mod errors;
pub mod notifications;
pub mod rate_limiter;
pub mod stats;

// Re-exports for convenience
pub use config::{ConfigError, ControllerConfig, RateLimitConfig};
pub use deadline_index::DeadlineIndex;
pub use entities::*;
pub use errors::{AdmissionResult, ControllerError, ControllerResult};
pub use notifications::NotificationTable;
pub use rate_limiter::{RateLimiter, RateScope};
pub use stats::{ControllerStats, StatsSnapshot};
