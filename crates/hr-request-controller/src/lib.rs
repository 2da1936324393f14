// Allow missing docs for internal items in development
#![allow(missing_docs)]

//! # HR Request Controller
//!
//! Request lifecycle governor for the HMI relay: admission control,
//! per-application rate limiting, bounded worker dispatch and timeout
//! scheduling for every in-flight request.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │                        REQUEST CONTROLLER                             │
//! ├───────────────────────────────────────────────────────────────────────┤
//! │   protocol layer threads                                              │
//! │          │                                                            │
//! │  ┌───────┴──────────────────────────────────┐                         │
//! │  │  Admission                                │                         │
//! │  │  Validate → Capacity → Pending → Rate     │                         │
//! │  └───────┬───────────────────────┬───────────┘                         │
//! │          │                       │                                    │
//! │  ┌───────┴───────┐       ┌───────┴────────┐      ┌──────────────────┐  │
//! │  │  Work Queue   │       │ Deadline Index │      │ Notification     │  │
//! │  │  (FIFO)       │       │ (BTreeSet)     │      │ Table            │  │
//! │  └───────┬───────┘       └───────┬────────┘      └────────┬─────────┘  │
//! │          │                       └──────────┬─────────────┘            │
//! │  ┌───────┴───────┐                  ┌───────┴────────┐                 │
//! │  │ Worker Pool   │                  │ Timeout        │                 │
//! │  │ invoke()      │                  │ Scheduler      │                 │
//! │  └───────────────┘                  │ on_timeout()   │                 │
//! │                                     └────────────────┘                 │
//! └───────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//!
//! | Invariant | Enforced by |
//! |-----------|-------------|
//! | One pending entry per `(correlation_id, kind)` | `DeadlineIndex::insert` replaces |
//! | `peek_min()` is the true earliest deadline | ordered `BTreeSet` |
//! | Rate windows only hold timestamps inside the window | lazy prune on every check |
//! | `invoke()` at most once | pop under the queue lock |
//! | `on_timeout()` at most once, never after terminate | removal from the index decides |
//! | Pool state only moves forward | `PoolState::can_transition_to` |
//!
//! ## Module Structure
//!
//! ```text
//! hr-request-controller/
//! ├── domain/          # Pure data structures, explicit `now`
//! │   ├── entities     # Keys, entries, handles, pool state
//! │   ├── errors       # AdmissionResult, ControllerError
//! │   ├── config       # ControllerConfig
//! │   ├── rate_limiter # Sliding-window log
//! │   ├── deadline_index
//! │   ├── notifications
//! │   └── stats
//! ├── ports/
//! │   ├── inbound      # RequestControllerApi
//! │   └── outbound     # Request, Notification, TimeSource
//! ├── runtime/
//! │   ├── worker_pool
//! │   └── scheduler
//! └── service          # RequestController
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use hr_request_controller::{ControllerConfig, RequestController, RequestControllerApi};
//!
//! let controller = RequestController::new(ControllerConfig::default())?;
//! controller.initialize_thread_pool()?;
//!
//! let result = controller.add_mobile_request(request, VisibilityLevel::Full);
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod domain;
pub mod ports;
pub mod runtime;
pub mod service;

// Re-exports for public API
pub use domain::{
    AdmissionResult, ConfigError, ControllerConfig, ControllerError, ControllerResult,
    ControllerStats, CorrelationId, DeadlineIndex, EntryKey, NotificationHandle,
    NotificationTable, OwnerId, PendingEntry, PoolState, RateLimitConfig, RateLimiter, RateScope,
    RequestKind, StatsSnapshot, VisibilityLevel,
};
pub use ports::{
    Notification, NotificationPtr, Request, RequestControllerApi, RequestPtr, SystemTimeSource,
    TimeSource,
};
pub use service::RequestController;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
