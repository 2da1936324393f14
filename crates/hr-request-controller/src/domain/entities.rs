//! Core domain entities for the request controller.
//!
//! Everything here is plain data. Time is always passed in explicitly as an
//! [`Instant`] so the structures built on top stay deterministic under test.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use uuid::Uuid;

/// Correlation ID pairing a request with its eventual response.
///
/// Zero is reserved and always rejected at admission.
pub type CorrelationId = u32;

/// Connection/session key of the application that owns a request.
pub type OwnerId = u32;

/// Which side of the relay a tracked request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    /// Originated by a connected application. Subject to admission and dispatch.
    Mobile,
    /// Issued by the middleware toward the HMI. Tracked for timeout only.
    Hmi,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Mobile => write!(f, "mobile"),
            RequestKind::Hmi => write!(f, "hmi"),
        }
    }
}

/// Visibility level of an application on the HMI.
///
/// Ordered from most to least visible. `None` means the application is not
/// foregrounded and falls under the stricter NONE-level rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VisibilityLevel {
    Full,
    Limited,
    Background,
    None,
}

impl VisibilityLevel {
    /// True when the application is not currently visible to the user.
    pub fn is_none(&self) -> bool {
        matches!(self, VisibilityLevel::None)
    }
}

impl fmt::Display for VisibilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VisibilityLevel::Full => write!(f, "FULL"),
            VisibilityLevel::Limited => write!(f, "LIMITED"),
            VisibilityLevel::Background => write!(f, "BACKGROUND"),
            VisibilityLevel::None => write!(f, "NONE"),
        }
    }
}

/// Unique key of a [`PendingEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryKey {
    pub correlation_id: CorrelationId,
    pub kind: RequestKind,
}

impl EntryKey {
    pub fn new(correlation_id: CorrelationId, kind: RequestKind) -> Self {
        Self {
            correlation_id,
            kind,
        }
    }

    pub fn mobile(correlation_id: CorrelationId) -> Self {
        Self::new(correlation_id, RequestKind::Mobile)
    }

    pub fn hmi(correlation_id: CorrelationId) -> Self {
        Self::new(correlation_id, RequestKind::Hmi)
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.correlation_id)
    }
}

/// A request awaiting its response, stored in the deadline index.
///
/// The payload is whatever the owner of the index needs to act on expiry;
/// the service stores the request capability itself.
#[derive(Debug, Clone)]
pub struct PendingEntry<T> {
    pub correlation_id: CorrelationId,
    pub owner_id: OwnerId,
    pub kind: RequestKind,
    /// Only recorded for mobile requests.
    pub visibility_level: Option<VisibilityLevel>,
    pub deadline: Instant,
    pub payload: T,
}

impl<T> PendingEntry<T> {
    pub fn key(&self) -> EntryKey {
        EntryKey::new(self.correlation_id, self.kind)
    }

    /// True once `now` has reached the deadline.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline <= now
    }
}

/// Opaque identity of a tracked HMI notification.
///
/// Minted at registration time (UUID v7, time-ordered) and used for removal
/// instead of reference identity. The nil UUID is never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationHandle(Uuid);

impl NotificationHandle {
    /// Mint a fresh handle.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Handle that never matches a registered notification.
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for NotificationHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NotificationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tracked notification and its expiry.
#[derive(Debug, Clone)]
pub struct NotificationEntry<T> {
    pub handle: NotificationHandle,
    pub deadline: Instant,
    pub payload: T,
}

/// Lifecycle of the worker pool.
///
/// ```text
/// [UNINITIALIZED] ──initialize──→ [RUNNING] ──destroy──→ [STOPPED]
///        │                                                  ↑
///        └──────────────────destroy─────────────────────────┘
/// ```
///
/// Transitions are monotonic; nothing ever leaves `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PoolState {
    #[default]
    Uninitialized,
    Running,
    Stopped,
}

impl PoolState {
    pub fn can_transition_to(&self, target: PoolState) -> bool {
        matches!(
            (self, target),
            (PoolState::Uninitialized, PoolState::Running)
                | (PoolState::Uninitialized, PoolState::Stopped)
                | (PoolState::Running, PoolState::Stopped)
        )
    }

    pub fn is_running(&self) -> bool {
        matches!(self, PoolState::Running)
    }
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolState::Uninitialized => write!(f, "uninitialized"),
            PoolState::Running => write!(f, "running"),
            PoolState::Stopped => write!(f, "stopped"),
        }
    }
}
