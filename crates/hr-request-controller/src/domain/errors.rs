//! Admission result codes and controller error types.
//!
//! Admission outcomes are values, not errors: the protocol layer turns a
//! rejection into a wire-level response. [`ControllerError`] covers the
//! operational failures (pool lifecycle misuse, thread spawn, configuration).

use super::config::ConfigError;
use super::entities::PoolState;
use std::fmt;

/// Result code returned synchronously by admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdmissionResult {
    /// Request accepted and tracked.
    Success,
    /// Pool capacity exhausted or the owner's global rate window is full.
    TooManyRequests,
    /// Owner already has the maximum number of pending entries.
    TooManyPendingRequests,
    /// Owner is at visibility level NONE and its NONE-level window is full.
    NoneHmiLevelManyRequests,
    /// Zero correlation id or duplicate mobile correlation id.
    InvalidData,
}

impl AdmissionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, AdmissionResult::Success)
    }

    /// Stable upper-case name, as reported to the protocol layer.
    pub fn as_str(&self) -> &'static str {
        match self {
            AdmissionResult::Success => "SUCCESS",
            AdmissionResult::TooManyRequests => "TOO_MANY_REQUESTS",
            AdmissionResult::TooManyPendingRequests => "TOO_MANY_PENDING_REQUESTS",
            AdmissionResult::NoneHmiLevelManyRequests => "NONE_HMI_LEVEL_MANY_REQUESTS",
            AdmissionResult::InvalidData => "INVALID_DATA",
        }
    }
}

impl fmt::Display for AdmissionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operational errors of the request controller.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// Configuration rejected by validation.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pool lifecycle transition not allowed from the current state.
    #[error("invalid pool transition: {from} -> {to}")]
    InvalidPoolTransition { from: PoolState, to: PoolState },

    /// OS refused to spawn a worker or scheduler thread.
    #[error("failed to spawn {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for controller operations.
pub type ControllerResult<T> = Result<T, ControllerError>;
