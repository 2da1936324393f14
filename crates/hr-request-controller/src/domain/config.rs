//! Request controller configuration with validation.
//!
//! Loaded by the host middleware (profile/INI/JSON, whatever it uses) and
//! consumed here as plain values. Durations serialize as humantime strings
//! (`"10s"`, `"500ms"`, `"2m"`, `"1500ns"`).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main controller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Worker threads spawned by `initialize_thread_pool`
    pub thread_pool_size: usize,
    /// Pool capacity bound: queued plus executing mobile requests (0 = unlimited)
    pub max_queue_length: usize,
    /// Pending entries (mobile + HMI) per owner (0 = unlimited)
    pub max_pending_per_owner: usize,
    /// Global per-owner admission window
    pub rate_limit: RateLimitConfig,
    /// Stricter window applied while the owner is at visibility level NONE
    pub none_level_rate_limit: RateLimitConfig,
    /// Timeout applied when a request or notification carries none
    #[serde(with = "humantime_serde")]
    pub default_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            thread_pool_size: 1,
            max_queue_length: 5000,
            max_pending_per_owner: 1000,
            rate_limit: RateLimitConfig {
                window: Duration::from_secs(10),
                max_requests: 1000,
            },
            none_level_rate_limit: RateLimitConfig {
                window: Duration::from_secs(10),
                max_requests: 100,
            },
            default_timeout: Duration::from_secs(10),
        }
    }
}

impl ControllerConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thread_pool_size == 0 {
            return Err(ConfigError::InvalidPoolSize);
        }

        if self.default_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "default_timeout cannot be 0".into(),
            ));
        }

        Ok(())
    }

    /// Resolve an optional per-request timeout against the default.
    pub fn timeout_or_default(&self, timeout: Option<Duration>) -> Duration {
        timeout.unwrap_or(self.default_timeout)
    }
}

/// Sliding-window rate limit: at most `max_requests` admissions per `window`.
///
/// A zero window or zero `max_requests` disables the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    pub max_requests: u32,
}

impl RateLimitConfig {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
        }
    }

    /// Limit that never rejects.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, 0)
    }

    pub fn is_enabled(&self) -> bool {
        !self.window.is_zero() && self.max_requests > 0
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Worker pool would have no threads
    #[error("thread_pool_size cannot be 0")]
    InvalidPoolSize,
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
}

/// Humantime serde module for Duration serialization
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let nanos = duration.subsec_nanos();
        if nanos == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else if nanos % 1_000_000 == 0 {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        } else {
            serializer.serialize_str(&format!("{}ns", duration.as_nanos()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    /// `count` units of `1/per_sec` seconds, or `None` past `Duration::MAX`.
    fn from_units(count: u128, per_sec: u128) -> Option<Duration> {
        let secs = u64::try_from(count / per_sec).ok()?;
        let nanos = u32::try_from((count % per_sec) * (1_000_000_000 / per_sec)).ok()?;
        Some(Duration::new(secs, nanos))
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        // "ns" and "ms" must be tried before the bare 's' and 'm' suffixes.
        if let Some(ns) = s.strip_suffix("ns") {
            ns.trim()
                .parse::<u128>()
                .ok()
                .and_then(|n| from_units(n, 1_000_000_000))
                .ok_or("invalid nanoseconds")
        } else if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u128>()
                .ok()
                .and_then(|n| from_units(n, 1_000))
                .ok_or("invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.trim()
                .parse::<u64>()
                .ok()
                .and_then(|m| m.checked_mul(60))
                .map(Duration::from_secs)
                .ok_or("invalid minutes")
        } else {
            // Try parsing as plain seconds
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid duration format")
        }
    }
}
