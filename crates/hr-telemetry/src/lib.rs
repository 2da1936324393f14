//! # HR Telemetry
//!
//! Structured logging for the HMI relay, built on `tracing-subscriber`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use hr_telemetry::{init_logging, TelemetryConfig};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     init_logging(&config).expect("Failed to init logging");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `HR_SERVICE_NAME` | `hmi-relay` | Service name in logs |
//! | `HR_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `HR_CONSOLE_OUTPUT` | `true` | Console output on/off |
//! | `HR_JSON_LOGS` | `false` | JSON formatted logs |

#![allow(missing_docs)]

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::{init_logging, init_test_logging};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("Global subscriber already installed: {0}")]
    AlreadyInitialized(String),
}
