//! Ports layer for the request controller.
//!
//! - Inbound (Driving) port: the API called by the protocol layer
//! - Outbound (Driven) ports: request/notification capabilities and the clock

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
