//! FTL Transport Layer
//!
//! Provides the built-in TCP transport for the simple line protocol:
//! - Listener and per-connection sessions
//! - Line reassembly and command dispatch
//! - Delivery of robot-to-client lines

pub mod config;
pub mod handler;
mod registry;
pub mod tcp;

pub use config::{DeliveryPolicy, ServerConfig, DEFAULT_PORT};
pub use handler::ConnectionHandler;
pub use tcp::SimpleProtocol;
