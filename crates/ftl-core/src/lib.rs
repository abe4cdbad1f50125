//! FTL Comms Core - event contract and protocol capability surface
//!
//! This crate provides what every wire protocol shares:
//! - The closed set of events a protocol may deliver to the host application
//! - An event bus with per-kind listeners and a broadcast stream
//! - The `CommsProtocol` trait concrete protocols implement

pub mod bus;
pub mod error;
pub mod event;
pub mod protocol;

pub use bus::{EventBus, Listener, ListenerId};
pub use error::{Error, Result};
pub use event::{Event, EventKind};
pub use protocol::{CommsProtocol, Lifecycle};
