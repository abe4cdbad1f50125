//! FTL Comms
//!
//! Pluggable communications between a control client and a robot host.
//! Implement [`ProtocolInterface`] for a new wire protocol, or use the
//! built-in line protocol from [`standard`].
//!
//! ```no_run
//! use ftl_comms::{standard::FtlSimpleProtocol, EventKind, ProtocolInterface};
//!
//! # async fn run() -> ftl_comms::Result<()> {
//! let protocol = FtlSimpleProtocol::new(6969);
//! protocol.events().on(EventKind::DigitalOutput, |event| println!("{:?}", event));
//! protocol.start().await?;
//! protocol.set_digital_input(3, true);
//! # Ok(())
//! # }
//! ```

pub use ftl_core::{
    CommsProtocol, CommsProtocol as ProtocolInterface, Error, Event, EventBus, EventKind,
    Lifecycle, Listener, ListenerId, Result,
};

/// Protocols shipped with this crate
pub mod standard {
    pub use ftl_transport::{
        DeliveryPolicy, ServerConfig, SimpleProtocol as FtlSimpleProtocol, DEFAULT_PORT,
    };
}

/// Line grammar of the built-in protocol
pub mod line {
    pub use ftl_protocol::{Command, CommandKind, Outbound, Parser, ProtocolError, RobotCommand};
}
