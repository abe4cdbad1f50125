//! FTL Simple Protocol
//!
//! A newline-delimited text protocol for driving robot I/O over TCP.
//!
//! ## Client to robot
//! ```text
//! D:<channel>:<1|0>      # Digital output
//! A:<channel>:<value>    # Analog output
//! P:<channel>:<value>    # PWM output, 0-255
//! S:<message>            # System message
//! RC:<command>           # Robot command
//! RC:EN                  # Enable robot (unlock speed controllers etc.)
//! RC:DS                  # Disable robot (lock speed controllers)
//! ```
//!
//! ## Robot to client
//! ```text
//! D:<channel>:<1|0>      # Digital input
//! A:<channel>:<value>    # Analog input
//! S:<type>: <message>    # Status
//! ```

pub mod command;
pub mod error;
pub mod outbound;
pub mod parser;

pub use command::{Command, CommandKind, RobotCommand};
pub use error::{ProtocolError, ProtocolResult};
pub use outbound::Outbound;
pub use parser::{Parser, DEFAULT_MAX_LINE_LENGTH};
