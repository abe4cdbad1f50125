//! Error types for FTL Comms Core

use thiserror::Error;

/// Core error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid event '{0}' fired")]
    InvalidEventKind(String),

    #[error("Protocol already started")]
    AlreadyStarted,

    #[error("Protocol not started")]
    NotStarted,

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Protocol task is no longer running")]
    TaskGone,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for FTL Comms Core operations
pub type Result<T> = std::result::Result<T, Error>;
