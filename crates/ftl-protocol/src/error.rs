//! Protocol error types

use thiserror::Error;

/// Errors raised while framing or parsing a line
#[derive(Error, Debug, PartialEq)]
pub enum ProtocolError {
    #[error("Unknown message: {0}")]
    UnknownCommand(String),

    #[error("Invalid message: {line} (missing {field})")]
    MissingField { line: String, field: &'static str },

    #[error("Invalid message: {line} (bad {field} '{value}')")]
    InvalidField {
        line: String,
        field: &'static str,
        value: String,
    },

    #[error("Line too long: {size} > {max}")]
    LineTooLong { size: usize, max: usize },
}

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;
