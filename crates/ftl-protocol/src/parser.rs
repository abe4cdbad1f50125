//! Simple protocol line parser

use crate::command::{Command, CommandKind, RobotCommand};
use crate::error::{ProtocolError, ProtocolResult};
use bytes::BytesMut;
use std::str::Split;

/// Default cap on an unterminated line (64KB)
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// Line parser for one connection
///
/// Bytes are buffered until a `\n` arrives, so a command split across
/// several reads is parsed once, when its terminator shows up.
pub struct Parser {
    buffer: BytesMut,
    max_line_length: usize,
    /// Dropping the remainder of an overlong line
    discarding: bool,
}

impl Parser {
    pub fn new() -> Self {
        Self::with_max_line_length(DEFAULT_MAX_LINE_LENGTH)
    }

    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(1024),
            max_line_length,
            discarding: false,
        }
    }

    /// Add data to the parser buffer
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Number of buffered bytes not yet resolved into a line
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Try to parse the next complete command from the buffer.
    ///
    /// A malformed line is consumed before its error is returned, so callers
    /// can keep calling until `Ok(None)`.
    pub fn parse(&mut self) -> ProtocolResult<Option<Command>> {
        loop {
            let line_end = match self.buffer.iter().position(|&b| b == b'\n') {
                Some(pos) => pos,
                None => return self.check_pending(),
            };

            // Extract line (excluding \r\n or \n)
            let line_len = if line_end > 0 && self.buffer[line_end - 1] == b'\r' {
                line_end - 1
            } else {
                line_end
            };

            let line = String::from_utf8_lossy(&self.buffer[..line_len]).trim().to_string();
            let _ = self.buffer.split_to(line_end + 1);

            if self.discarding {
                self.discarding = false;
                continue;
            }

            if line.is_empty() {
                continue;
            }

            return Self::parse_line(&line).map(Some);
        }
    }

    /// Parse whatever is left once the peer has closed its side.
    ///
    /// An unterminated final line counts as a complete one. The buffer is
    /// empty afterwards.
    pub fn finish(&mut self) -> ProtocolResult<Option<Command>> {
        let rest = self.buffer.split();
        if std::mem::take(&mut self.discarding) {
            return Ok(None);
        }

        let line = String::from_utf8_lossy(&rest);
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        Self::parse_line(line).map(Some)
    }

    fn check_pending(&mut self) -> ProtocolResult<Option<Command>> {
        if self.buffer.len() <= self.max_line_length {
            return Ok(None);
        }

        let size = self.buffer.len();
        self.buffer.clear();
        self.discarding = true;
        Err(ProtocolError::LineTooLong {
            size,
            max: self.max_line_length,
        })
    }

    /// Parse a single trimmed command line
    pub fn parse_line(line: &str) -> ProtocolResult<Command> {
        let mut fields = line.split(':');
        let tag = fields.next().unwrap_or_default();

        let kind = match tag {
            "D" => {
                let channel = parse_channel(line, &mut fields)?;
                let value = next_field(line, &mut fields, "value")?;
                CommandKind::Digital {
                    channel,
                    value: value == "1",
                }
            }
            "A" => {
                let channel = parse_channel(line, &mut fields)?;
                let value = parse_number(line, &mut fields)?;
                CommandKind::Analog { channel, value }
            }
            "P" => {
                let channel = parse_channel(line, &mut fields)?;
                let value = parse_number(line, &mut fields)?;
                CommandKind::Pwm { channel, value }
            }
            "S" => CommandKind::System {
                message: remainder(line).unwrap_or_default().to_string(),
            },
            "RC" => {
                let rest = remainder(line).ok_or_else(|| ProtocolError::MissingField {
                    line: line.to_string(),
                    field: "command",
                })?;
                let command = match rest {
                    "EN" => RobotCommand::Enable,
                    "DS" => RobotCommand::Disable,
                    other => RobotCommand::Raw(other.to_string()),
                };
                CommandKind::Robot(command)
            }
            _ => return Err(ProtocolError::UnknownCommand(line.to_string())),
        };

        Ok(Command::new(kind, line))
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything after the first colon, colons preserved
fn remainder(line: &str) -> Option<&str> {
    line.split_once(':').map(|(_, rest)| rest)
}

fn next_field<'a>(
    line: &str,
    fields: &mut Split<'a, char>,
    field: &'static str,
) -> ProtocolResult<&'a str> {
    fields
        .next()
        .map(str::trim)
        .ok_or_else(|| ProtocolError::MissingField {
            line: line.to_string(),
            field,
        })
}

fn parse_channel(line: &str, fields: &mut Split<'_, char>) -> ProtocolResult<u32> {
    let raw = next_field(line, fields, "channel")?;
    raw.parse().map_err(|_| ProtocolError::InvalidField {
        line: line.to_string(),
        field: "channel",
        value: raw.to_string(),
    })
}

fn parse_number(line: &str, fields: &mut Split<'_, char>) -> ProtocolResult<f64> {
    let raw = next_field(line, fields, "value")?;
    raw.parse().map_err(|_| ProtocolError::InvalidField {
        line: line.to_string(),
        field: "value",
        value: raw.to_string(),
    })
}
