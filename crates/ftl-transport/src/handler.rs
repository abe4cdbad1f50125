//! Connection handler - turns received bytes into events

use ftl_core::Event;
use ftl_protocol::{Parser, ProtocolError};
use tracing::{debug, warn};

/// Per-connection framing and parsing state
pub struct ConnectionHandler {
    /// Unique client ID, used in logs
    pub client_id: String,
    /// Bytes received but not yet terminated by a newline
    parser: Parser,
}

impl ConnectionHandler {
    pub fn new(client_id: String, max_line_length: usize) -> Self {
        Self {
            client_id,
            parser: Parser::with_max_line_length(max_line_length),
        }
    }

    /// Process received data and return the events it completes, in order.
    ///
    /// Malformed lines are logged and skipped.
    pub fn process(&mut self, data: &[u8]) -> Vec<Event> {
        let mut events = Vec::new();
        self.parser.feed(data);

        loop {
            match self.parser.parse() {
                Ok(Some(cmd)) => {
                    debug!(client = %self.client_id, cmd = cmd.tag(), raw = %cmd.raw, "Processing command");
                    events.push(cmd.into_event());
                }
                Ok(None) => break,
                Err(e @ ProtocolError::LineTooLong { .. }) => {
                    warn!(client = %self.client_id, error = %e, "Discarding oversized line");
                }
                Err(e) => {
                    warn!(client = %self.client_id, error = %e, "Dropping message");
                }
            }
        }

        events
    }

    /// Flush the unterminated tail once the client has closed its side
    pub fn finish(&mut self) -> Option<Event> {
        match self.parser.finish() {
            Ok(cmd) => cmd.map(|cmd| {
                debug!(client = %self.client_id, cmd = cmd.tag(), raw = %cmd.raw, "Processing final command");
                cmd.into_event()
            }),
            Err(e) => {
                warn!(client = %self.client_id, error = %e, "Dropping final message");
                None
            }
        }
    }

    /// Bytes still waiting for a line terminator
    pub fn pending(&self) -> usize {
        self.parser.pending()
    }
}
