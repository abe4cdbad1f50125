//! Protocol capability trait
//!
//! A protocol sits between a client and a robot host:
//!
//! ```text
//! Client --[outputs to robot]--> protocol --> Event --> host application
//! Robot  --[inputs from robot]--> host application --> protocol --> Client
//! ```

use async_trait::async_trait;

use crate::bus::EventBus;
use crate::error::{Error, Result};
use crate::event::Event;

/// Capabilities every concrete wire protocol provides
#[async_trait]
pub trait CommsProtocol: Send + Sync {
    /// Name of the concrete implementation, for diagnostics
    fn protocol_type(&self) -> &'static str;

    /// Bus through which this protocol delivers events
    fn events(&self) -> &EventBus;

    /// Deliver an event to the host application
    fn emit(&self, event: Event) -> usize {
        self.events().emit(event)
    }

    /// Begin accepting client traffic
    async fn start(&self) -> Result<()>;

    /// Stop accepting new client traffic
    async fn stop(&self) -> Result<()>;

    fn set_analog_input(&self, channel: u32, value: f64);

    fn set_digital_input(&self, channel: u32, value: bool);

    /// Send a status message of the given type to the client
    fn send_status(&self, status_type: &str, message: &str);

    /// Send an uninterpreted buffer to the client
    fn send_raw(&self, data: &[u8]);
}

/// Lifecycle of a protocol instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    #[default]
    Created,
    Started,
    Stopped,
}

impl Lifecycle {
    pub fn is_started(&self) -> bool {
        matches!(self, Lifecycle::Started)
    }

    /// Check that `start` is allowed from the current state
    pub fn check_start(&self) -> Result<()> {
        match self {
            Lifecycle::Created | Lifecycle::Stopped => Ok(()),
            Lifecycle::Started => Err(Error::AlreadyStarted),
        }
    }

    /// Check that `stop` is allowed from the current state
    pub fn check_stop(&self) -> Result<()> {
        match self {
            Lifecycle::Started => Ok(()),
            Lifecycle::Created | Lifecycle::Stopped => Err(Error::NotStarted),
        }
    }

    pub fn start(&mut self) -> Result<()> {
        self.check_start()?;
        *self = Lifecycle::Started;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        self.check_stop()?;
        *self = Lifecycle::Stopped;
        Ok(())
    }
}
