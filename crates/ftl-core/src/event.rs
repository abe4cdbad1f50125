//! Event contract between a protocol and the host application
//!
//! Inbound robot-bound data reaches the application only as an [`Event`].
//! The set of kinds is closed: a protocol cannot construct anything else.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::Error;

/// The kinds of event a protocol may emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    DigitalOutput,
    AnalogOutput,
    PwmOutput,
    RobotCommand,
    SystemMessage,
    EnableRobot,
    DisableRobot,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::DigitalOutput,
        EventKind::AnalogOutput,
        EventKind::PwmOutput,
        EventKind::RobotCommand,
        EventKind::SystemMessage,
        EventKind::EnableRobot,
        EventKind::DisableRobot,
    ];

    /// Wire name of the event kind
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::DigitalOutput => "digitalOutput",
            EventKind::AnalogOutput => "analogOutput",
            EventKind::PwmOutput => "pwmOutput",
            EventKind::RobotCommand => "robotCommand",
            EventKind::SystemMessage => "systemMessage",
            EventKind::EnableRobot => "enableRobot",
            EventKind::DisableRobot => "disableRobot",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "digitalOutput" => Ok(EventKind::DigitalOutput),
            "analogOutput" => Ok(EventKind::AnalogOutput),
            "pwmOutput" => Ok(EventKind::PwmOutput),
            "robotCommand" => Ok(EventKind::RobotCommand),
            // Older line-protocol clients subscribe under the short name
            "systemMessage" | "sysMessage" => Ok(EventKind::SystemMessage),
            "enableRobot" => Ok(EventKind::EnableRobot),
            "disableRobot" => Ok(EventKind::DisableRobot),
            other => Err(Error::InvalidEventKind(other.to_string())),
        }
    }
}

/// An event delivered to the host application, with its payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum Event {
    /// Set a digital output on the robot
    DigitalOutput { channel: u32, value: bool },
    /// Set an analog output on the robot
    AnalogOutput { channel: u32, value: f64 },
    /// Set a PWM output; values are intended to fall in `0..=255`
    PwmOutput { channel: u32, value: f64 },
    /// Raw command text for the robot
    RobotCommand { command: String },
    /// Text message for display on the robot
    SystemMessage { message: String },
    EnableRobot,
    DisableRobot,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::DigitalOutput { .. } => EventKind::DigitalOutput,
            Event::AnalogOutput { .. } => EventKind::AnalogOutput,
            Event::PwmOutput { .. } => EventKind::PwmOutput,
            Event::RobotCommand { .. } => EventKind::RobotCommand,
            Event::SystemMessage { .. } => EventKind::SystemMessage,
            Event::EnableRobot => EventKind::EnableRobot,
            Event::DisableRobot => EventKind::DisableRobot,
        }
    }

    pub fn digital(channel: u32, value: bool) -> Self {
        Event::DigitalOutput { channel, value }
    }

    pub fn analog(channel: u32, value: f64) -> Self {
        Event::AnalogOutput { channel, value }
    }

    pub fn pwm(channel: u32, value: f64) -> Self {
        Event::PwmOutput { channel, value }
    }

    pub fn robot_command(command: impl Into<String>) -> Self {
        Event::RobotCommand { command: command.into() }
    }

    pub fn system_message(message: impl Into<String>) -> Self {
        Event::SystemMessage { message: message.into() }
    }
}
