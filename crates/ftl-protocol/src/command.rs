//! Simple protocol command types

use ftl_core::Event;

/// A parsed protocol line
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub kind: CommandKind,
    /// The trimmed line the command was parsed from
    pub raw: String,
}

/// All supported commands
#[derive(Debug, Clone, PartialEq)]
pub enum CommandKind {
    /// D:<channel>:<value>
    Digital { channel: u32, value: bool },

    /// A:<channel>:<value>
    Analog { channel: u32, value: f64 },

    /// P:<channel>:<value>
    Pwm { channel: u32, value: f64 },

    /// S:<message>
    System { message: String },

    /// RC:<command>
    Robot(RobotCommand),
}

/// Payload of an `RC` line
#[derive(Debug, Clone, PartialEq)]
pub enum RobotCommand {
    /// RC:EN
    Enable,
    /// RC:DS
    Disable,
    /// Anything else, passed through verbatim
    Raw(String),
}

impl Command {
    pub fn new(kind: CommandKind, raw: impl Into<String>) -> Self {
        Command {
            kind,
            raw: raw.into(),
        }
    }

    /// Short tag of the command, as written on the wire
    pub fn tag(&self) -> &'static str {
        match self.kind {
            CommandKind::Digital { .. } => "D",
            CommandKind::Analog { .. } => "A",
            CommandKind::Pwm { .. } => "P",
            CommandKind::System { .. } => "S",
            CommandKind::Robot(_) => "RC",
        }
    }

    /// Translate the command into the event it announces
    pub fn into_event(self) -> Event {
        match self.kind {
            CommandKind::Digital { channel, value } => Event::digital(channel, value),
            CommandKind::Analog { channel, value } => Event::analog(channel, value),
            CommandKind::Pwm { channel, value } => Event::pwm(channel, value),
            CommandKind::System { message } => Event::system_message(message),
            CommandKind::Robot(RobotCommand::Enable) => Event::EnableRobot,
            CommandKind::Robot(RobotCommand::Disable) => Event::DisableRobot,
            CommandKind::Robot(RobotCommand::Raw(command)) => Event::robot_command(command),
        }
    }
}
