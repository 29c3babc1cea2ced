//! Disturbance command grammar: `<ACTION> <COMPONENT_TYPE> <COMPONENT_ID> <NEW_STATE>`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors raised while parsing a disturbance command.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("empty disturbance command")]
    Empty,

    #[error("expected 4 tokens (ACTION TYPE ID STATE), got {0}")]
    Arity(usize),

    #[error("unknown action \"{0}\"")]
    UnknownAction(String),

    #[error("unknown component type \"{0}\"")]
    UnknownComponent(String),

    #[error("invalid state \"{0}\" (expected 0 or 1)")]
    InvalidState(String),

    #[error("invalid event time {0} (must be finite and >= 0)")]
    InvalidTime(f64),
}

/// Switching action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Open (`0`) or close (`1`) the breaker connecting a component.
    Breaker,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Breaker => "BREAKER",
        }
    }
}

/// Component type targeted by a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    SyncMachine,
    Load,
    Bus,
    Branch,
    Injector,
}

impl ComponentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ComponentType::SyncMachine => "SYNC_MACH",
            ComponentType::Load => "LOAD",
            ComponentType::Bus => "BUS",
            ComponentType::Branch => "BRANCH",
            ComponentType::Injector => "INJ",
        }
    }
}

/// A parsed switching command.
///
/// # Examples
///
/// ```
/// use dynsim::sim::command::{Command, ComponentType};
///
/// let cmd: Command = "BREAKER SYNC_MACH g7 0".parse().unwrap();
/// assert_eq!(cmd.component, ComponentType::SyncMachine);
/// assert_eq!(cmd.target, "g7");
/// assert!(!cmd.closed);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub action: Action,
    pub component: ComponentType,
    /// Component identifier from the dynamic data.
    pub target: String,
    /// New breaker state: `true` = closed (in service), `false` = open.
    pub closed: bool,
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s.trim().trim_end_matches(';');
        let tokens: Vec<&str> = body.split_whitespace().collect();
        if tokens.is_empty() {
            return Err(CommandError::Empty);
        }
        if tokens.len() != 4 {
            return Err(CommandError::Arity(tokens.len()));
        }

        let action = match tokens[0].to_ascii_uppercase().as_str() {
            "BREAKER" => Action::Breaker,
            _ => return Err(CommandError::UnknownAction(tokens[0].to_string())),
        };
        let component = match tokens[1].to_ascii_uppercase().as_str() {
            "SYNC_MACH" => ComponentType::SyncMachine,
            "LOAD" => ComponentType::Load,
            "BUS" => ComponentType::Bus,
            "BRANCH" => ComponentType::Branch,
            "INJ" => ComponentType::Injector,
            _ => return Err(CommandError::UnknownComponent(tokens[1].to_string())),
        };
        let closed = match tokens[3] {
            "0" => false,
            "1" => true,
            other => return Err(CommandError::InvalidState(other.to_string())),
        };

        Ok(Self {
            action,
            component,
            target: tokens[2].to_string(),
            closed,
        })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.action.as_str(),
            self.component.as_str(),
            self.target,
            u8::from(self.closed)
        )
    }
}

/// A command scheduled at a simulated time (seconds).
#[derive(Debug, Clone, PartialEq)]
pub struct Disturbance {
    pub time: f64,
    pub command: Command,
}

impl Disturbance {
    /// Parses `command` and attaches it to `time`.
    ///
    /// # Errors
    ///
    /// Returns a `CommandError` for a negative or non-finite time or a
    /// malformed command.
    pub fn parse(time: f64, command: &str) -> Result<Self, CommandError> {
        if !time.is_finite() || time < 0.0 {
            return Err(CommandError::InvalidTime(time));
        }
        Ok(Self {
            time,
            command: command.parse()?,
        })
    }
}

impl fmt::Display for Disturbance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4} {}", self.time, self.command)
    }
}
