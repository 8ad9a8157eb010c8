//! `teleop-types` – shared vocabulary of the teleoperation stack.
//!
//! Every other crate speaks in terms of the types defined here:
//!
//! - [`Action`] – the discrete motion intent produced by a classifier.
//! - [`Command`] – the single-byte wire encoding of a transmittable action.
//! - [`TeleopError`] – the error type spanning transport, stream, sensor and
//!   configuration failures.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Discrete semantic motion intent.
///
/// [`Action::None`] means "nothing recognised".  It is never transmitted:
/// producers coerce it to [`Action::Stop`] before publishing an active
/// command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Stop,
    Forward,
    Back,
    Left,
    Right,
    #[default]
    None,
}

impl Action {
    /// Map this action to its wire [`Command`].
    ///
    /// Returns `None` for [`Action::None`], the only non-transmittable action.
    pub fn command(self) -> Option<Command> {
        match self {
            Action::Stop => Some(Command::Stop),
            Action::Forward => Some(Command::Forward),
            Action::Back => Some(Command::Back),
            Action::Left => Some(Command::Left),
            Action::Right => Some(Command::Right),
            Action::None => None,
        }
    }

    /// Return the action that should be driven for this observation:
    /// [`Action::None`] becomes [`Action::Stop`], everything else is kept.
    pub fn or_stop(self) -> Action {
        match self {
            Action::None => Action::Stop,
            other => other,
        }
    }

    /// `true` for every action except [`Action::None`].
    pub fn is_transmittable(self) -> bool {
        self.command().is_some()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Action::Stop => "STOP",
            Action::Forward => "FORWARD",
            Action::Back => "BACK",
            Action::Left => "LEFT",
            Action::Right => "RIGHT",
            Action::None => "NONE",
        };
        f.pad(label)
    }
}

/// Single-character wire encoding of a transmittable [`Action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    #[serde(rename = "F")]
    Forward,
    #[serde(rename = "B")]
    Back,
    #[serde(rename = "L")]
    Left,
    #[serde(rename = "R")]
    Right,
    #[serde(rename = "S")]
    Stop,
}

impl Command {
    /// The ASCII byte sent on the wire.
    pub fn as_byte(self) -> u8 {
        match self {
            Command::Forward => b'F',
            Command::Back => b'B',
            Command::Left => b'L',
            Command::Right => b'R',
            Command::Stop => b'S',
        }
    }

    /// Decode a wire byte.  Returns `None` for anything outside `FBLRS`.
    pub fn from_byte(byte: u8) -> Option<Command> {
        match byte {
            b'F' => Some(Command::Forward),
            b'B' => Some(Command::Back),
            b'L' => Some(Command::Left),
            b'R' => Some(Command::Right),
            b'S' => Some(Command::Stop),
            _ => None,
        }
    }

    /// The action this command encodes.
    pub fn action(self) -> Action {
        match self {
            Command::Forward => Action::Forward,
            Command::Back => Action::Back,
            Command::Left => Action::Left,
            Command::Right => Action::Right,
            Command::Stop => Action::Stop,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_byte() as char)
    }
}

/// Error type spanning transport failures, stream outages, sensor faults and
/// configuration problems.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TeleopError {
    #[error("Transport Error on {endpoint}: {details}")]
    Transport { endpoint: String, details: String },

    #[error("Stream Unavailable at {url}: {details}")]
    StreamUnavailable { url: String, details: String },

    #[error("Stream Ended: {0}")]
    StreamEnded(String),

    #[error("Sensor Error: {0}")]
    Sensor(String),

    #[error("Sensor Exhausted")]
    SensorExhausted,

    #[error("Render Error: {0}")]
    Render(String),

    #[error("Configuration Error: {0}")]
    Configuration(String),
}

impl TeleopError {
    /// `true` for failures that are retried rather than surfaced: socket
    /// send/receive, stream open/read and single sensor acquisitions.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TeleopError::Transport { .. }
                | TeleopError::StreamUnavailable { .. }
                | TeleopError::StreamEnded(_)
                | TeleopError::Sensor(_)
        )
    }
}
