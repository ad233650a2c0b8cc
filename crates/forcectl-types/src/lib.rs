use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Driver-internal control loop selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlProfile {
    /// Profile 0: the actuator holds a commanded position.
    PositionHold,
    /// Profile 1: the actuator regulates to a commanded force.
    ForceHold,
}

impl ControlProfile {
    /// The numeric profile index the driver expects.
    pub fn index(self) -> u8 {
        match self {
            ControlProfile::PositionHold => 0,
            ControlProfile::ForceHold => 1,
        }
    }
}

impl TryFrom<i64> for ControlProfile {
    type Error = ForceError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ControlProfile::PositionHold),
            1 => Ok(ControlProfile::ForceHold),
            _ => Err(ForceError::OutOfRangeArgument(
                "Config number out of range".to_string(),
            )),
        }
    }
}

/// Timings of a press profile, all in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PressTiming {
    pub hold_ms: u32,
    pub rise_ms: u32,
    pub fall_ms: u32,
}

/// A parsed protocol request.
///
/// One variant per wire tag; arguments are already typed.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Connect,
    Disconnect,
    Zero,
    Move {
        position: f64,
    },
    /// `max_position` is accepted but does not bound the seek.
    SeekSurface {
        max_position: f64,
        force: f64,
    },
    PressWithForce {
        force: f64,
        timing: PressTiming,
    },
    /// The index is range-checked by the controller, not by the parser.
    SetForceControlParams {
        config: i64,
    },
    GetPosition,
    GetForce,
    GetErrors,
    Exit,
}

impl Command {
    /// The wire tag for this command.
    pub fn tag(&self) -> &'static str {
        match self {
            Command::Connect => "Connect",
            Command::Disconnect => "Disconnect",
            Command::Zero => "Zero",
            Command::Move { .. } => "Move",
            Command::SeekSurface { .. } => "SeekSurface",
            Command::PressWithForce { .. } => "PressWithForce",
            Command::SetForceControlParams { .. } => "SetForceControlParams",
            Command::GetPosition => "GetPosition",
            Command::GetForce => "GetForce",
            Command::GetErrors => "GetErrors",
            Command::Exit => "exit",
        }
    }
}

/// Result of executing a [`Command`].
///
/// Every variant becomes plain text on the wire; a `Failure` is not
/// distinguishable from a success string by shape alone.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// The `"ok"` sentinel.
    Ok,
    /// A position or force reading.
    Value(f64),
    /// Pass-through text such as an error listing or a status string.
    Text(String),
    /// A failure rendered as its human-readable message.
    Failure(String),
}

impl From<ForceError> for Response {
    fn from(err: ForceError) -> Self {
        Response::Failure(err.to_string())
    }
}

/// One request/response pair as seen by the command server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g. `"127.0.0.1:53122"`
    pub peer: String,
    pub command: String,
    pub response: String,
}

impl Exchange {
    pub fn new(
        peer: impl Into<String>,
        command: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            peer: peer.into(),
            command: command.into(),
            response: response.into(),
        }
    }
}

/// Failures reported by a force-control driver.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Force control not connected")]
    NotConnected,

    #[error("Force control unavailable: {0}")]
    Unavailable(String),

    #[error("Force control handle already released")]
    Closed,

    #[error("Force control fault {code} on {channel}: {message}")]
    Fault {
        channel: String,
        code: i32,
        message: String,
    },
}

/// Error type spanning malformed requests, driver failures, argument range
/// violations and trace-file I/O.
#[derive(Error, Debug)]
pub enum ForceError {
    #[error("Invalid command: {0}")]
    MalformedCommand(String),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("{0}")]
    OutOfRangeArgument(String),

    #[error("Trace write failed: {0}")]
    Trace(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_profile_accepts_only_zero_and_one() {
        assert_eq!(ControlProfile::try_from(0).unwrap(), ControlProfile::PositionHold);
        assert_eq!(ControlProfile::try_from(1).unwrap(), ControlProfile::ForceHold);
        for n in [-1, 2, 7, i64::MAX, i64::MIN] {
            let err = ControlProfile::try_from(n).unwrap_err();
            assert_eq!(err.to_string(), "Config number out of range");
        }
    }

    #[test]
    fn control_profile_index_matches_driver_numbering() {
        assert_eq!(ControlProfile::PositionHold.index(), 0);
        assert_eq!(ControlProfile::ForceHold.index(), 1);
    }

    #[test]
    fn command_tags_match_wire_names() {
        assert_eq!(Command::Move { position: 1.0 }.tag(), "Move");
        assert_eq!(Command::Exit.tag(), "exit");
        assert_eq!(
            Command::SetForceControlParams { config: 0 }.tag(),
            "SetForceControlParams"
        );
    }

    #[test]
    fn driver_error_surfaces_as_plain_text() {
        let err: ForceError = DriverError::Fault {
            channel: "F1".to_string(),
            code: 17,
            message: "following error".to_string(),
        }
        .into();
        let response = Response::from(err);
        assert_eq!(
            response,
            Response::Failure("Force control fault 17 on F1: following error".to_string())
        );
    }

    #[test]
    fn exchange_serializes_to_json() {
        let exchange = Exchange::new("127.0.0.1:5000", "Zero", "ok");
        let json = serde_json::to_string(&exchange).unwrap();
        let back: Exchange = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, exchange.id);
        assert_eq!(back.command, "Zero");
        assert_eq!(back.response, "ok");
    }
}
