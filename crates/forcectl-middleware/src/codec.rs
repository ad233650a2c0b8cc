//! Text codec for the one-command-per-connection protocol.
//!
//! A request is a tag followed by whitespace-separated positional arguments:
//!
//! | Tag | Arguments |
//! |---|---|
//! | `Connect`, `Disconnect`, `Zero`, `GetPosition`, `GetForce`, `GetErrors`, `exit` | none |
//! | `Move` | `position: f64` |
//! | `SeekSurface` | `max_position: f64`, `force: f64` |
//! | `PressWithForce` | `force: f64`, `time_ms: u32`, `rise_ms: u32`, `fall_ms: u32` |
//! | `SetForceControlParams` | `config: i64` |
//!
//! Tags are case-sensitive.  Anything that does not match this table is a
//! [`ForceError::MalformedCommand`], answered on the wire with
//! [`INVALID_COMMAND`].

use std::num::IntErrorKind;
use std::str::FromStr;

use forcectl_types::{Command, ForceError, PressTiming, Response};

/// Wire answer to any request that fails to parse.
pub const INVALID_COMMAND: &str = "Invalid command";

/// Wire form of [`Response::Ok`].
pub const OK: &str = "ok";

/// Parse one request line into a [`Command`].
pub fn decode_command(line: &str) -> Result<Command, ForceError> {
    let mut tokens = line.split_whitespace();
    let tag = tokens
        .next()
        .ok_or_else(|| ForceError::MalformedCommand("empty command".to_string()))?;
    let args: Vec<&str> = tokens.collect();

    let command = match tag {
        "Connect" => nullary(tag, &args, Command::Connect)?,
        "Disconnect" => nullary(tag, &args, Command::Disconnect)?,
        "Zero" => nullary(tag, &args, Command::Zero)?,
        "GetPosition" => nullary(tag, &args, Command::GetPosition)?,
        "GetForce" => nullary(tag, &args, Command::GetForce)?,
        "GetErrors" => nullary(tag, &args, Command::GetErrors)?,
        "exit" => nullary(tag, &args, Command::Exit)?,
        "Move" => {
            let [position] = arity::<1>(tag, &args)?;
            Command::Move {
                position: number(tag, position)?,
            }
        }
        "SeekSurface" => {
            let [max_position, force] = arity::<2>(tag, &args)?;
            Command::SeekSurface {
                max_position: number(tag, max_position)?,
                force: number(tag, force)?,
            }
        }
        "PressWithForce" => {
            let [force, hold, rise, fall] = arity::<4>(tag, &args)?;
            Command::PressWithForce {
                force: number(tag, force)?,
                timing: PressTiming {
                    hold_ms: number(tag, hold)?,
                    rise_ms: number(tag, rise)?,
                    fall_ms: number(tag, fall)?,
                },
            }
        }
        "SetForceControlParams" => {
            let [config] = arity::<1>(tag, &args)?;
            Command::SetForceControlParams {
                config: integer(tag, config)?,
            }
        }
        other => {
            return Err(ForceError::MalformedCommand(format!("unknown tag '{other}'")));
        }
    };
    Ok(command)
}

/// Render a [`Response`] as its wire text.
pub fn encode_response(response: &Response) -> String {
    match response {
        Response::Ok => OK.to_string(),
        Response::Value(v) => format_number(*v),
        Response::Text(text) | Response::Failure(text) => text.clone(),
    }
}

/// Default decimal form of a reading: integral values keep one fractional
/// digit (`12.0`), everything else uses the shortest round-trip form.
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        format!("{value}").to_lowercase()
    } else if value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

fn nullary(tag: &str, args: &[&str], command: Command) -> Result<Command, ForceError> {
    arity::<0>(tag, args).map(|[]| command)
}

fn arity<'a, const N: usize>(tag: &str, args: &[&'a str]) -> Result<[&'a str; N], ForceError> {
    <[&str; N]>::try_from(args).map_err(|_| {
        ForceError::MalformedCommand(format!(
            "{tag} takes {N} argument(s), got {}",
            args.len()
        ))
    })
}

fn number<T: FromStr>(tag: &str, token: &str) -> Result<T, ForceError> {
    token.parse().map_err(|_| {
        ForceError::MalformedCommand(format!("{tag}: '{token}' is not a valid number"))
    })
}

/// Parse an integer argument.  Values beyond the `i64` range are still
/// well-formed integers and saturate, so range checks further in reject them.
fn integer(tag: &str, token: &str) -> Result<i64, ForceError> {
    token.parse::<i64>().or_else(|e| match e.kind() {
        IntErrorKind::PosOverflow => Ok(i64::MAX),
        IntErrorKind::NegOverflow => Ok(i64::MIN),
        _ => Err(ForceError::MalformedCommand(format!(
            "{tag}: '{token}' is not a valid integer"
        ))),
    })
}
