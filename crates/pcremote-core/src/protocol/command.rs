//! Typed remote-control commands.
//!
//! Every command travels as the plaintext of one frame and starts with the
//! reserved `COMMAND:` prefix.  Commands either stand alone
//! (`COMMAND:MOUSE_CLICK`) or carry an argument list in angle brackets
//! (`COMMAND:MOUSE_MOVE<3.5,-2>`).
//!
//! The text is parsed once, at the decode boundary, into [`Command`]; the
//! rest of the host only ever sees the typed value.  `Display` renders the
//! canonical wire text, so parsing the rendered text yields the same value.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::protocol::tokens::COMMAND_PREFIX;

// ── Command names ─────────────────────────────────────────────────────────────

const DISCONNECT: &str = "DISCONNECT";
const SHUTDOWN: &str = "SHUTDOWN";
const KEYPRESS_ENTER: &str = "KEYPRESS_ENTER";
const KEYPRESS_BACKSPACE: &str = "KEYPRESS_BACKSPACE";
const KEYPRESS: &str = "KEYPRESS";
const MOUSE_MOVE: &str = "MOUSE_MOVE";
const MOUSE_CLICK: &str = "MOUSE_CLICK";
const MOUSE_SCROLL: &str = "MOUSE_SCROLL";
const MOUSE_PINCH: &str = "MOUSE_PINCH";
const VOLUME_UP: &str = "VOLUME_UP";
const VOLUME_DOWN: &str = "VOLUME_DOWN";

/// Keys the client can press by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialKey {
    Enter,
    Backspace,
    VolumeUp,
    VolumeDown,
}

/// Commands that turn into synthetic input on the host.
#[derive(Debug, Clone, PartialEq)]
pub enum InputCommand {
    /// Press and release one named key.
    Key(SpecialKey),
    /// Type the given text.
    TypeText(String),
    /// Relative pointer motion reported by the touch pad.
    MouseMove { dx: f64, dy: f64 },
    /// Primary-button click.
    MouseClick,
    /// Scroll by whole steps; positive `dy` scrolls up.
    MouseScroll { dx: i32, dy: i32 },
    /// Current pinch gesture scale (1.0 = no pinch).
    MousePinch { scale: f64 },
}

/// A parsed remote-control command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// End the session without reconnecting.
    Disconnect,
    /// End the session and power off the host.
    Shutdown,
    /// Inject input.
    Input(InputCommand),
}

/// Errors produced while parsing command text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The text does not start with `COMMAND:`.
    #[error("message is not a command")]
    NotACommand,

    /// The command name is not recognised.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// The command is known but its arguments are missing or invalid.
    #[error("invalid arguments for {command}: {reason}")]
    InvalidArguments { command: String, reason: String },
}

impl Command {
    /// Parses one decoded plaintext message.
    ///
    /// # Errors
    ///
    /// See [`CommandError`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pcremote_core::{Command, InputCommand};
    ///
    /// let cmd = Command::parse("COMMAND:MOUSE_SCROLL<0,-2.7>").unwrap();
    /// assert_eq!(cmd, Command::Input(InputCommand::MouseScroll { dx: 0, dy: -2 }));
    /// assert_eq!(cmd.to_string(), "COMMAND:MOUSE_SCROLL<0,-2>");
    /// ```
    pub fn parse(text: &str) -> Result<Self, CommandError> {
        let body = text
            .strip_prefix(COMMAND_PREFIX)
            .ok_or(CommandError::NotACommand)?;

        let (name, args) = split_arguments(body)?;

        match (name, args) {
            (DISCONNECT, None) => Ok(Self::Disconnect),
            (SHUTDOWN, None) => Ok(Self::Shutdown),
            (KEYPRESS_ENTER, None) => Ok(Self::key(SpecialKey::Enter)),
            (KEYPRESS_BACKSPACE, None) => Ok(Self::key(SpecialKey::Backspace)),
            (VOLUME_UP, None) => Ok(Self::key(SpecialKey::VolumeUp)),
            (VOLUME_DOWN, None) => Ok(Self::key(SpecialKey::VolumeDown)),
            (MOUSE_CLICK, None) => Ok(Self::Input(InputCommand::MouseClick)),
            (KEYPRESS, Some(text)) => Ok(Self::Input(InputCommand::TypeText(text.to_string()))),
            (MOUSE_MOVE, Some(args)) => {
                let [dx, dy] = parse_pair(MOUSE_MOVE, args)?;
                Ok(Self::Input(InputCommand::MouseMove { dx, dy }))
            }
            (MOUSE_SCROLL, Some(args)) => {
                let [dx, dy] = parse_pair(MOUSE_SCROLL, args)?;
                // `as` truncates toward zero and saturates at the i32 bounds.
                Ok(Self::Input(InputCommand::MouseScroll {
                    dx: dx as i32,
                    dy: dy as i32,
                }))
            }
            (MOUSE_PINCH, Some(args)) => {
                let scale = parse_number(MOUSE_PINCH, args)?;
                Ok(Self::Input(InputCommand::MousePinch { scale }))
            }
            (KEYPRESS | MOUSE_MOVE | MOUSE_SCROLL | MOUSE_PINCH, None) => {
                Err(invalid(name, "missing argument list"))
            }
            (
                DISCONNECT | SHUTDOWN | KEYPRESS_ENTER | KEYPRESS_BACKSPACE | VOLUME_UP
                | VOLUME_DOWN | MOUSE_CLICK,
                Some(_),
            ) => Err(invalid(name, "takes no arguments")),
            (other, _) => Err(CommandError::UnknownCommand(other.to_string())),
        }
    }

    /// The command name without prefix or arguments, safe to log.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Disconnect => DISCONNECT,
            Self::Shutdown => SHUTDOWN,
            Self::Input(input) => match input {
                InputCommand::Key(SpecialKey::Enter) => KEYPRESS_ENTER,
                InputCommand::Key(SpecialKey::Backspace) => KEYPRESS_BACKSPACE,
                InputCommand::Key(SpecialKey::VolumeUp) => VOLUME_UP,
                InputCommand::Key(SpecialKey::VolumeDown) => VOLUME_DOWN,
                InputCommand::TypeText(_) => KEYPRESS,
                InputCommand::MouseMove { .. } => MOUSE_MOVE,
                InputCommand::MouseClick => MOUSE_CLICK,
                InputCommand::MouseScroll { .. } => MOUSE_SCROLL,
                InputCommand::MousePinch { .. } => MOUSE_PINCH,
            },
        }
    }

    fn key(key: SpecialKey) -> Self {
        Self::Input(InputCommand::Key(key))
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(COMMAND_PREFIX)?;
        let name = self.name();
        match self {
            Self::Input(InputCommand::TypeText(text)) => write!(f, "{name}<{text}>"),
            Self::Input(InputCommand::MouseMove { dx, dy }) => write!(f, "{name}<{dx},{dy}>"),
            Self::Input(InputCommand::MouseScroll { dx, dy }) => write!(f, "{name}<{dx},{dy}>"),
            Self::Input(InputCommand::MousePinch { scale }) => write!(f, "{name}<{scale}>"),
            _ => f.write_str(name),
        }
    }
}

// ── Argument parsing ──────────────────────────────────────────────────────────

/// Splits `NAME<args>` into its parts.  The argument list runs from the first
/// `<` to the final `>`, so typed text may itself contain angle brackets.
fn split_arguments(body: &str) -> Result<(&str, Option<&str>), CommandError> {
    match body.find('<') {
        None => Ok((body, None)),
        Some(open) => {
            let name = &body[..open];
            let args = body[open + 1..]
                .strip_suffix('>')
                .ok_or_else(|| invalid(name, "unterminated argument list"))?;
            Ok((name, Some(args)))
        }
    }
}

fn parse_pair(command: &str, args: &str) -> Result<[f64; 2], CommandError> {
    let mut parts = args.split(',');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(x), Some(y), None) => Ok([parse_number(command, x)?, parse_number(command, y)?]),
        _ => Err(invalid(command, "expected two comma-separated numbers")),
    }
}

fn parse_number(command: &str, text: &str) -> Result<f64, CommandError> {
    let value: f64 = text
        .trim()
        .parse()
        .map_err(|_| invalid(command, &format!("{:?} is not a number", text.trim())))?;
    if !value.is_finite() {
        return Err(invalid(command, "number must be finite"));
    }
    Ok(value)
}

fn invalid(command: &str, reason: &str) -> CommandError {
    CommandError::InvalidArguments {
        command: command.to_string(),
        reason: reason.to_string(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
