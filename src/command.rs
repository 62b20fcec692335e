use std::fmt;

use crate::config::MAX_TUNING_RAMP_SECS;
use crate::side::{Side, STATIONS_PER_SIDE};

/// One actuator: a side and a station index, 0-based rear to front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorId {
    pub side: Side,
    pub station: usize,
}

impl fmt::Display for ActuatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.side.letter(), self.station + 1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetAll(f32),
    SetSingle(ActuatorId, f32),
    SetRamp(f32),
    Get,
    Help,
    Invalid(CommandError),
}

impl Command {
    /// Commands that change targets or ramp settings.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Command::SetAll(_) | Command::SetSingle(..) | Command::SetRamp(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandError {
    Empty,
    UnknownCommand(String),
    UnknownTarget(String),
    StationOutOfRange(String),
    MissingArgument(&'static str),
    BadNumber(String),
    UnexpectedArgument(String),
    RampOutOfRange(f32),
    SideDisabled(Side),
    LineTooLong,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Empty => write!(f, "empty command"),
            CommandError::UnknownCommand(cmd) => write!(f, "unknown command '{}', try HELP", cmd),
            CommandError::UnknownTarget(target) => {
                write!(f, "unknown target '{}', use ALL, L1..L4 or R1..R4", target)
            }
            CommandError::StationOutOfRange(target) => {
                write!(f, "target '{}' out of range, stations are 1..{}", target, STATIONS_PER_SIDE)
            }
            CommandError::MissingArgument(what) => write!(f, "missing {}", what),
            CommandError::BadNumber(token) => write!(f, "invalid number '{}'", token),
            CommandError::UnexpectedArgument(token) => write!(f, "unexpected argument '{}'", token),
            CommandError::RampOutOfRange(secs) => {
                write!(f, "ramp {} s out of range [0, {}]", secs, MAX_TUNING_RAMP_SECS)
            }
            CommandError::SideDisabled(side) => write!(f, "side {} is disabled", side),
            CommandError::LineTooLong => write!(f, "line too long"),
        }
    }
}

/// Maps one input line to a command. Never fails: problems come back as
/// [`Command::Invalid`]. Range checks that depend on configuration happen when the
/// command is applied.
pub fn parse_line(line: &str) -> Command {
    match parse_tokens(line) {
        Ok(command) => command,
        Err(e) => Command::Invalid(e),
    }
}

fn parse_tokens(line: &str) -> Result<Command, CommandError> {
    let mut tokens = line.split_whitespace();
    let keyword = tokens.next().ok_or(CommandError::Empty)?;

    let command = if keyword.eq_ignore_ascii_case("SET") {
        let target = tokens.next().ok_or(CommandError::MissingArgument("target"))?;
        let degrees = parse_number(tokens.next(), "angle")?;
        if target.eq_ignore_ascii_case("ALL") {
            Command::SetAll(degrees)
        } else {
            Command::SetSingle(parse_target(target)?, degrees)
        }
    } else if keyword.eq_ignore_ascii_case("RAMP") {
        let secs = parse_number(tokens.next(), "seconds")?;
        if !(0.0..=MAX_TUNING_RAMP_SECS).contains(&secs) {
            return Err(CommandError::RampOutOfRange(secs));
        }
        Command::SetRamp(secs)
    } else if keyword.eq_ignore_ascii_case("GET") {
        Command::Get
    } else if keyword.eq_ignore_ascii_case("HELP") {
        Command::Help
    } else {
        return Err(CommandError::UnknownCommand(keyword.to_string()));
    };

    match tokens.next() {
        Some(extra) => Err(CommandError::UnexpectedArgument(extra.to_string())),
        None => Ok(command),
    }
}

fn parse_number(token: Option<&str>, what: &'static str) -> Result<f32, CommandError> {
    let token = token.ok_or(CommandError::MissingArgument(what))?;
    match token.parse::<f32>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(CommandError::BadNumber(token.to_string())),
    }
}

fn parse_target(token: &str) -> Result<ActuatorId, CommandError> {
    let mut chars = token.chars();
    let side = match chars.next().map(|c| c.to_ascii_uppercase()) {
        Some('L') => Side::Left,
        Some('R') => Side::Right,
        _ => return Err(CommandError::UnknownTarget(token.to_string())),
    };
    let index: usize = chars
        .as_str()
        .parse()
        .map_err(|_| CommandError::UnknownTarget(token.to_string()))?;
    if !(1..=STATIONS_PER_SIDE).contains(&index) {
        return Err(CommandError::StationOutOfRange(token.to_string()));
    }
    Ok(ActuatorId {
        side,
        station: index - 1,
    })
}

pub fn help_lines() -> Vec<String> {
    [
        "Commands:",
        "  SET ALL <deg>   - move every actuator to <deg>",
        "  SET L<i> <deg>  - move left actuator i (1..4, rear to front)",
        "  SET R<i> <deg>  - move right actuator i (1..4, rear to front)",
        "  RAMP <sec>      - ramp duration for SET, 0..10 s (0 = instant)",
        "  GET             - report targets, ramp and calibration",
        "  HELP            - show this help message",
    ]
    .iter()
    .map(|line| line.to_string())
    .collect()
}
