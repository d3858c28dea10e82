//! Commands sent by the monitor back over the telemetry socket.
//!
//! ```text
//! START                 resume streaming
//! STOP                  pause streaming
//! MODE1                 raw mode: one line per sample
//! MODE2                 stats mode: one STATS line per window
//! SET_FREQ <ms>         sampling cadence, 100..=10000
//! SET_WINDOW <ms>       stats window, 1000..=60000
//! ```

use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ProtocolError;

/// Accepted cadence range in milliseconds.
pub const FREQ_RANGE_MS: RangeInclusive<u64> = 100..=10_000;

/// Accepted stats window range in milliseconds.
pub const WINDOW_RANGE_MS: RangeInclusive<u64> = 1_000..=60_000;

/// Streaming mode selected by the monitor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Every sample is sent as it is read.
    #[default]
    Raw,
    /// Samples are aggregated and sent as window statistics.
    Stats,
}

/// A command received from the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerCommand {
    Start,
    Stop,
    SetMode(Mode),
    SetFrequency(Duration),
    SetWindow(Duration),
}

impl FromStr for PeerCommand {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        // Exactly one space separates verb and argument; an empty token
        // means stray whitespace, which makes the line unknown.
        let mut parts = line.split(' ');
        let verb = parts.next().unwrap_or_default();
        let arg = parts.next();
        if verb.is_empty() || arg == Some("") || parts.next().is_some() {
            return Err(ProtocolError::UnknownCommand(line.to_string()));
        }

        match (verb, arg) {
            ("START", None) => Ok(PeerCommand::Start),
            ("STOP", None) => Ok(PeerCommand::Stop),
            ("MODE1", None) => Ok(PeerCommand::SetMode(Mode::Raw)),
            ("MODE2", None) => Ok(PeerCommand::SetMode(Mode::Stats)),
            ("SET_FREQ", Some(ms)) => {
                parse_millis("SET_FREQ", ms, FREQ_RANGE_MS).map(PeerCommand::SetFrequency)
            }
            ("SET_WINDOW", Some(ms)) => {
                parse_millis("SET_WINDOW", ms, WINDOW_RANGE_MS).map(PeerCommand::SetWindow)
            }
            _ => Err(ProtocolError::UnknownCommand(line.to_string())),
        }
    }
}

fn parse_millis(
    command: &'static str,
    raw: &str,
    range: RangeInclusive<u64>,
) -> Result<Duration, ProtocolError> {
    let ms: u64 = raw.parse().map_err(|_| ProtocolError::InvalidArgument {
        command,
        reason: format!("not a number: {raw}"),
    })?;
    if !range.contains(&ms) {
        return Err(ProtocolError::InvalidArgument {
            command,
            reason: format!(
                "{ms} ms outside {}..={} ms",
                range.start(),
                range.end()
            ),
        });
    }
    Ok(Duration::from_millis(ms))
}
