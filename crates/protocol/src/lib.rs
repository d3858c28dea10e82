//! Wire formats shared between the thermolink client and its monitor.
//!
//! Every message on the socket is a single UTF-8 line terminated by `\n`.
//! Outbound lines carry samples or window statistics; inbound lines carry
//! monitor commands (see [`commands`]).

pub mod commands;
pub mod error;
pub mod framing;
pub mod messages;
pub mod telemetry;

// Re-export primary types for convenience.
pub use commands::{Mode, PeerCommand};
pub use error::ProtocolError;
pub use framing::LineDecoder;
pub use messages::{PayloadFormat, encode_sample, encode_stats};
pub use telemetry::{Sample, WindowStats};

/// Terminator appended to every outbound message.
pub const LINE_TERMINATOR: u8 = b'\n';
