//! Error types for encoding and parsing wire messages.

/// Errors produced while encoding payloads or parsing monitor commands.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("non-finite reading: {0}")]
    NonFinite(&'static str),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("invalid argument for {command}: {reason}")]
    InvalidArgument {
        command: &'static str,
        reason: String,
    },
}
