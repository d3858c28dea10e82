//! Error types for the session layer.

use std::time::Duration;

/// Invalid peer address; only produced at startup.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("peer host is empty")]
    EmptyHost,

    #[error("invalid peer host: {0}")]
    InvalidHost(String),

    #[error("missing port in peer address: {0}")]
    MissingPort(String),

    #[error("invalid peer port: {0}")]
    InvalidPort(String),
}

/// Why a single connection attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum ConnectFailure {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// A failed connection attempt. Always retryable.
///
/// By the time this is returned the backoff delay `retry_in` has already
/// elapsed.
#[derive(Debug, thiserror::Error)]
#[error("connect attempt {attempt} failed: {failure}")]
pub struct ConnectError {
    /// Consecutive failures in the current outage, including this one.
    pub attempt: u32,
    /// Backoff delay applied after this attempt.
    pub retry_in: Duration,
    #[source]
    pub failure: ConnectFailure,
}

/// Delivery failure on an established session.
///
/// Every variant except [`SendError::NotConnected`] tears the session down.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("no established session")]
    NotConnected,

    #[error("write failed: {0}")]
    Write(std::io::Error),

    #[error("write timed out after {0:?}")]
    WriteTimeout(Duration),

    #[error("read failed: {0}")]
    Read(std::io::Error),

    #[error("connection closed by peer")]
    PeerClosed,
}
