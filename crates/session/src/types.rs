//! Public types for the session manager.

use std::fmt;
use std::time::Duration;

use crate::backoff::BackoffPolicy;

/// Lifecycle of the single connection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection; the next `ensure_connected` will try.
    Absent,
    /// A connect attempt is in flight.
    Connecting,
    /// Connected; payloads can be sent.
    Established,
    /// The last connect attempt failed; the next `ensure_connected` retries.
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Absent => "absent",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Established => "established",
            ConnectionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Timeouts and retry spacing for a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Bound on a single connect attempt.
    pub connect_timeout: Duration,
    /// Bound on writing one payload. A peer that stops draining its socket
    /// is treated as dead once this elapses.
    pub write_timeout: Duration,
    /// How long to wait for a response after each write.
    pub response_timeout: Duration,
    pub backoff: BackoffPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_millis(500),
            backoff: BackoffPolicy::default(),
        }
    }
}
