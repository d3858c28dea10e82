//! Session management for a single upstream telemetry peer.
//!
//! [`SessionManager`] owns at most one transport connection, gates connect
//! attempts on a [`LinkMonitor`], spaces failed attempts with a
//! [`BackoffPolicy`], and invalidates the connection on any I/O failure so the
//! next send reconnects transparently.

pub mod backoff;
pub mod endpoint;
pub mod error;
pub mod link;
pub mod manager;
pub mod transport;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backoff::BackoffPolicy;
pub use endpoint::PeerEndpoint;
pub use error::{ConnectError, ConnectFailure, EndpointError, SendError};
pub use link::{AlwaysUp, LinkHandle, LinkMonitor, WatchLinkMonitor};
pub use manager::SessionManager;
pub use transport::{Connector, TcpConnector};
pub use types::{ConnectionState, SessionConfig};

/// Maximum number of response bytes taken from a single read.
pub const RESPONSE_BUFFER_SIZE: usize = 1024;
