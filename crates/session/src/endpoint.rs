//! Address of the telemetry sink.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::error::EndpointError;

/// Immutable `(host, port)` pair identifying the peer.
///
/// The host is either an IP literal or a name resolved on every connect
/// attempt, so DNS changes are picked up after a reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerEndpoint {
    host: String,
    port: u16,
}

impl PeerEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, EndpointError> {
        let host = host.into();
        if host.is_empty() {
            return Err(EndpointError::EmptyHost);
        }
        if host.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(EndpointError::InvalidHost(host));
        }
        if port == 0 {
            return Err(EndpointError::InvalidPort("0".into()));
        }
        Ok(Self { host, port })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl FromStr for PeerEndpoint {
    type Err = EndpointError;

    /// Parses `host:port`, `a.b.c.d:port` or `[v6]:port`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Self::new(addr.ip().to_string(), addr.port());
        }

        let Some((host, port)) = s.rsplit_once(':') else {
            return Err(EndpointError::MissingPort(s.to_string()));
        };
        if host.contains(':') || host.starts_with('[') {
            // Unbracketed or malformed IPv6.
            return Err(EndpointError::InvalidHost(host.to_string()));
        }
        let port: u16 = port
            .parse()
            .map_err(|_| EndpointError::InvalidPort(port.to_string()))?;
        Self::new(host, port)
    }
}

impl fmt::Display for PeerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
