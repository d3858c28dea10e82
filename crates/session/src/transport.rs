//! Transport seam between the session state machine and real sockets.

use std::future::Future;
use std::io;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::trace;

use crate::endpoint::PeerEndpoint;

/// Opens byte-stream connections to the peer.
///
/// The session manager applies its own connect timeout around
/// [`Connector::connect`], so implementations need not bound it.
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn connect(
        &self,
        endpoint: &PeerEndpoint,
    ) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Plain TCP with Nagle disabled (one small line per cycle).
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, endpoint: &PeerEndpoint) -> io::Result<TcpStream> {
        let stream = TcpStream::connect((endpoint.host(), endpoint.port())).await?;
        stream.set_nodelay(true)?;
        trace!(
            peer = %endpoint,
            local = ?stream.local_addr().ok(),
            "tcp stream opened"
        );
        Ok(stream)
    }
}
