//! The connection-resilience state machine.
//!
//! ```text
//!            ensure_connected                 connect ok
//!  Absent ───────────────────▶ Connecting ─────────────────▶ Established
//!    ▲                            │  connect err / timeout         │
//!    │                            ▼                                │ send error,
//!    │                          Failed ── ensure_connected ──▶ …   │ link loss,
//!    └─────────────────────────────────────────────────────────────┘ close()
//! ```
//!
//! The manager is owned by a single task; all methods take `&mut self`, so at
//! most one connect attempt or send is ever in flight.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, trace, warn};

use crate::RESPONSE_BUFFER_SIZE;
use crate::endpoint::PeerEndpoint;
use crate::error::{ConnectError, ConnectFailure, SendError};
use crate::link::LinkMonitor;
use crate::transport::Connector;
use crate::types::{ConnectionState, SessionConfig};

/// Owns the one connection to the telemetry peer.
pub struct SessionManager<C: Connector, L: LinkMonitor> {
    endpoint: PeerEndpoint,
    connector: C,
    link: L,
    config: SessionConfig,
    stream: Option<C::Stream>,
    state: ConnectionState,
    /// Consecutive failed attempts in the current outage.
    attempts: u32,
    /// Sessions established over the manager's lifetime.
    sessions: u64,
}

impl<C: Connector, L: LinkMonitor> SessionManager<C, L> {
    pub fn new(endpoint: PeerEndpoint, connector: C, link: L, config: SessionConfig) -> Self {
        Self {
            endpoint,
            connector,
            link,
            config,
            stream: None,
            state: ConnectionState::Absent,
            attempts: 0,
            sessions: 0,
        }
    }

    /// Makes sure an established session exists.
    ///
    /// Suspends while the link is down (an established session is dropped
    /// first, since its socket cannot survive the link loss). A failed
    /// attempt sleeps for the backoff delay before returning the error, so
    /// callers may retry immediately without spinning.
    pub async fn ensure_connected(&mut self) -> Result<(), ConnectError> {
        if !self.link.is_link_up() {
            if self.stream.is_some() {
                info!(peer = %self.endpoint, "link lost, dropping session");
                self.close().await;
            }
            info!(peer = %self.endpoint, "waiting for link");
            self.link.wait_link_up().await;
            debug!(peer = %self.endpoint, "link up");
        }

        if self.state == ConnectionState::Established && self.stream.is_some() {
            return Ok(());
        }

        self.state = ConnectionState::Connecting;
        debug!(peer = %self.endpoint, attempt = self.attempts + 1, "connecting");

        let result = tokio::time::timeout(
            self.config.connect_timeout,
            self.connector.connect(&self.endpoint),
        )
        .await;

        let failure = match result {
            Ok(Ok(stream)) => {
                let recovered_after = self.attempts;
                self.stream = Some(stream);
                self.state = ConnectionState::Established;
                self.attempts = 0;
                self.sessions += 1;
                info!(
                    peer = %self.endpoint,
                    session = self.sessions,
                    recovered_after,
                    "connected"
                );
                return Ok(());
            }
            Ok(Err(e)) => ConnectFailure::Io(e),
            Err(_) => ConnectFailure::Timeout(self.config.connect_timeout),
        };

        self.state = ConnectionState::Failed;
        self.attempts = self.attempts.saturating_add(1);
        let retry_in = self.config.backoff.delay_for_attempt(self.attempts);
        warn!(
            peer = %self.endpoint,
            attempt = self.attempts,
            retry_in_ms = retry_in.as_millis() as u64,
            error = %failure,
            "connect failed"
        );

        tokio::time::sleep(retry_in).await;

        Err(ConnectError {
            attempt: self.attempts,
            retry_in,
            failure,
        })
    }

    /// Writes one payload and waits briefly for a response.
    ///
    /// Returns `Ok(None)` if the peer stayed silent for the response timeout.
    /// Any failure tears the session down; nothing is resent.
    pub async fn send_payload(&mut self, payload: &[u8]) -> Result<Option<Vec<u8>>, SendError> {
        let write_timeout = self.config.write_timeout;

        let Some(stream) = self.stream.as_mut() else {
            return Err(SendError::NotConnected);
        };

        let written = tokio::time::timeout(write_timeout, async {
            stream.write_all(payload).await?;
            stream.flush().await
        })
        .await;
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(self.teardown(SendError::Write(e))),
            Err(_) => return Err(self.teardown(SendError::WriteTimeout(write_timeout))),
        }
        trace!(peer = %self.endpoint, bytes = payload.len(), "payload written");

        self.read_response().await
    }

    /// Reads whatever the peer sent since the last exchange, without writing.
    ///
    /// Used to keep receiving monitor commands while no data is being sent.
    /// Same timeout and teardown rules as the read half of
    /// [`send_payload`](Self::send_payload).
    pub async fn poll_response(&mut self) -> Result<Option<Vec<u8>>, SendError> {
        self.read_response().await
    }

    async fn read_response(&mut self) -> Result<Option<Vec<u8>>, SendError> {
        let response_timeout = self.config.response_timeout;
        let Some(stream) = self.stream.as_mut() else {
            return Err(SendError::NotConnected);
        };

        let mut buf = vec![0u8; RESPONSE_BUFFER_SIZE];
        let read = tokio::time::timeout(response_timeout, stream.read(&mut buf)).await;
        match read {
            Ok(Ok(0)) => Err(self.teardown(SendError::PeerClosed)),
            Ok(Ok(n)) => {
                buf.truncate(n);
                Ok(Some(buf))
            }
            Ok(Err(e)) => Err(self.teardown(SendError::Read(e))),
            Err(_) => Ok(None),
        }
    }

    /// Releases the connection, if any. Idempotent.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!(peer = %self.endpoint, error = %e, "shutdown failed");
            }
            info!(peer = %self.endpoint, session = self.sessions, "session closed");
        }
        self.state = ConnectionState::Absent;
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_established(&self) -> bool {
        self.state == ConnectionState::Established
    }

    /// Consecutive failed connect attempts since the last success.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Number of sessions established so far.
    pub fn sessions_established(&self) -> u64 {
        self.sessions
    }

    pub fn endpoint(&self) -> &PeerEndpoint {
        &self.endpoint
    }

    fn teardown(&mut self, err: SendError) -> SendError {
        // Dropping the stream closes it.
        self.stream = None;
        self.state = ConnectionState::Absent;
        warn!(peer = %self.endpoint, session = self.sessions, error = %err, "session invalidated");
        err
    }
}
