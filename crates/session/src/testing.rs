//! In-memory connector for driving the session state machine without sockets.
//!
//! Every successful connect creates a `tokio::io::duplex` pair; the client
//! half goes to the session and the server half is delivered on the channel
//! returned by [`MockConnector::new`], so tests can play the peer.

use std::io;
use std::sync::{Arc, Mutex};

use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::endpoint::PeerEndpoint;
use crate::transport::Connector;

/// Connector whose outcomes are scripted by the test.
#[derive(Debug, Clone)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
    peers_tx: mpsc::UnboundedSender<DuplexStream>,
}

#[derive(Debug)]
struct MockState {
    refuse_next: u32,
    hang: bool,
    buffer_size: usize,
    attempts: Vec<Instant>,
}

impl MockConnector {
    /// Creates a connector that accepts every attempt, plus the receiver for
    /// server halves.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DuplexStream>) {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        let connector = Self {
            state: Arc::new(Mutex::new(MockState {
                refuse_next: 0,
                hang: false,
                buffer_size: 4096,
                attempts: Vec::new(),
            })),
            peers_tx,
        };
        (connector, peers_rx)
    }

    /// Refuses the next `n` attempts with `ConnectionRefused`.
    pub fn refuse_next(&self, n: u32) {
        self.lock().refuse_next = n;
    }

    /// Makes attempts never complete (until cleared).
    pub fn set_hang(&self, hang: bool) {
        self.lock().hang = hang;
    }

    /// Capacity of each direction of future duplex pairs.
    pub fn set_buffer_size(&self, size: usize) {
        self.lock().buffer_size = size.max(1);
    }

    /// Number of connect attempts made so far, successful or not.
    pub fn attempts(&self) -> usize {
        self.lock().attempts.len()
    }

    /// When each attempt started.
    pub fn attempt_times(&self) -> Vec<Instant> {
        self.lock().attempts.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // Poisoning is ignored; a failed assertion elsewhere already reports.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Connector for MockConnector {
    type Stream = DuplexStream;

    async fn connect(&self, _endpoint: &PeerEndpoint) -> io::Result<DuplexStream> {
        let (hang, buffer_size) = {
            let mut state = self.lock();
            state.attempts.push(Instant::now());
            if state.refuse_next > 0 {
                state.refuse_next -= 1;
                return Err(io::Error::from(io::ErrorKind::ConnectionRefused));
            }
            (state.hang, state.buffer_size)
        };

        if hang {
            std::future::pending::<()>().await;
        }

        let (client, server) = tokio::io::duplex(buffer_size);
        self.peers_tx
            .send(server)
            .map_err(|_| io::Error::from(io::ErrorKind::ConnectionReset))?;
        Ok(client)
    }
}
