//! The sampling cadence and the exchange with the monitor.
//!
//! One cycle is `sample -> encode -> ensure_connected -> send`; any failure
//! ends the cycle early. The loop sleeps for the cadence after every cycle,
//! so a dead peer never makes it spin faster than the backoff allows.

use std::time::Duration;

use thermolink_protocol::{
    LineDecoder, Mode, PayloadFormat, PeerCommand, ProtocolError, Sample, encode_sample,
    encode_stats,
};
use thermolink_session::{ConnectError, Connector, LinkMonitor, SessionManager};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::source::ReadingSource;
use crate::window::StatsWindow;

/// Runtime-adjustable loop settings.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Pause between cycles.
    pub cadence: Duration,
    /// Encoding of raw-mode samples.
    pub format: PayloadFormat,
    /// Aggregation window in stats mode.
    pub stats_window: Duration,
    pub mode: Mode,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            cadence: Duration::from_secs(2),
            format: PayloadFormat::default(),
            stats_window: Duration::from_secs(5),
            mode: Mode::Raw,
        }
    }
}

/// Counters accumulated over the loop's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub cycles: u64,
    pub sent: u64,
    /// Cycles where the source had no reading.
    pub skipped: u64,
    pub encode_failures: u64,
    pub connect_failures: u64,
    /// Sends or command polls that invalidated the session.
    pub send_failures: u64,
    /// Monitor commands applied.
    pub commands: u64,
}

/// What a single cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Streaming is stopped; the session was only polled for commands.
    Paused,
    SampleUnavailable,
    EncodeFailed,
    /// Stats mode, window still open.
    Accumulating { buffered: usize },
    ConnectFailed,
    SendFailed,
    Sent {
        bytes: usize,
        response: Option<Vec<u8>>,
    },
}

/// Drives a [`ReadingSource`] into a [`SessionManager`].
pub struct TelemetryLoop<S, C, L>
where
    S: ReadingSource,
    C: Connector,
    L: LinkMonitor,
{
    source: S,
    session: SessionManager<C, L>,
    config: LoopConfig,
    window: StatsWindow,
    decoder: LineDecoder,
    paused: bool,
    stats: LoopStats,
}

impl<S, C, L> TelemetryLoop<S, C, L>
where
    S: ReadingSource,
    C: Connector,
    L: LinkMonitor,
{
    pub fn new(source: S, session: SessionManager<C, L>, config: LoopConfig) -> Self {
        Self {
            source,
            session,
            window: StatsWindow::new(config.stats_window),
            config,
            decoder: LineDecoder::new(),
            paused: false,
            stats: LoopStats::default(),
        }
    }

    /// Runs cycles until `cancel` fires, then closes the session.
    ///
    /// Cancellation abandons the current cycle, including a pending connect
    /// or backoff sleep.
    pub async fn run(mut self, cancel: CancellationToken) -> LoopStats {
        info!(
            peer = %self.session.endpoint(),
            cadence_ms = self.config.cadence.as_millis() as u64,
            format = ?self.config.format,
            mode = ?self.config.mode,
            "telemetry loop started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                outcome = self.run_cycle() => trace!(?outcome, "cycle done"),
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.cadence) => {}
            }
        }

        self.session.close().await;
        let stats = self.stats;
        info!(
            cycles = stats.cycles,
            sent = stats.sent,
            skipped = stats.skipped,
            connect_failures = stats.connect_failures,
            send_failures = stats.send_failures,
            "telemetry loop stopped"
        );
        stats
    }

    /// Executes one cycle without the trailing cadence sleep.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.stats.cycles += 1;

        if self.paused {
            return self.poll_while_paused().await;
        }

        let Some(sample) = self.source.next_sample().await else {
            self.stats.skipped += 1;
            debug!("no reading available, cycle skipped");
            return CycleOutcome::SampleUnavailable;
        };

        let payload = match self.encode(sample) {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                let buffered = self.window.len();
                if self.session.is_established() {
                    self.poll_commands().await;
                }
                return CycleOutcome::Accumulating { buffered };
            }
            Err(e) => {
                self.stats.encode_failures += 1;
                warn!(error = %e, "reading dropped");
                return CycleOutcome::EncodeFailed;
            }
        };

        if let Err(e) = self.connect().await {
            self.stats.connect_failures += 1;
            debug!(attempt = e.attempt, "peer unreachable, reading dropped");
            return CycleOutcome::ConnectFailed;
        }

        match self.session.send_payload(&payload).await {
            Ok(response) => {
                self.stats.sent += 1;
                match response.as_deref() {
                    Some(bytes) => {
                        info!(
                            bytes = payload.len(),
                            response = %String::from_utf8_lossy(bytes).trim_end(),
                            "sent"
                        );
                        self.handle_response(bytes);
                    }
                    None => info!(bytes = payload.len(), "sent"),
                }
                CycleOutcome::Sent {
                    bytes: payload.len(),
                    response,
                }
            }
            Err(e) => {
                self.stats.send_failures += 1;
                self.discard_partial_line();
                warn!(error = %e, "send failed, reading dropped");
                CycleOutcome::SendFailed
            }
        }
    }

    fn encode(&mut self, sample: Sample) -> Result<Option<Vec<u8>>, ProtocolError> {
        match self.config.mode {
            Mode::Raw => encode_sample(&sample, self.config.format).map(Some),
            Mode::Stats => {
                if !sample.is_finite() {
                    return Err(ProtocolError::NonFinite("sample"));
                }
                let closed = self.window.push(sample, Instant::now());
                Ok(closed.map(|stats| encode_stats(&stats)))
            }
        }
    }

    /// Ensures a session. If the manager replaced it, bytes buffered from
    /// the old socket must not prefix the new one's first line.
    async fn connect(&mut self) -> Result<(), ConnectError> {
        let before = self.session.sessions_established();
        let result = self.session.ensure_connected().await;
        if self.session.sessions_established() != before {
            self.discard_partial_line();
        }
        result
    }

    fn discard_partial_line(&mut self) {
        let dropped = self.decoder.pending_len();
        if dropped > 0 {
            debug!(dropped, "partial peer line discarded");
        }
        self.decoder.reset();
    }

    fn discard_window(&mut self) {
        if !self.window.is_empty() {
            debug!(samples = self.window.len(), "open stats window discarded");
        }
        self.window.clear();
    }

    async fn poll_while_paused(&mut self) -> CycleOutcome {
        if self.connect().await.is_err() {
            self.stats.connect_failures += 1;
            return CycleOutcome::ConnectFailed;
        }
        self.poll_commands().await;
        CycleOutcome::Paused
    }

    async fn poll_commands(&mut self) {
        match self.session.poll_response().await {
            Ok(Some(bytes)) => self.handle_response(&bytes),
            Ok(None) => {}
            Err(e) => {
                self.stats.send_failures += 1;
                self.discard_partial_line();
                debug!(error = %e, "command poll failed");
            }
        }
    }

    fn handle_response(&mut self, bytes: &[u8]) {
        for line in self.decoder.push(bytes) {
            match line.parse::<PeerCommand>() {
                Ok(command) => self.apply(command),
                Err(ProtocolError::UnknownCommand(_)) => debug!(%line, "peer message"),
                Err(e) => warn!(%line, error = %e, "command rejected"),
            }
        }
    }

    fn apply(&mut self, command: PeerCommand) {
        self.stats.commands += 1;
        match command {
            PeerCommand::Start => {
                if self.paused {
                    info!("streaming resumed");
                }
                self.paused = false;
            }
            PeerCommand::Stop => {
                if !self.paused {
                    info!("streaming paused");
                }
                self.paused = true;
                self.discard_window();
            }
            PeerCommand::SetMode(mode) => {
                if mode != self.config.mode {
                    self.discard_window();
                    info!(?mode, "mode changed");
                }
                self.config.mode = mode;
            }
            PeerCommand::SetFrequency(cadence) => {
                self.config.cadence = cadence;
                info!(cadence_ms = cadence.as_millis() as u64, "cadence changed");
            }
            PeerCommand::SetWindow(window) => {
                self.config.stats_window = window;
                self.window.set_window(window);
                info!(window_ms = window.as_millis() as u64, "stats window changed");
            }
        }
    }

    pub fn session(&self) -> &SessionManager<C, L> {
        &self.session
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn cadence(&self) -> Duration {
        self.config.cadence
    }

    pub fn mode(&self) -> Mode {
        self.config.mode
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use thermolink_session::testing::MockConnector;
    use thermolink_session::{
        AlwaysUp, BackoffPolicy, ConnectionState, PeerEndpoint, SessionConfig, WatchLinkMonitor,
    };
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
    use tokio::sync::mpsc;

    use super::*;
    use crate::SimulatedSource;

    const HUMAN: &str = "Temperatura: 25.50 °C, Humedad: 57.00 %\n";

    /// Replays a fixed list of readings, then repeats the last one.
    struct Scripted {
        readings: VecDeque<Option<Sample>>,
    }

    impl Scripted {
        fn new(readings: Vec<Option<Sample>>) -> Self {
            Self {
                readings: readings.into(),
            }
        }
    }

    impl ReadingSource for Scripted {
        async fn next_sample(&mut self) -> Option<Sample> {
            if self.readings.len() > 1 {
                self.readings.pop_front().flatten()
            } else {
                self.readings.front().cloned().flatten()
            }
        }
    }

    fn reading() -> Option<Sample> {
        Some(Sample::now(25.5, 57.0))
    }

    fn session_config() -> SessionConfig {
        SessionConfig {
            connect_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_millis(500),
            backoff: BackoffPolicy::default(),
        }
    }

    fn endpoint() -> PeerEndpoint {
        "192.168.4.1:8888".parse().unwrap()
    }

    type Peers = mpsc::UnboundedReceiver<DuplexStream>;

    fn telemetry<S: ReadingSource>(
        source: S,
    ) -> (TelemetryLoop<S, MockConnector, AlwaysUp>, MockConnector, Peers) {
        telemetry_with(source, LoopConfig::default())
    }

    fn telemetry_with<S: ReadingSource>(
        source: S,
        config: LoopConfig,
    ) -> (TelemetryLoop<S, MockConnector, AlwaysUp>, MockConnector, Peers) {
        let (connector, peers) = MockConnector::new();
        let session = SessionManager::new(endpoint(), connector.clone(), AlwaysUp, session_config());
        let telemetry = TelemetryLoop::new(source, session, config);
        (telemetry, connector, peers)
    }

    /// Connects in raw mode, then switches to stats through the monitor.
    async fn stats_session<S: ReadingSource>(
        telemetry: &mut TelemetryLoop<S, MockConnector, AlwaysUp>,
        peers: &mut Peers,
    ) -> DuplexStream {
        assert!(matches!(telemetry.run_cycle().await, CycleOutcome::Sent { .. }));
        let mut peer = peers.recv().await.unwrap();
        read_line(&mut peer, HUMAN).await;

        peer.write_all(b"MODE2\n").await.unwrap();
        assert!(matches!(telemetry.run_cycle().await, CycleOutcome::Sent { .. }));
        read_line(&mut peer, HUMAN).await;
        assert_eq!(telemetry.mode(), Mode::Stats);
        peer
    }

    async fn read_line(peer: &mut DuplexStream, expected: &str) {
        let mut buf = vec![0u8; expected.len()];
        peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), expected);
    }

    async fn assert_silent(peer: &mut DuplexStream) {
        let mut buf = [0u8; 1];
        let read = tokio::time::timeout(Duration::from_secs(1), peer.read(&mut buf)).await;
        assert!(read.is_err(), "peer received unexpected bytes");
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_three_times_then_delivers() {
        let (mut telemetry, connector, mut peers) = telemetry(SimulatedSource::constant(25.5, 57.0));
        connector.refuse_next(3);

        for _ in 0..3 {
            assert_eq!(telemetry.run_cycle().await, CycleOutcome::ConnectFailed);
        }
        let outcome = telemetry.run_cycle().await;
        assert_eq!(
            outcome,
            CycleOutcome::Sent {
                bytes: HUMAN.len(),
                response: None
            }
        );

        let mut peer = peers.recv().await.unwrap();
        read_line(&mut peer, HUMAN).await;

        let gaps: Vec<Duration> = connector
            .attempt_times()
            .windows(2)
            .map(|w| w[1] - w[0])
            .collect();
        assert!(gaps.windows(2).all(|g| g[0] <= g[1]), "{gaps:?}");

        let stats = telemetry.stats();
        assert_eq!(stats.connect_failures, 3);
        assert_eq!(stats.sent, 1);
        assert_eq!(telemetry.session().attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_after_peer_closes() {
        let (telemetry, connector, mut peers) = telemetry(SimulatedSource::constant(25.5, 57.0));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(telemetry.run(cancel.clone()));

        let mut first = peers.recv().await.unwrap();
        read_line(&mut first, HUMAN).await;
        first.shutdown().await.unwrap();

        let mut second = tokio::time::timeout(Duration::from_secs(30), peers.recv())
            .await
            .unwrap()
            .unwrap();
        read_line(&mut second, HUMAN).await;

        cancel.cancel();
        let stats = handle.await.unwrap();
        assert_eq!(connector.attempts(), 2);
        assert_eq!(stats.send_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_reading_skips_without_touching_session() {
        let source = Scripted::new(vec![reading(), None, reading()]);
        let (mut telemetry, connector, mut peers) = telemetry(source);

        assert!(matches!(telemetry.run_cycle().await, CycleOutcome::Sent { .. }));
        let mut peer = peers.recv().await.unwrap();
        read_line(&mut peer, HUMAN).await;

        assert_eq!(telemetry.run_cycle().await, CycleOutcome::SampleUnavailable);
        assert_eq!(connector.attempts(), 1);
        assert_eq!(telemetry.session().state(), ConnectionState::Established);
        assert_eq!(telemetry.session().attempts(), 0);
        assert_silent(&mut peer).await;

        assert!(matches!(telemetry.run_cycle().await, CycleOutcome::Sent { .. }));
        read_line(&mut peer, HUMAN).await;
        assert_eq!(telemetry.stats().skipped, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn link_loss_suspends_then_resumes() {
        let (connector, mut peers) = MockConnector::new();
        let (link, monitor) = WatchLinkMonitor::new(true);
        let session = SessionManager::new(endpoint(), connector.clone(), monitor, session_config());
        let telemetry = TelemetryLoop::new(
            SimulatedSource::constant(25.5, 57.0),
            session,
            LoopConfig::default(),
        );
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(telemetry.run(cancel.clone()));

        let mut first = peers.recv().await.unwrap();
        read_line(&mut first, HUMAN).await;

        link.set_up(false);
        // The session is shut down from our side once the loop notices.
        let mut rest = Vec::new();
        first.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest.len() % HUMAN.len(), 0);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(connector.attempts(), 1, "no connect while link is down");

        link.set_up(true);
        let mut second = peers.recv().await.unwrap();
        read_line(&mut second, HUMAN).await;

        cancel.cancel();
        let stats = handle.await.unwrap();
        assert_eq!(stats.connect_failures, 0);
        assert_eq!(connector.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stats_mode_sends_window_summary() {
        let (mut telemetry, _connector, mut peers) =
            telemetry(SimulatedSource::constant(25.5, 57.0));

        assert!(matches!(telemetry.run_cycle().await, CycleOutcome::Sent { .. }));
        let mut peer = peers.recv().await.unwrap();
        read_line(&mut peer, HUMAN).await;

        peer.write_all(b"MODE2\n").await.unwrap();
        // Next raw send carries the switch back in its response.
        assert!(matches!(telemetry.run_cycle().await, CycleOutcome::Sent { .. }));
        read_line(&mut peer, HUMAN).await;
        assert_eq!(telemetry.mode(), Mode::Stats);

        assert_eq!(
            telemetry.run_cycle().await,
            CycleOutcome::Accumulating { buffered: 1 }
        );
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(
            telemetry.run_cycle().await,
            CycleOutcome::Accumulating { buffered: 2 }
        );
        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(matches!(telemetry.run_cycle().await, CycleOutcome::Sent { .. }));

        read_line(&mut peer, "STATS 25.50 25.50 25.50 57.00 57.00 57.00\n").await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_pauses_until_start() {
        let (mut telemetry, connector, mut peers) =
            telemetry(SimulatedSource::constant(25.5, 57.0));

        telemetry.run_cycle().await;
        let mut peer = peers.recv().await.unwrap();
        read_line(&mut peer, HUMAN).await;

        peer.write_all(b"STOP\n").await.unwrap();
        telemetry.run_cycle().await;
        read_line(&mut peer, HUMAN).await;
        assert!(telemetry.is_paused());

        assert_eq!(telemetry.run_cycle().await, CycleOutcome::Paused);
        assert_silent(&mut peer).await;

        peer.write_all(b"START\n").await.unwrap();
        assert_eq!(telemetry.run_cycle().await, CycleOutcome::Paused);
        assert!(!telemetry.is_paused());

        assert!(matches!(telemetry.run_cycle().await, CycleOutcome::Sent { .. }));
        read_line(&mut peer, HUMAN).await;
        assert_eq!(telemetry.stats().commands, 2);
        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn set_freq_updates_cadence_and_ignores_bad_lines() {
        let (mut telemetry, _connector, mut peers) =
            telemetry(SimulatedSource::constant(25.5, 57.0));

        telemetry.run_cycle().await;
        let mut peer = peers.recv().await.unwrap();
        read_line(&mut peer, HUMAN).await;

        peer.write_all(b"SET_FREQ 500\nSET_FREQ 50\nHELLO\n")
            .await
            .unwrap();
        telemetry.run_cycle().await;

        assert_eq!(telemetry.cadence(), Duration::from_millis(500));
        assert_eq!(telemetry.stats().commands, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn set_window_applies_to_stats() {
        let (mut telemetry, _connector, mut peers) =
            telemetry(SimulatedSource::constant(25.5, 57.0));

        telemetry.run_cycle().await;
        let mut peer = peers.recv().await.unwrap();
        read_line(&mut peer, HUMAN).await;

        peer.write_all(b"SET_WINDOW 1000\nMODE2\n").await.unwrap();
        telemetry.run_cycle().await;
        read_line(&mut peer, HUMAN).await;
        assert_eq!(telemetry.config.stats_window, Duration::from_secs(1));

        assert!(matches!(
            telemetry.run_cycle().await,
            CycleOutcome::Accumulating { buffered: 1 }
        ));
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(matches!(telemetry.run_cycle().await, CycleOutcome::Sent { .. }));
        read_line(&mut peer, "STATS 25.50 25.50 25.50 57.00 57.00 57.00\n").await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_closes_session() {
        let (telemetry, _connector, mut peers) = telemetry(SimulatedSource::constant(25.5, 57.0));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(telemetry.run(cancel.clone()));

        let mut peer = peers.recv().await.unwrap();
        read_line(&mut peer, HUMAN).await;

        cancel.cancel();
        let stats = handle.await.unwrap();
        assert!(stats.cycles >= 1);

        let mut rest = Vec::new();
        peer.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest.len() % HUMAN.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_backoff() {
        let (telemetry, connector, _peers) = telemetry(SimulatedSource::constant(25.5, 57.0));
        connector.refuse_next(u32::MAX);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(telemetry.run(cancel.clone()));

        tokio::time::sleep(Duration::from_secs(10)).await;
        cancel.cancel();
        let stats = handle.await.unwrap();
        assert_eq!(stats.sent, 0);
        assert!(stats.connect_failures >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn non_finite_reading_is_dropped() {
        let source = Scripted::new(vec![Some(Sample::now(f32::NAN, 57.0))]);
        let (mut telemetry, connector, _peers) = telemetry(source);

        assert_eq!(telemetry.run_cycle().await, CycleOutcome::EncodeFailed);
        assert_eq!(connector.attempts(), 0);
        assert_eq!(telemetry.stats().encode_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn send_failure_drops_reading_and_reconnects() {
        let (mut telemetry, connector, mut peers) =
            telemetry(SimulatedSource::constant(25.5, 57.0));

        telemetry.run_cycle().await;
        drop(peers.recv().await.unwrap());

        assert_eq!(telemetry.run_cycle().await, CycleOutcome::SendFailed);
        assert_eq!(telemetry.session().state(), ConnectionState::Absent);

        assert!(matches!(telemetry.run_cycle().await, CycleOutcome::Sent { .. }));
        let mut fresh = peers.recv().await.unwrap();
        read_line(&mut fresh, HUMAN).await;
        assert_eq!(connector.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn partial_line_does_not_leak_into_next_session() {
        let (connector, mut peers) = MockConnector::new();
        let (link, monitor) = WatchLinkMonitor::new(true);
        let session = SessionManager::new(endpoint(), connector.clone(), monitor, session_config());
        let mut telemetry = TelemetryLoop::new(
            SimulatedSource::constant(25.5, 57.0),
            session,
            LoopConfig::default(),
        );

        telemetry.run_cycle().await;
        let mut old = peers.recv().await.unwrap();
        read_line(&mut old, HUMAN).await;

        // Only the first half of a command makes it before the link drops.
        old.write_all(b"SET_FR").await.unwrap();
        telemetry.run_cycle().await;
        read_line(&mut old, HUMAN).await;
        assert_eq!(telemetry.decoder.pending_len(), 6);

        link.set_up(false);
        let monitor_side = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            link.set_up(true);
            let mut fresh = peers.recv().await.unwrap();
            fresh.write_all(b"EQ 500\n").await.unwrap();
            fresh
        };
        let (outcome, mut fresh) = tokio::join!(telemetry.run_cycle(), monitor_side);
        read_line(&mut fresh, HUMAN).await;

        assert_eq!(
            outcome,
            CycleOutcome::Sent {
                bytes: HUMAN.len(),
                response: Some(b"EQ 500\n".to_vec())
            }
        );
        assert_eq!(telemetry.session().sessions_established(), 2);
        assert_eq!(telemetry.cadence(), Duration::from_secs(2));
        assert_eq!(telemetry.stats().commands, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn accumulating_never_opens_a_session() {
        let config = LoopConfig {
            mode: Mode::Stats,
            ..LoopConfig::default()
        };
        let (mut telemetry, connector, _peers) =
            telemetry_with(SimulatedSource::constant(25.5, 57.0), config);
        connector.refuse_next(u32::MAX);

        for buffered in 1..=3 {
            assert_eq!(
                telemetry.run_cycle().await,
                CycleOutcome::Accumulating { buffered }
            );
            tokio::time::advance(Duration::from_secs(1)).await;
        }
        assert_eq!(connector.attempts(), 0);
        assert_eq!(telemetry.session().state(), ConnectionState::Absent);

        // Only a closed window needs the peer; it is lost with the connect.
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(telemetry.run_cycle().await, CycleOutcome::ConnectFailed);
        assert_eq!(connector.attempts(), 1);
        assert_eq!(
            telemetry.run_cycle().await,
            CycleOutcome::Accumulating { buffered: 1 }
        );
        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_discards_open_window() {
        let (mut telemetry, _connector, mut peers) =
            telemetry(SimulatedSource::constant(25.5, 57.0));
        let mut peer = stats_session(&mut telemetry, &mut peers).await;

        for buffered in 1..=2 {
            assert_eq!(
                telemetry.run_cycle().await,
                CycleOutcome::Accumulating { buffered }
            );
        }

        peer.write_all(b"STOP\n").await.unwrap();
        assert_eq!(
            telemetry.run_cycle().await,
            CycleOutcome::Accumulating { buffered: 3 }
        );
        assert!(telemetry.is_paused());
        assert!(telemetry.window.is_empty());

        peer.write_all(b"START\n").await.unwrap();
        assert_eq!(telemetry.run_cycle().await, CycleOutcome::Paused);
        assert_eq!(
            telemetry.run_cycle().await,
            CycleOutcome::Accumulating { buffered: 1 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn mode_switch_discards_open_window() {
        let (mut telemetry, _connector, mut peers) =
            telemetry(SimulatedSource::constant(25.5, 57.0));
        let mut peer = stats_session(&mut telemetry, &mut peers).await;

        for buffered in 1..=2 {
            assert_eq!(
                telemetry.run_cycle().await,
                CycleOutcome::Accumulating { buffered }
            );
        }

        peer.write_all(b"MODE1\n").await.unwrap();
        telemetry.run_cycle().await;
        assert_eq!(telemetry.mode(), Mode::Raw);
        assert!(telemetry.window.is_empty());

        peer.write_all(b"MODE2\n").await.unwrap();
        assert!(matches!(telemetry.run_cycle().await, CycleOutcome::Sent { .. }));
        read_line(&mut peer, HUMAN).await;
        assert_eq!(
            telemetry.run_cycle().await,
            CycleOutcome::Accumulating { buffered: 1 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_stats_send_drops_window() {
        let (mut telemetry, connector, mut peers) =
            telemetry(SimulatedSource::constant(25.5, 57.0));
        let peer = stats_session(&mut telemetry, &mut peers).await;

        assert_eq!(
            telemetry.run_cycle().await,
            CycleOutcome::Accumulating { buffered: 1 }
        );
        tokio::time::advance(Duration::from_secs(5)).await;
        drop(peer);

        assert_eq!(telemetry.run_cycle().await, CycleOutcome::SendFailed);
        assert_eq!(telemetry.session().state(), ConnectionState::Absent);
        assert!(telemetry.window.is_empty());

        // The next window starts from scratch and does not reconnect yet.
        assert_eq!(
            telemetry.run_cycle().await,
            CycleOutcome::Accumulating { buffered: 1 }
        );
        assert_eq!(connector.attempts(), 1);
        assert!(peers.try_recv().is_err());
    }
}
