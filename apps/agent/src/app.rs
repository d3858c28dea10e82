//! Application orchestrator: wires the link poller, sensor and session together.

use thermolink_session::{SessionManager, TcpConnector, WatchLinkMonitor};
use thermolink_telemetry::{IioSource, SimulatedSource, TelemetryLoop};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, SensorKind};
use crate::link::{self, InterfacePoller};

/// Installs the log subscriber; `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Validates `config`, then blocks on [`run`] in a new multi-threaded runtime.
///
/// An invalid config is reported before the runtime exists, so nothing has
/// touched the network yet.
pub fn start(config: Config) -> anyhow::Result<()> {
    config.validate()?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        peer = %config.peer,
        sensor = ?config.sensor,
        "starting thermolink agent"
    );

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(config))?;

    tracing::info!("agent shut down cleanly");
    Ok(())
}

/// Runs the agent until shutdown is requested.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let endpoint = config.endpoint()?;

    // -- Link --
    let interface = config.link_interface().map(str::to_owned);
    let (link_handle, monitor) = match config.link_poll_interval() {
        Some(interval) => {
            let (handle, monitor) = WatchLinkMonitor::new(link::link_up(interface.as_deref()));
            let poller = InterfacePoller::new(interface.clone(), interval, handle.clone());
            tokio::spawn(poller.run(cancel.clone()));
            tracing::info!(
                interface = interface.as_deref().unwrap_or("any"),
                up = handle.is_up(),
                "link monitor started"
            );
            (handle, monitor)
        }
        None => {
            tracing::info!("link gating disabled");
            WatchLinkMonitor::new(true)
        }
    };

    // -- Session + loop --
    let session = SessionManager::new(endpoint, TcpConnector, monitor, config.session_config());
    let loop_config = config.loop_config();

    let task = match config.sensor {
        SensorKind::Simulated => {
            let source = SimulatedSource::new(config.sim_temperature, config.sim_humidity);
            tokio::spawn(TelemetryLoop::new(source, session, loop_config).run(cancel.clone()))
        }
        SensorKind::Iio => {
            let source = IioSource::new(&config.iio_device);
            if !source.probe() {
                tracing::warn!(
                    device = %source.device().display(),
                    "IIO device not readable yet, cycles will be skipped until it is"
                );
            }
            tokio::spawn(TelemetryLoop::new(source, session, loop_config).run(cancel.clone()))
        }
    };

    tracing::info!("agent ready");

    // -- Main loop: wait for shutdown --
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("SIGINT received, shutting down");
        }
        _ = terminate() => {
            tracing::info!("SIGTERM received, shutting down");
        }
    }

    // -- Graceful shutdown --
    cancel.cancel();
    let stats = task.await?;
    tracing::info!(
        sent = stats.sent,
        commands = stats.commands,
        link_up = link_handle.is_up(),
        "telemetry stopped"
    );
    Ok(())
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!(error = %e, "SIGTERM handler unavailable");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
