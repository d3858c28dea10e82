//! Agent configuration management.
//!
//! Configuration is stored as TOML at `$THERMOLINK_CONFIG`, or
//! `~/.config/thermolink/agent.toml` when that is unset. A default file is
//! written on first start.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thermolink_protocol::{PayloadFormat, commands};
use thermolink_session::{BackoffPolicy, EndpointError, PeerEndpoint, SessionConfig};
use thermolink_telemetry::LoopConfig;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "THERMOLINK_CONFIG";

/// Where readings come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    /// Random walk around `sim_temperature` / `sim_humidity`.
    #[default]
    Simulated,
    /// Linux IIO device at `iio_device`.
    Iio,
}

/// Agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Monitor address, `host:port`.
    #[serde(default = "default_peer")]
    pub peer: String,

    /// Interval between cycles.
    #[serde(default = "default_cadence_ms")]
    pub cadence_ms: u64,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    /// How long to wait for the monitor's reply after each send.
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,

    #[serde(default = "default_backoff_initial_ms")]
    pub backoff_initial_ms: u64,

    /// Upper bound on the delay between connect attempts.
    #[serde(default = "default_backoff_ceiling_ms")]
    pub backoff_ceiling_ms: u64,

    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Line format for raw samples.
    #[serde(default)]
    pub format: PayloadFormat,

    /// Initial stats window; the monitor may change it at runtime.
    #[serde(default = "default_stats_window_ms")]
    pub stats_window_ms: u64,

    /// Interface that must carry an address before connecting. Empty means
    /// any non-loopback interface.
    #[serde(default)]
    pub link_interface: String,

    /// Interface polling interval. 0 disables link gating.
    #[serde(default = "default_link_poll_ms")]
    pub link_poll_ms: u64,

    #[serde(default)]
    pub sensor: SensorKind,

    #[serde(default = "default_iio_device")]
    pub iio_device: PathBuf,

    #[serde(default = "default_sim_temperature")]
    pub sim_temperature: f32,

    #[serde(default = "default_sim_humidity")]
    pub sim_humidity: f32,
}

fn default_peer() -> String {
    "192.168.4.1:8888".into()
}

fn default_cadence_ms() -> u64 {
    2000
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_write_timeout_ms() -> u64 {
    5000
}

fn default_response_timeout_ms() -> u64 {
    500
}

fn default_backoff_initial_ms() -> u64 {
    1000
}

fn default_backoff_ceiling_ms() -> u64 {
    30_000
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_stats_window_ms() -> u64 {
    5000
}

fn default_link_poll_ms() -> u64 {
    1000
}

fn default_iio_device() -> PathBuf {
    PathBuf::from("/sys/bus/iio/devices/iio:device0")
}

fn default_sim_temperature() -> f32 {
    25.5
}

fn default_sim_humidity() -> f32 {
    57.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            peer: default_peer(),
            cadence_ms: default_cadence_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            response_timeout_ms: default_response_timeout_ms(),
            backoff_initial_ms: default_backoff_initial_ms(),
            backoff_ceiling_ms: default_backoff_ceiling_ms(),
            backoff_factor: default_backoff_factor(),
            format: PayloadFormat::default(),
            stats_window_ms: default_stats_window_ms(),
            link_interface: String::new(),
            link_poll_ms: default_link_poll_ms(),
            sensor: SensorKind::default(),
            iio_device: default_iio_device(),
            sim_temperature: default_sim_temperature(),
            sim_humidity: default_sim_humidity(),
        }
    }
}

impl Config {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Writes the configuration as pretty TOML, creating parent directories.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Rejects settings the loop cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.endpoint()
            .map_err(|e| anyhow::anyhow!("invalid peer {:?}: {e}", self.peer))?;

        for (name, value) in [
            ("cadence_ms", self.cadence_ms),
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("write_timeout_ms", self.write_timeout_ms),
            ("response_timeout_ms", self.response_timeout_ms),
            ("backoff_initial_ms", self.backoff_initial_ms),
            ("backoff_ceiling_ms", self.backoff_ceiling_ms),
            ("stats_window_ms", self.stats_window_ms),
        ] {
            anyhow::ensure!(value > 0, "{name} must be greater than zero");
        }

        anyhow::ensure!(
            self.backoff_factor.is_finite() && self.backoff_factor >= 1.0,
            "backoff_factor must be at least 1.0, got {}",
            self.backoff_factor
        );
        anyhow::ensure!(
            self.backoff_ceiling_ms >= self.backoff_initial_ms,
            "backoff_ceiling_ms ({}) is below backoff_initial_ms ({})",
            self.backoff_ceiling_ms,
            self.backoff_initial_ms
        );
        anyhow::ensure!(
            commands::WINDOW_RANGE_MS.contains(&self.stats_window_ms),
            "stats_window_ms must be within {:?}",
            commands::WINDOW_RANGE_MS
        );
        anyhow::ensure!(
            self.sim_temperature.is_finite() && self.sim_humidity.is_finite(),
            "simulated readings must be finite"
        );
        Ok(())
    }

    pub fn endpoint(&self) -> Result<PeerEndpoint, EndpointError> {
        self.peer.parse()
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            response_timeout: Duration::from_millis(self.response_timeout_ms),
            backoff: BackoffPolicy {
                initial_delay: Duration::from_millis(self.backoff_initial_ms),
                max_delay: Duration::from_millis(self.backoff_ceiling_ms),
                backoff_factor: self.backoff_factor,
            },
        }
    }

    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            cadence: Duration::from_millis(self.cadence_ms),
            format: self.format,
            stats_window: Duration::from_millis(self.stats_window_ms),
            ..LoopConfig::default()
        }
    }

    /// `None` when any interface will do.
    pub fn link_interface(&self) -> Option<&str> {
        let name = self.link_interface.trim();
        (!name.is_empty()).then_some(name)
    }

    /// `None` when link gating is disabled.
    pub fn link_poll_interval(&self) -> Option<Duration> {
        (self.link_poll_ms > 0).then(|| Duration::from_millis(self.link_poll_ms))
    }
}

/// Returns the configuration file path.
fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home)
        .join(".config")
        .join("thermolink")
        .join("agent.toml")
}
