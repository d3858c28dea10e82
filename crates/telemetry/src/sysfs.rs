//! Linux IIO sysfs reader for combined temperature/humidity sensors.
//!
//! The BME680/BME688 kernel driver (and most other IIO humidity sensors)
//! expose a device directory such as `/sys/bus/iio/devices/iio:device0`:
//!
//! ```text
//! in_temp_input                 milli-degrees Celsius
//! in_humidityrelative_input     milli-percent
//! ```
//!
//! Drivers without processed `_input` channels provide `_raw`, `_scale` and
//! optionally `_offset`; the value is then `(raw + offset) * scale`, in the
//! same milli units.

use std::path::{Path, PathBuf};

use thermolink_protocol::Sample;
use tracing::debug;

use crate::source::ReadingSource;

const TEMP_CHANNEL: &str = "in_temp";
const HUMIDITY_CHANNEL: &str = "in_humidityrelative";

/// Reads samples from an IIO device directory.
pub struct IioSource {
    device: PathBuf,
}

impl IioSource {
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
        }
    }

    pub fn device(&self) -> &Path {
        &self.device
    }

    /// Returns `true` if both channels can be read right now.
    pub fn probe(&self) -> bool {
        self.read().is_some()
    }

    fn read(&self) -> Option<Sample> {
        let temp = read_channel(&self.device, TEMP_CHANNEL)?;
        let humidity = read_channel(&self.device, HUMIDITY_CHANNEL)?;
        Some(Sample::now((temp / 1000.0) as f32, (humidity / 1000.0) as f32))
    }
}

impl ReadingSource for IioSource {
    async fn next_sample(&mut self) -> Option<Sample> {
        let sample = self.read();
        if sample.is_none() {
            debug!(device = %self.device.display(), "IIO channels unreadable");
        }
        sample
    }
}

/// Reads one channel in milli units, preferring the processed value.
fn read_channel(device: &Path, channel: &str) -> Option<f64> {
    if let Some(v) = read_f64(&device.join(format!("{channel}_input"))) {
        return Some(v);
    }
    let raw = read_f64(&device.join(format!("{channel}_raw")))?;
    let offset = read_f64(&device.join(format!("{channel}_offset"))).unwrap_or(0.0);
    let scale = read_f64(&device.join(format!("{channel}_scale"))).unwrap_or(1.0);
    Some((raw + offset) * scale)
}

fn read_trimmed(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
}

fn read_f64(path: &Path) -> Option<f64> {
    read_trimmed(path)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}
