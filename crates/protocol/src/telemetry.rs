use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One environmental reading.
///
/// Immutable once produced; the timestamp is taken at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Temperature in degrees Celsius.
    pub temperature: f32,
    /// Relative humidity in percent.
    pub humidity: f32,
    pub timestamp: DateTime<Utc>,
}

impl Sample {
    /// Creates a sample stamped with the current wall-clock time.
    pub fn now(temperature: f32, humidity: f32) -> Self {
        Self {
            temperature,
            humidity,
            timestamp: Utc::now(),
        }
    }

    /// Returns `true` if both channels hold finite values.
    pub fn is_finite(&self) -> bool {
        self.temperature.is_finite() && self.humidity.is_finite()
    }
}

/// Aggregate of the samples collected during one stats window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowStats {
    pub temp_avg: f32,
    pub temp_max: f32,
    pub temp_min: f32,
    pub hum_avg: f32,
    pub hum_max: f32,
    pub hum_min: f32,
    pub count: usize,
}

impl WindowStats {
    /// Computes statistics over `samples`; returns `None` for an empty slice.
    pub fn from_samples(samples: &[Sample]) -> Option<Self> {
        let first = samples.first()?;
        let mut stats = WindowStats {
            temp_avg: 0.0,
            temp_max: first.temperature,
            temp_min: first.temperature,
            hum_avg: 0.0,
            hum_max: first.humidity,
            hum_min: first.humidity,
            count: samples.len(),
        };

        let mut temp_sum = 0.0f64;
        let mut hum_sum = 0.0f64;
        for s in samples {
            temp_sum += f64::from(s.temperature);
            hum_sum += f64::from(s.humidity);
            stats.temp_max = stats.temp_max.max(s.temperature);
            stats.temp_min = stats.temp_min.min(s.temperature);
            stats.hum_max = stats.hum_max.max(s.humidity);
            stats.hum_min = stats.hum_min.min(s.humidity);
        }
        stats.temp_avg = (temp_sum / samples.len() as f64) as f32;
        stats.hum_avg = (hum_sum / samples.len() as f64) as f32;

        Some(stats)
    }
}
