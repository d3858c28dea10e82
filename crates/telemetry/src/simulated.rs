//! Random-walk sensor for bench setups without hardware.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thermolink_protocol::Sample;

use crate::source::ReadingSource;

/// Humidity is kept within this physical range.
const HUMIDITY_RANGE: (f32, f32) = (0.0, 100.0);

/// Simulated temperature/humidity sensor.
///
/// Each reading drifts by at most `step` from the previous one. An optional
/// dropout rate makes some reads return `None`, like a flaky bus.
pub struct SimulatedSource {
    temperature: f32,
    humidity: f32,
    step: f32,
    dropout: f64,
    rng: StdRng,
}

impl SimulatedSource {
    /// Starts at the given values with a drift of 0.1 per reading.
    pub fn new(temperature: f32, humidity: f32) -> Self {
        Self {
            temperature,
            humidity,
            step: 0.1,
            dropout: 0.0,
            rng: StdRng::from_entropy(),
        }
    }

    /// A source that always returns the same reading.
    pub fn constant(temperature: f32, humidity: f32) -> Self {
        Self::new(temperature, humidity).with_step(0.0)
    }

    pub fn with_step(mut self, step: f32) -> Self {
        self.step = step.abs();
        self
    }

    /// Probability in `[0, 1]` that a read reports no sample.
    pub fn with_dropout(mut self, probability: f64) -> Self {
        self.dropout = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        self
    }

    /// Reproducible sequence for tests.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    fn read(&mut self) -> Option<Sample> {
        if self.dropout > 0.0 && self.rng.gen_bool(self.dropout) {
            return None;
        }
        if self.step > 0.0 {
            self.temperature += self.rng.gen_range(-self.step..=self.step);
            self.humidity = (self.humidity + self.rng.gen_range(-self.step..=self.step))
                .clamp(HUMIDITY_RANGE.0, HUMIDITY_RANGE.1);
        }
        Some(Sample::now(self.temperature, self.humidity))
    }
}

impl ReadingSource for SimulatedSource {
    async fn next_sample(&mut self) -> Option<Sample> {
        self.read()
    }
}
