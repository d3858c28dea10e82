//! Time-windowed aggregation for stats mode.

use std::time::Duration;

use thermolink_protocol::{Sample, WindowStats};
use tokio::time::Instant;

/// Collects samples until the window has elapsed, then yields their stats.
///
/// The window opens with its first sample, so an idle period never produces
/// an empty report.
#[derive(Debug)]
pub struct StatsWindow {
    window: Duration,
    opened_at: Option<Instant>,
    samples: Vec<Sample>,
}

impl StatsWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            opened_at: None,
            samples: Vec::new(),
        }
    }

    /// Adds a sample taken at `now`; returns stats when the window closes.
    pub fn push(&mut self, sample: Sample, now: Instant) -> Option<WindowStats> {
        let opened_at = *self.opened_at.get_or_insert(now);
        self.samples.push(sample);

        if now.saturating_duration_since(opened_at) < self.window {
            return None;
        }

        let stats = WindowStats::from_samples(&self.samples);
        self.clear();
        stats
    }

    /// Changes the window length; takes effect for the open window too.
    pub fn set_window(&mut self, window: Duration) {
        self.window = window;
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.opened_at = None;
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
