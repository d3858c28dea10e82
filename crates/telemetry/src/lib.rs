//! Telemetry streaming for thermolink.
//!
//! Pulls readings from a [`ReadingSource`] on a fixed cadence, encodes them,
//! and hands them to a [`SessionManager`](thermolink_session::SessionManager)
//! one at a time. Responses from the monitor are decoded into commands that
//! adjust the loop at runtime.

mod simulated;
mod sysfs;
pub mod source;
pub mod telemetry_loop;
pub mod window;

pub use simulated::SimulatedSource;
pub use source::ReadingSource;
pub use sysfs::IioSource;
pub use telemetry_loop::{CycleOutcome, LoopConfig, LoopStats, TelemetryLoop};
pub use window::StatsWindow;
