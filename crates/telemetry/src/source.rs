//! Pull interface to the sensor subsystem.

use std::future::Future;

use thermolink_protocol::Sample;

/// Produces one reading on demand.
///
/// `None` means "no reading right now" (sensor busy, bus error, warm-up);
/// the loop skips the cycle and asks again on the next one. Implementations
/// may block briefly but must not wait indefinitely.
pub trait ReadingSource: Send {
    fn next_sample(&mut self) -> impl Future<Output = Option<Sample>> + Send;
}
