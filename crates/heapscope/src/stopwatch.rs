//! Accumulating millisecond stopwatch for event statistics.

use std::time::Duration;

use tokio::time::Instant;

/// Sums the time between `start` and `stop` calls until `reset`.
///
/// Uses tokio's clock so tests can drive it with a paused runtime.
#[derive(Debug, Clone, Default)]
pub struct Stopwatch {
    started: Option<Instant>,
    elapsed: Duration,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.started = None;
        self.elapsed = Duration::ZERO;
    }

    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Adds the time since the last `start`. Stopping a stopwatch that is
    /// not running changes nothing.
    pub fn stop(&mut self) {
        if let Some(started) = self.started.take() {
            self.elapsed += started.elapsed();
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Accumulated time in whole milliseconds, saturating at `i32::MAX` as
    /// carried by the event command.
    pub fn millis(&self) -> i32 {
        i32::try_from(self.elapsed.as_millis()).unwrap_or(i32::MAX)
    }
}
