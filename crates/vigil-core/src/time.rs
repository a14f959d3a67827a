use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Wall-clock and monotonic time, injectable for tests.
///
/// The query engine reads `(wall_millis, tick_nanos)` as an ordered pair
/// immediately *after* snapshotting active transactions; every snapshot member
/// started before the tick was read, which is what keeps displayed active
/// durations non-negative.
pub trait TimeSource: Send + Sync {
    /// Wall-clock milliseconds since the UNIX epoch.
    fn wall_millis(&self) -> u64;

    /// Monotonic nanosecond counter. Only differences are meaningful.
    fn tick_nanos(&self) -> u64;
}

/// `TimeSource` backed by `SystemTime` and an `Instant` anchored at creation.
pub struct SystemTimeSource {
    origin: Instant,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTimeSource {
    fn wall_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64
    }

    fn tick_nanos(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }
}
