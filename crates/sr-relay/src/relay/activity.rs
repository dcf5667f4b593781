//! Last-traffic timestamp shared by the pumps and the idle watchdog

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
pub struct ActivityClock {
    origin: Instant,
    /// Milliseconds since `origin` at the last touch
    last: AtomicU64,
}

impl ActivityClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            last: AtomicU64::new(0),
        }
    }

    /// Record traffic in either direction
    pub fn touch(&self) {
        let elapsed = self.origin.elapsed().as_millis() as u64;
        self.last.fetch_max(elapsed, Ordering::Relaxed);
    }

    /// Time since the last recorded traffic
    pub fn idle_for(&self) -> Duration {
        let now = self.origin.elapsed();
        now.saturating_sub(Duration::from_millis(self.last.load(Ordering::Relaxed)))
    }
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}
