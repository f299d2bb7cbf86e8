//! Timing knobs for the fetch loop and the pacer.

use std::time::Duration;

/// How often to fetch, and how long the pacer waits between steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingConfig {
    /// Interval between snapshot fetches. The first fetch is immediate.
    pub fetch_interval: Duration,
    /// Pause after an update that moved routes around, so the reorder can
    /// finish on screen before the next one lands.
    pub settle_delay: Duration,
    /// Pause before checking an empty queue again.
    pub idle_poll_delay: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            fetch_interval: Duration::from_millis(1000),
            settle_delay: Duration::from_millis(1000),
            idle_poll_delay: Duration::from_millis(200),
        }
    }
}

impl PacingConfig {
    pub fn from_millis(fetch_ms: u64, settle_ms: u64, idle_ms: u64) -> Self {
        Self {
            fetch_interval: Duration::from_millis(fetch_ms),
            settle_delay: Duration::from_millis(settle_ms),
            idle_poll_delay: Duration::from_millis(idle_ms),
        }
    }
}
