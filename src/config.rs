//! Scheduler configuration.

use std::time::Duration;

/// Runner configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Time credited to `elapsed` by each [`crate::Scheduler::tick`]
    pub frame_delta: Duration,
    /// Maximum number of finished entries kept, newest first
    pub history_limit: Option<usize>,
    /// Stop the whole run after the first failed test
    pub stop_on_fail: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        // One frame at 60 Hz
        Self {
            frame_delta: Duration::from_micros(16_667),
            history_limit: None,
            stop_on_fail: false,
        }
    }
}

impl RunnerConfig {
    /// Create a new config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-tick frame delta
    pub fn with_frame_delta(mut self, delta: Duration) -> Self {
        self.frame_delta = delta;
        self
    }

    /// Limit the finished history
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    pub fn with_stop_on_fail(mut self, stop: bool) -> Self {
        self.stop_on_fail = stop;
        self
    }
}
