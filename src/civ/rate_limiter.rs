//! # Outbound Rate Limiter
//!
//! Fixed one-second window budget for replies sent onto the shared uplink.
//! Inbound processing is never throttled.

use std::time::{Duration, Instant};

/// Length of one budget window
pub const RATE_WINDOW: Duration = Duration::from_millis(1000);

/// Fixed-window send budget
#[derive(Debug, Clone)]
pub struct RateLimiter {
    max_per_window: u32,
    window_start: Option<Instant>,
    count: u32,
    dropped: u64,
}

impl RateLimiter {
    /// Create a limiter admitting `max_per_window` sends per second
    pub fn new(max_per_window: u32) -> Self {
        Self {
            max_per_window,
            window_start: None,
            count: 0,
            dropped: 0,
        }
    }

    /// Ask to send one reply
    ///
    /// # Arguments
    ///
    /// * `now` - Current time
    ///
    /// # Returns
    ///
    /// `true` if the send fits in the current window. The window restarts
    /// once a full second has elapsed since it opened.
    pub fn allow(&mut self, now: Instant) -> bool {
        let rolled_over = match self.window_start {
            Some(start) => now.saturating_duration_since(start) >= RATE_WINDOW,
            None => true,
        };

        if rolled_over {
            self.window_start = Some(now);
            self.count = 0;
        }

        if self.count < self.max_per_window {
            self.count += 1;
            true
        } else {
            self.dropped += 1;
            false
        }
    }

    /// Sends admitted in the current window
    pub fn current_count(&self) -> u32 {
        self.count
    }

    /// Sends rejected since creation or the last reset
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Configured budget
    pub fn max_per_window(&self) -> u32 {
        self.max_per_window
    }

    /// Start from an empty window
    pub fn reset(&mut self) {
        self.window_start = None;
        self.count = 0;
        self.dropped = 0;
    }
}
