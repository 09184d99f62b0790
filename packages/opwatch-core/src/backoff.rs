//! Truncated exponential backoff between polls.
//!
//! Polling backoff deliberately carries no jitter: unlike retry backoff,
//! its purpose is to pace repeated status checks of a single operation, not
//! to de-correlate a thundering herd. The delay grows by a fixed multiplier
//! until it hits the cap and stays there.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the truncated exponential backoff schedule.
///
/// The defaults are illustrative, not normative: callers tuning for a
/// specific service should set their own values.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    /// Delay before the second poll (the first poll happens immediately).
    pub initial_delay: Duration,
    /// Upper bound on the delay between polls.
    pub max_delay: Duration,
    /// Growth factor applied after each sleep. Values below 1 are treated
    /// as 1 (constant delay).
    pub multiplier: f64,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(45),
            multiplier: 1.5,
        }
    }
}

impl ExponentialBackoff {
    /// Starts a fresh delay schedule from this configuration.
    #[must_use]
    pub fn schedule(&self) -> BackoffSchedule {
        BackoffSchedule {
            next: self.initial_delay.min(self.max_delay),
            max: self.max_delay,
            multiplier: self.multiplier.max(1.0),
        }
    }
}

// ---------------------------------------------------------------------------
// BackoffSchedule
// ---------------------------------------------------------------------------

/// One polling session's sequence of delays.
///
/// The sequence starts at `initial_delay` (clamped to `max_delay`), is
/// non-decreasing, and never exceeds `max_delay`.
#[derive(Debug, Clone)]
pub struct BackoffSchedule {
    next: Duration,
    max: Duration,
    multiplier: f64,
}

impl BackoffSchedule {
    /// Returns the delay to sleep now and advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        // Scale in float seconds: the product is clamped to `max` before
        // conversion, so it cannot overflow `Duration`.
        let scaled = delay.as_secs_f64() * self.multiplier;
        self.next = if scaled >= self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(scaled)
        };
        delay
    }
}

impl Iterator for BackoffSchedule {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.next_delay())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
