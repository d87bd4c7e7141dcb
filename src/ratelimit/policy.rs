//! Fixed-window limit policy.

use std::time::Duration;

/// The process-wide limit applied to every client identity.
///
/// The request threshold and the window length are independent values.
/// [`LimitPolicy::legacy`] reproduces the historical behavior where a single
/// number served as both the threshold and the window length in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitPolicy {
    /// Maximum requests admitted per identity within one window
    threshold: u64,
    /// Time-to-live armed on the identity's counter
    window: Duration,
}

impl LimitPolicy {
    /// Longest window a store can arm: `PEXPIRE` takes a signed 64-bit
    /// millisecond count.
    pub const MAX_WINDOW: Duration = Duration::from_millis(i64::MAX as u64);

    /// Create a policy from a threshold and a window length.
    pub fn new(threshold: u64, window: Duration) -> Self {
        Self { threshold, window }
    }

    /// Create a policy whose window is `threshold` seconds long.
    pub fn legacy(threshold: u64) -> Self {
        Self::new(threshold, Duration::from_secs(threshold))
    }

    /// Get the request threshold.
    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Get the window length.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether the window can be armed as a store expiry.
    pub fn window_in_range(&self) -> bool {
        !self.window.is_zero() && self.window <= Self::MAX_WINDOW
    }

    /// Whether a counter value lies beyond the threshold.
    pub fn is_exceeded(&self, count: u64) -> bool {
        count > self.threshold
    }
}
