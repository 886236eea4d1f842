//! Reconnect attempt bookkeeping.

use std::time::Duration;

use casework_core::BackoffPolicy;

/// Attempt counter over a [`BackoffPolicy`].
///
/// The counter grows with each failure and resets on a successful open. The
/// delay before attempt `n` is `min(base * 2^(n-1), cap)`.
#[derive(Clone, Debug)]
pub struct ReconnectPolicy {
    backoff: BackoffPolicy,
    attempt: u32,
}

impl ReconnectPolicy {
    /// Fresh policy with the counter at zero.
    #[must_use]
    pub fn new(backoff: BackoffPolicy) -> Self {
        Self {
            backoff,
            attempt: 0,
        }
    }

    /// Attempts scheduled since the last successful open.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Schedule the next attempt.
    ///
    /// Returns the attempt number and its delay, or `None` once the budget
    /// is spent.
    pub fn next_attempt(&mut self) -> Option<(u32, Duration)> {
        let next = self.attempt + 1;
        if !self.backoff.allows(next) {
            return None;
        }
        self.attempt = next;
        Some((next, self.backoff.delay_for(next)))
    }

    /// Successful open: start over.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
