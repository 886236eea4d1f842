//! Capped exponential backoff.
//!
//! - [`BackoffPolicy`]: base delay, cap and attempt budget
//! - [`calculate_backoff_delay`]: the raw `base * 2^attempt` math
//! - [`retry_with_backoff`]: async helper that re-runs a fallible operation
//!   while its error is classified as retryable
//!
//! Attempts are numbered from 1. The delay before attempt `n` is
//! `min(base * 2^(n-1), max)`, so the defaults give 1s, 2s, 4s, 8s, 16s.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::Classified;

// ─────────────────────────────────────────────────────────────────────────────
// Policy
// ─────────────────────────────────────────────────────────────────────────────

/// Default base delay in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
/// Default maximum delay in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
/// Default attempt budget.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Backoff parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackoffPolicy {
    /// Delay before the first attempt, in ms.
    pub base_delay_ms: u64,
    /// Cap on any single delay, in ms.
    pub max_delay_ms: u64,
    /// Maximum number of attempts.
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl BackoffPolicy {
    /// Delay in ms before the 1-based `attempt`.
    #[must_use]
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        calculate_backoff_delay(
            attempt.saturating_sub(1),
            self.base_delay_ms,
            self.max_delay_ms,
        )
    }

    /// Delay before the 1-based `attempt`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.delay_ms(attempt))
    }

    /// Whether the 1-based `attempt` is still inside the budget.
    #[must_use]
    pub fn allows(&self, attempt: u32) -> bool {
        attempt >= 1 && attempt <= self.max_attempts
    }
}

/// `min(max_delay, base_delay * 2^exponent)`.
///
/// Saturates instead of overflowing for large exponents.
#[must_use]
pub fn calculate_backoff_delay(exponent: u32, base_delay_ms: u64, max_delay_ms: u64) -> u64 {
    base_delay_ms
        .saturating_mul(1u64 << exponent.min(31))
        .min(max_delay_ms)
}

// ─────────────────────────────────────────────────────────────────────────────
// Async retry
// ─────────────────────────────────────────────────────────────────────────────

/// Run `op` once, then retry up to `policy.max_attempts` more times while the
/// error is retryable, sleeping `policy.delay_for(n)` before retry `n`.
///
/// `op` receives the 0-based try index (0 for the initial call).
pub async fn retry_with_backoff<T, E, F, Fut>(policy: &BackoffPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classified + Display,
{
    let mut retry = 0u32;
    loop {
        match op(retry).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && retry < policy.max_attempts => {
                retry += 1;
                let delay_ms = policy.delay_ms(retry);
                debug!(
                    retry,
                    delay_ms,
                    error = %err,
                    "retrying after transient failure"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            Err(err) => {
                if retry > 0 {
                    warn!(retries = retry, error = %err, "giving up after retries");
                }
                return Err(err);
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ErrorCategory, ErrorSeverity};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TestErr(ErrorSeverity);

    impl Display for TestErr {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error ({})", self.0)
        }
    }

    impl Classified for TestErr {
        fn category(&self) -> ErrorCategory {
            ErrorCategory::Transport
        }
        fn severity(&self) -> ErrorSeverity {
            self.0
        }
    }

    // -- policy --

    #[test]
    fn defaults() {
        let p = BackoffPolicy::default();
        assert_eq!(p.base_delay_ms, 1000);
        assert_eq!(p.max_delay_ms, 30_000);
        assert_eq!(p.max_attempts, 5);
    }

    #[test]
    fn delay_doubles_per_attempt() {
        let p = BackoffPolicy::default();
        let delays: Vec<u64> = (1..=5).map(|n| p.delay_ms(n)).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16_000]);
    }

    #[test]
    fn delay_is_capped() {
        let p = BackoffPolicy::default();
        assert_eq!(p.delay_ms(6), 30_000);
        assert_eq!(p.delay_ms(40), 30_000);
    }

    #[test]
    fn huge_exponent_saturates() {
        assert_eq!(calculate_backoff_delay(200, u64::MAX / 2, u64::MAX), u64::MAX);
    }

    #[test]
    fn allows_respects_budget() {
        let p = BackoffPolicy::default();
        assert!(!p.allows(0));
        assert!(p.allows(1));
        assert!(p.allows(5));
        assert!(!p.allows(6));
    }

    #[test]
    fn serde_fills_missing_fields() {
        let p: BackoffPolicy = serde_json::from_str(r#"{"maxAttempts": 2}"#).unwrap();
        assert_eq!(p.max_attempts, 2);
        assert_eq!(p.base_delay_ms, 1000);
    }

    // -- retry_with_backoff --

    #[tokio::test(start_paused = true)]
    async fn retries_transient_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let policy = BackoffPolicy::default();
        let start = tokio::time::Instant::now();

        let out: Result<u32, TestErr> = retry_with_backoff(&policy, |_| {
            let c = c.clone();
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(TestErr(ErrorSeverity::Transient))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(out.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s + 2s of virtual time
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(3000));
        assert!(elapsed < Duration::from_millis(3100));
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_fails_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let out: Result<(), TestErr> = retry_with_backoff(&BackoffPolicy::default(), |_| {
            let c = c.clone();
            async move {
                let _ = c.fetch_add(1, Ordering::SeqCst);
                Err(TestErr(ErrorSeverity::Error))
            }
        })
        .await;
        assert!(out.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_budget() {
        let policy = BackoffPolicy {
            max_attempts: 2,
            ..BackoffPolicy::default()
        };
        let tries = Arc::new(AtomicU32::new(0));
        let t = tries.clone();
        let out: Result<(), TestErr> = retry_with_backoff(&policy, |i| {
            let t = t.clone();
            async move {
                t.store(i, Ordering::SeqCst);
                Err(TestErr(ErrorSeverity::Transient))
            }
        })
        .await;
        assert!(out.is_err());
        assert_eq!(tries.load(Ordering::SeqCst), 2);
    }

    // -- properties --

    proptest::proptest! {
        #[test]
        fn delay_is_monotonic_and_capped(
            base in 1u64..10_000,
            cap in 1u64..120_000,
            attempt in 1u32..64,
        ) {
            let p = BackoffPolicy { base_delay_ms: base, max_delay_ms: cap, max_attempts: 5 };
            let d = p.delay_ms(attempt);
            proptest::prop_assert!(d <= cap);
            proptest::prop_assert!(p.delay_ms(attempt + 1) >= d);
        }
    }
}
