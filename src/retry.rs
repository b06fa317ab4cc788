// ABOUTME: Bounded fixed-delay retry for fallible async operations.
// ABOUTME: Logs every failed attempt with the retries left and returns the last error.

use serde::Deserialize;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// How many times to retry, and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Zero means try once.
    pub retries: u32,
    /// Fixed pause between consecutive attempts.
    #[serde(with = "humantime_serde")]
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    /// A single attempt, no retries.
    pub fn once() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Total number of attempts this policy allows.
    pub fn attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// Run `operation` until it succeeds or the policy's retries are spent.
///
/// The operation is invoked afresh for every attempt. Each failure is logged
/// at `warn` with the number of retries left; the error of the final attempt
/// is returned unchanged.
pub async fn retry<T, E, F, Fut>(policy: RetryPolicy, label: &str, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut retries_left = policy.retries;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::warn!(operation = label, retries_left, error = %e, "attempt failed");
                if retries_left == 0 {
                    return Err(e);
                }
                retries_left -= 1;
                if !policy.delay.is_zero() {
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cell::Cell;
    use tokio::time::Instant;

    async fn flaky(calls: &Cell<u32>, failures: u32) -> Result<u32, String> {
        let n = calls.get() + 1;
        calls.set(n);
        if n <= failures {
            Err(format!("failure {n}"))
        } else {
            Ok(n)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let policy = RetryPolicy::new(3, Duration::from_secs(2));
        let start = Instant::now();

        let result = retry(policy, "list", || flaky(&calls, 2)).await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.get(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_returns_last_error() {
        let calls = Cell::new(0);
        let policy = RetryPolicy::new(3, Duration::from_secs(2));
        let start = Instant::now();

        let result = retry(policy, "list", || flaky(&calls, u32::MAX)).await;

        assert_eq!(result, Err("failure 4".to_string()));
        assert_eq!(calls.get(), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_tries_once_without_sleeping() {
        let calls = Cell::new(0);
        let start = Instant::now();

        let result = retry(RetryPolicy::new(0, Duration::from_secs(5)), "prune", || {
            flaky(&calls, 1)
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[test]
    fn policy_deserializes_humantime() {
        let policy: RetryPolicy = serde_yaml::from_str("retries: 1\ndelay: 500ms").unwrap();
        assert_eq!(policy, RetryPolicy::new(1, Duration::from_millis(500)));

        let defaults: RetryPolicy = serde_yaml::from_str("{}").unwrap();
        assert_eq!(defaults, RetryPolicy::default());
    }

    proptest! {
        #[test]
        fn attempts_match_budget(retries in 0u32..8, failures in 0u32..12) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();
            let calls = Cell::new(0);
            let policy = RetryPolicy::new(retries, Duration::ZERO);

            let result = rt.block_on(retry(policy, "prop", || flaky(&calls, failures)));

            if failures <= retries {
                prop_assert_eq!(result, Ok(failures + 1));
                prop_assert_eq!(calls.get(), failures + 1);
            } else {
                prop_assert!(result.is_err());
                prop_assert_eq!(calls.get(), retries + 1);
            }
        }
    }
}
