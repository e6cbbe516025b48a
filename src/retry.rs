//! Retry policy for transient RPC failures
//!
//! Exponential backoff with jitter. Only `UNAVAILABLE`, `UNIMPLEMENTED` and
//! `RESOURCE_EXHAUSTED` are retried; every other error is returned at once.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, RpcCode, WorkcellError};

/// Upper bound on attempts accepted from configuration.
pub const MAX_ATTEMPTS_CAP: u32 = 15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, the first one included.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS_CAP,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Clamped to [`MAX_ATTEMPTS_CAP`].
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.clamp(1, MAX_ATTEMPTS_CAP);
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Delay before retry number `retry` (1-based). Carries ±10 % jitter and
    /// is capped at `max_delay`.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let jitter = 1.0 + (unit_jitter() * 0.2 - 0.1);
        Duration::from_secs_f64((base * jitter).min(self.max_delay.as_secs_f64()).max(0.0))
    }

    /// Whether another attempt is allowed after `attempts` attempts.
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts.min(MAX_ATTEMPTS_CAP)
    }
}

/// Uniform value in [0, 1) drawn from a v4 UUID.
fn unit_jitter() -> f64 {
    let bits = (Uuid::new_v4().as_u128() >> 75) as u64;
    bits as f64 / (1u64 << 53) as f64
}

pub fn is_transient(code: RpcCode) -> bool {
    matches!(
        code,
        RpcCode::Unavailable | RpcCode::Unimplemented | RpcCode::ResourceExhausted
    )
}

fn is_retryable(error: &WorkcellError) -> bool {
    matches!(error, WorkcellError::Remote { code, .. } if is_transient(*code))
}

/// Run `call` until it succeeds, fails with a non-transient error, or the
/// policy runs out of attempts.
pub async fn run_with_retry<T, F, Fut>(policy: &RetryPolicy, name: &str, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        match call().await {
            Ok(value) => return Ok(value),
            Err(error) if is_retryable(&error) && policy.should_retry(attempts) => {
                let delay = policy.delay_for_retry(attempts);
                tracing::debug!(
                    rpc = name,
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    "retrying after transient error: {}",
                    error
                );
                tokio::time::sleep(delay).await;
            }
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::default()
            .with_initial_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(2))
    }

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 15);
        assert!(policy.should_retry(14));
        assert!(!policy.should_retry(15));
        assert!(!RetryPolicy::no_retry().should_retry(1));
        assert_eq!(RetryPolicy::new().with_max_attempts(100).max_attempts, 15);
    }

    #[test]
    fn test_delay_grows_and_is_capped() {
        let policy = RetryPolicy::default()
            .with_initial_delay(Duration::from_millis(500))
            .with_max_delay(Duration::from_secs(2));
        assert_eq!(policy.delay_for_retry(0), Duration::ZERO);
        let first = policy.delay_for_retry(1);
        assert!(first >= Duration::from_millis(450) && first <= Duration::from_millis(550));
        assert!(policy.delay_for_retry(10) <= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_transient_codes_are_retried() {
        let calls = AtomicUsize::new(0);
        let script = [
            RpcCode::Unavailable,
            RpcCode::Unimplemented,
            RpcCode::ResourceExhausted,
            RpcCode::Ok,
        ];
        let result = run_with_retry(&fast_policy(), "Test", || {
            let code = script[calls.fetch_add(1, Ordering::SeqCst)];
            async move {
                match code {
                    RpcCode::Ok => Ok("done"),
                    code => Err(WorkcellError::remote(code, "try again")),
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_other_codes_fail_immediately() {
        let calls = AtomicUsize::new(0);
        let err = run_with_retry(&fast_policy(), "Test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(WorkcellError::remote(RpcCode::InvalidArgument, "bad")) }
        })
        .await
        .unwrap_err();
        assert_eq!(err.rpc_code(), Some(RpcCode::InvalidArgument));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicUsize::new(0);
        let policy = fast_policy().with_max_attempts(3);
        let err = run_with_retry(&policy, "Test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(WorkcellError::remote(RpcCode::Unavailable, "down")) }
        })
        .await
        .unwrap_err();
        assert_eq!(err.rpc_code(), Some(RpcCode::Unavailable));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
