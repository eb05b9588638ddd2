//! Generic retry/backoff/timeout/circuit-breaker executor for suspension
//! points (§5): the LLM client, scanner adapters, and any other external
//! call that must honor a deadline and a retry budget. Directly grounded
//! on the teacher's `sandbox::execution` module.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AegisError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExecutionConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_retries: 2,
            backoff_base_ms: 500,
        }
    }
}

/// Per-service circuit breaker: closed → open after `threshold` consecutive
/// failures; a caller transitions it back to half-open/closed via
/// `record_success` once a recovery probe succeeds.
#[derive(Debug)]
pub struct CircuitBreaker {
    consecutive_failures: AtomicU32,
    threshold: u32,
}

impl CircuitBreaker {
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive_failures: AtomicU32::new(0),
            threshold,
        }
    }

    pub fn is_open(&self) -> bool {
        self.consecutive_failures.load(Ordering::SeqCst) >= self.threshold
    }

    pub fn record_failure(&self) {
        self.consecutive_failures.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
    }

    pub fn failure_count(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionResult<T> {
    pub value: T,
    pub attempts: u32,
}

/// Run `call` with exponential backoff, a per-attempt timeout, and a
/// circuit breaker gate. Retries transient errors only — the caller's
/// `call` closure is expected to distinguish retryable failures by
/// returning `Err(AegisError::Transient(_))`; any other error kind is
/// returned immediately without consuming the retry budget.
pub async fn execute_with_controls<F, Fut, T>(
    config: &ExecutionConfig,
    breaker: &CircuitBreaker,
    mut call: F,
) -> Result<ExecutionResult<T>, AegisError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, AegisError>>,
{
    if breaker.is_open() {
        return Err(AegisError::Policy("circuit breaker open".to_string()));
    }

    let max_attempts = config.max_retries + 1;
    let mut last_err = None;

    for attempt in 1..=max_attempts {
        let timeout = Duration::from_millis(config.timeout_ms);
        match tokio::time::timeout(timeout, call()).await {
            Ok(Ok(value)) => {
                breaker.record_success();
                return Ok(ExecutionResult { value, attempts: attempt });
            }
            Ok(Err(AegisError::Transient(msg))) => {
                breaker.record_failure();
                last_err = Some(AegisError::Transient(msg));
            }
            Ok(Err(other)) => {
                return Err(other);
            }
            Err(_elapsed) => {
                breaker.record_failure();
                last_err = Some(AegisError::Transient("call timed out".to_string()));
            }
        }

        if attempt < max_attempts {
            let backoff = config.backoff_base_ms * 2u64.pow(attempt - 1);
            tokio::time::sleep(Duration::from_millis(backoff)).await;
        }
    }

    Err(last_err.unwrap_or_else(|| AegisError::Transient("exhausted retries".to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32 as Counter;
    use std::sync::Arc;

    #[tokio::test]
    async fn succeeds_on_first_attempt() {
        let breaker = CircuitBreaker::new(3);
        let config = ExecutionConfig::default();
        let result = execute_with_controls(&config, &breaker, || async { Ok::<_, AegisError>(42) })
            .await
            .unwrap();
        assert_eq!(result.value, 42);
        assert_eq!(result.attempts, 1);
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let breaker = CircuitBreaker::new(5);
        let config = ExecutionConfig {
            timeout_ms: 1000,
            max_retries: 3,
            backoff_base_ms: 1,
        };
        let calls = Arc::new(Counter::new(0));
        let calls_clone = calls.clone();
        let result = execute_with_controls(&config, &breaker, move || {
            let calls = calls_clone.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(AegisError::Transient("not yet".to_string()))
                } else {
                    Ok(99)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result.value, 99);
        assert_eq!(result.attempts, 3);
    }

    #[tokio::test]
    async fn exhausts_retries_and_trips_breaker() {
        let breaker = CircuitBreaker::new(2);
        let config = ExecutionConfig {
            timeout_ms: 1000,
            max_retries: 1,
            backoff_base_ms: 1,
        };
        let result = execute_with_controls(&config, &breaker, || async {
            Err::<i32, _>(AegisError::Transient("always fails".to_string()))
        })
        .await;
        assert!(result.is_err());
        assert!(breaker.is_open());
    }

    #[tokio::test]
    async fn open_breaker_short_circuits() {
        let breaker = CircuitBreaker::new(1);
        breaker.record_failure();
        let config = ExecutionConfig::default();
        let result = execute_with_controls(&config, &breaker, || async { Ok::<_, AegisError>(1) }).await;
        assert!(matches!(result, Err(AegisError::Policy(_))));
    }

    #[tokio::test]
    async fn non_transient_error_is_not_retried() {
        let breaker = CircuitBreaker::new(5);
        let config = ExecutionConfig::default();
        let calls = Arc::new(Counter::new(0));
        let calls_clone = calls.clone();
        let result = execute_with_controls(&config, &breaker, move || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(AegisError::Auth("bad credentials".to_string()))
            }
        })
        .await;
        assert!(matches!(result, Err(AegisError::Auth(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
