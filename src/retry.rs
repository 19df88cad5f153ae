// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Retry and timeout combinators for upstream calls
//!
//! `with_retry` re-runs a failed operation with exponential backoff and
//! surfaces the final error unchanged. Every error is retried the same way;
//! the classifier decides what is transient, not the executor.
//!
//! `with_timeout` races an operation against a deadline. The operation runs
//! as a spawned task, so a timeout abandons the wait without aborting the
//! call; the eventual result of a timed-out call is discarded.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::WebSearchError;

/// Run an operation with retries and exponential backoff
///
/// Attempts the operation up to `max_retries + 1` times, sleeping
/// `base_delay * 2^attempt` between failures. The last error is returned
/// unchanged once the budget is exhausted.
pub async fn with_retry<T, F, Fut>(
    operation: F,
    max_retries: u32,
    base_delay: Duration,
) -> Result<T, WebSearchError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, WebSearchError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= max_retries {
                    return Err(err);
                }
                let delay = base_delay * 2u32.saturating_pow(attempt);
                debug!(
                    "Attempt {} failed ({}), retrying in {:?}",
                    attempt + 1,
                    err,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Race an operation against a deadline
///
/// The operation is spawned so it keeps running after a timeout; only the
/// wait is abandoned. A fired deadline yields TIMEOUT_ERROR.
pub async fn with_timeout<T, Fut>(operation: Fut, timeout_ms: u64) -> Result<T, WebSearchError>
where
    T: Send + 'static,
    Fut: Future<Output = Result<T, WebSearchError>> + Send + 'static,
{
    let handle = tokio::spawn(operation);
    match tokio::time::timeout(Duration::from_millis(timeout_ms), handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(WebSearchError::ApiError {
            message: format!("Operation task failed: {}", join_err),
            status: None,
            hint: None,
            details: None,
        }),
        Err(_) => Err(WebSearchError::TimeoutError { timeout_ms }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    #[tokio::test]
    async fn test_retry_succeeds_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let result = with_retry(
            move || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, WebSearchError>(42)
                }
            },
            2,
            Duration::from_millis(1),
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_after_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let result = with_retry(
            move || {
                let calls = calls_clone.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(WebSearchError::NetworkError {
                            message: "transient".to_string(),
                        })
                    } else {
                        Ok(7)
                    }
                }
            },
            2,
            Duration::from_millis(1),
        )
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_returns_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let result: Result<(), _> = with_retry(
            move || {
                let calls = calls_clone.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    Err(WebSearchError::NetworkError {
                        message: format!("failure {}", n),
                    })
                }
            },
            2,
            Duration::from_millis(1),
        )
        .await;
        // max_retries + 1 attempts, last error surfaced unchanged
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let err = result.unwrap_err();
        assert_eq!(err.code(), "NETWORK_ERROR");
        assert!(err.to_string().contains("failure 2"));
    }

    #[tokio::test]
    async fn test_timeout_fires_before_slow_operation() {
        let completed = Arc::new(AtomicBool::new(false));
        let completed_clone = completed.clone();

        let start = Instant::now();
        let result = with_timeout(
            async move {
                tokio::time::sleep(Duration::from_millis(500)).await;
                completed_clone.store(true, Ordering::SeqCst);
                Ok::<_, WebSearchError>("late")
            },
            50,
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.code(), "TIMEOUT_ERROR");
        assert!(start.elapsed() < Duration::from_millis(400));

        // The spawned operation still runs to completion; its value is
        // simply never observed.
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(completed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_timeout_passes_through_fast_result() {
        let result = with_timeout(
            async move { Ok::<_, WebSearchError>("fast") },
            1000,
        )
        .await;
        assert_eq!(result.unwrap(), "fast");
    }

    #[tokio::test]
    async fn test_timeout_passes_through_fast_error() {
        let result: Result<(), _> = with_timeout(
            async move {
                Err(WebSearchError::QuotaExceeded {
                    message: "monthly quota".to_string(),
                })
            },
            1000,
        )
        .await;
        assert_eq!(result.unwrap_err().code(), "QUOTA_EXCEEDED");
    }
}
