//! In-adapter retry for transient network errors and 5xx only. `RateLimit`
//! is never retried here — it goes straight back to the pipeline so the
//! next candidate gets a turn instead of hammering an already-throttled
//! upstream.

use std::time::Duration;

use crate::error::AdapterError;

const MAX_ATTEMPTS: u32 = 3;
const BASE_DELAY_MS: u64 = 1_000;
const BACKOFF_FACTOR: u64 = 2;

pub async fn retry_transient<F, Fut, T>(mut attempt: F) -> Result<T, AdapterError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, AdapterError>>,
{
    let mut delay_ms = BASE_DELAY_MS;
    let mut last_err = None;

    for attempt_no in 1..=MAX_ATTEMPTS {
        match attempt().await {
            Ok(v) => return Ok(v),
            Err(e @ AdapterError::Provider(_)) => {
                last_err = Some(e);
                if attempt_no < MAX_ATTEMPTS {
                    tracing::warn!(attempt_no, delay_ms, "transient upstream error, retrying");
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    delay_ms *= BACKOFF_FACTOR;
                }
            },
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or_else(|| AdapterError::Provider("exhausted retries".to_string())))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn retries_provider_errors_up_to_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), AdapterError> = retry_transient(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AdapterError::Provider("boom".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_rate_limit() {
        let calls = AtomicU32::new(0);
        let result: Result<(), AdapterError> = retry_transient(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AdapterError::RateLimit("slow down".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let result = retry_transient(|| async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err(AdapterError::Provider("flaky".into()))
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }
}
