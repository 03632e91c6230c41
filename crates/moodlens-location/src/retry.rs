use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::{LocationError, LocationResult};

/// Run `operation`, retrying retryable failures with exponential backoff
/// (500 ms, 1 s, 2 s, ...).
pub(crate) async fn with_retry<F, Fut, T>(max_retries: u32, operation: F) -> LocationResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = LocationResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                warn!(
                    "Location request failed (attempt {}), retrying in {:?}: {}",
                    attempt + 1,
                    delay,
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retries_transient_errors() {
        let calls = AtomicU32::new(0);
        let result = with_retry(1, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 1 {
                Err(LocationError::ServiceUnavailable("busy".into()))
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(tokio_test::assert_ok!(result), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: LocationResult<()> = with_retry(3, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(LocationError::RequestFailed("403".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
