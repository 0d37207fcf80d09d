//! Retry and timeout policy for individual transfer attempts.
//!
//! One generic policy shared by metadata probes and data-segment fetches,
//! parameterized per call site. Each attempt is raced against a timer; a
//! fired timer counts as a failed attempt and is retried like any other
//! failure. Retries are unconditional - no backoff, no error-type
//! filtering - up to `max_retries` additional tries beyond the first.
//! After the budget is exhausted, the last failure is re-raised.

use std::future::Future;
use std::time::Duration;

use crate::error::CacheError;
use crate::types::SegmentRetrySettings;

/// Run `attempt` under the retry/timeout policy in `settings`.
///
/// `operation` names the call site in timeout errors and retry logs.
pub async fn with_retry<T, F, Fut>(
    operation: &str,
    settings: &SegmentRetrySettings,
    mut attempt: F,
) -> Result<T, CacheError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CacheError>>,
{
    let attempt_timeout: Duration = Duration::from_millis(settings.attempt_timeout_ms);
    let mut failures: u32 = 0;

    loop {
        let failure: CacheError = match tokio::time::timeout(attempt_timeout, attempt()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => err,
            Err(_elapsed) => CacheError::Timeout {
                operation: operation.to_string(),
                timeout_ms: settings.attempt_timeout_ms,
            },
        };

        failures += 1;
        if failures > settings.max_retries {
            return Err(failure);
        }
        tracing::debug!(
            operation,
            attempt = failures,
            max_retries = settings.max_retries,
            error = %failure,
            "attempt failed, retrying"
        );
    }
}
