//! Decorator-based retry wrapper (component A).
//!
//! A higher-order function over a fallible async operation and the domain's
//! own [`ErrorKind::retryable`] classification; it never inspects a concrete
//! error type or a call stack.

use std::time::Duration;

use forgecast_domain::{ErrorKind, PipelineError, PipelineResult};
use forgecast_telemetry::Metrics;
use tracing::warn;

/// Default attempt budget for the transport retry wrapper.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
/// Cap on the exponential backoff delay between attempts.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Retry `op` up to `max_attempts` times with exponential backoff `2^attempt`
/// seconds, capped at [`MAX_BACKOFF`]. A `RateLimited` error's `retry_after`
/// (when present) is honored by waiting `max(2^attempt, retry_after)`.
///
/// Non-retryable errors (per [`ErrorKind::retryable`]) are returned
/// immediately without consuming further attempts.
pub async fn retry_with_backoff<F, Fut, T>(
    key: &str,
    max_attempts: u32,
    metrics: Option<&Metrics>,
    mut op: F,
) -> PipelineResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = PipelineResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let kind = err.kind();
                if !kind.retryable() || attempt + 1 >= max_attempts {
                    return Err(err);
                }
                let delay = backoff_delay(attempt, &err);
                warn!(key, attempt, ?delay, kind = kind.as_str(), "retrying after failure");
                if let Some(metrics) = metrics {
                    metrics.record_retry(key);
                }
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

fn backoff_delay(attempt: u32, err: &PipelineError) -> Duration {
    let exponential = Duration::from_secs(1u64 << attempt.min(5)).min(MAX_BACKOFF);
    if let PipelineError::RateLimited { retry_after, .. } = err {
        if let Some(retry_after) = retry_after {
            return (*retry_after).max(exponential);
        }
    }
    exponential
}

/// Classify a raw HTTP status code into the taxonomy, for adapters that sit
/// on top of `reqwest` and need to turn a response into a [`PipelineError`].
#[must_use]
pub fn classify_http_status(status: u16, operation: &'static str) -> Option<ErrorKind> {
    match status {
        429 => Some(ErrorKind::RateLimited),
        502 | 503 | 504 => Some(ErrorKind::NetworkTransient),
        408 => Some(ErrorKind::NetworkTransient),
        401 | 403 => Some(ErrorKind::AuthRejected),
        400..=499 => Some(ErrorKind::TrackerPermanent),
        _ => {
            let _ = operation;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn retries_transient_errors_until_success() {
        let attempts = AtomicU32::new(0);
        let result: PipelineResult<u32> = retry_with_backoff("tmdb", 5, None, |attempt| {
            let attempts = &attempts;
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                if attempt < 2 {
                    Err(PipelineError::NetworkTransient {
                        operation: "get_movie",
                        source: Box::new(std::io::Error::other("connect refused")),
                    })
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn terminal_errors_are_not_retried() {
        let attempts = AtomicU32::new(0);
        let result: PipelineResult<u32> = retry_with_backoff("tracker/demo/upload", 5, None, |_| {
            let attempts = &attempts;
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(PipelineError::ValidationError {
                    field: "tags".to_string(),
                    reason: "required".to_string(),
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_waits_at_least_retry_after() {
        let start = tokio::time::Instant::now();
        let attempts = AtomicU32::new(0);
        let _: PipelineResult<u32> = retry_with_backoff("tmdb", 3, None, |attempt| {
            let attempts = &attempts;
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                if attempt == 0 {
                    Err(PipelineError::RateLimited {
                        operation: "get_movie",
                        retry_after: Some(Duration::from_secs(10)),
                    })
                } else {
                    Ok(1)
                }
            }
        })
        .await;
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[test]
    fn classify_http_status_matches_taxonomy() {
        assert_eq!(classify_http_status(429, "upload"), Some(ErrorKind::RateLimited));
        assert_eq!(classify_http_status(503, "upload"), Some(ErrorKind::NetworkTransient));
        assert_eq!(classify_http_status(401, "upload"), Some(ErrorKind::AuthRejected));
        assert_eq!(classify_http_status(422, "upload"), Some(ErrorKind::TrackerPermanent));
        assert_eq!(classify_http_status(200, "upload"), None);
    }
}
