//! Bounded retry with exponential backoff and jitter for IdP calls.
//!
//! Every outbound call gets the same small, fixed budget. Only failures that
//! `IdpError::is_retryable` accepts are retried; a 4xx answer returns at once.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{error, warn};

use crate::services::idp::error::IdpError;

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Retries after the first attempt (0 = single attempt)
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or the
/// retry budget is spent. The last error is returned unchanged.
pub async fn retry_with_backoff<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    operation: F,
) -> Result<T, IdpError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, IdpError>>,
{
    retry_with_backoff_if(config, operation_name, IdpError::is_retryable, operation).await
}

/// Like [`retry_with_backoff`], but only errors accepted by `should_retry`
/// get another attempt.
pub async fn retry_with_backoff_if<F, Fut, T, P>(
    config: &RetryConfig,
    operation_name: &str,
    should_retry: P,
    mut operation: F,
) -> Result<T, IdpError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, IdpError>>,
    P: Fn(&IdpError) -> bool,
{
    let mut retries = 0u32;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !should_retry(&e) => return Err(e),
            Err(e) => {
                if retries >= config.max_retries {
                    error!(
                        operation = %operation_name,
                        attempts = retries + 1,
                        error = %e,
                        "IdP call failed after retries"
                    );
                    return Err(e);
                }
                retries += 1;

                // Add jitter: 0.5x to 1.5x of the delay
                let jitter = rand::thread_rng().gen_range(0.5..1.5);
                let jittered_delay = Duration::from_secs_f64(delay.as_secs_f64() * jitter);

                warn!(
                    operation = %operation_name,
                    retry = retries,
                    error = %e,
                    delay_ms = jittered_delay.as_millis() as u64,
                    "IdP call failed, retrying"
                );

                tokio::time::sleep(jittered_delay).await;

                delay = Duration::from_secs_f64(
                    (delay.as_secs_f64() * config.backoff_multiplier)
                        .min(config.max_delay.as_secs_f64()),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            backoff_multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn retries_server_errors_until_budget_is_spent() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), IdpError> = retry_with_backoff(&fast(2), "test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(IdpError::status("test", 503, "unavailable"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), IdpError> = retry_with_backoff(&fast(2), "test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(IdpError::status("test", 401, "unauthorized"))
        })
        .await;

        assert_eq!(result.unwrap_err().status_code(), Some(401));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovers_after_a_transient_failure() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result = retry_with_backoff(&fast(2), "test", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(IdpError::status("test", 502, "bad gateway"))
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn predicate_narrows_what_is_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), IdpError> = retry_with_backoff_if(
            &fast(2),
            "test",
            IdpError::is_connect,
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(IdpError::status("test", 503, "unavailable"))
            },
        )
        .await;

        assert_eq!(result.unwrap_err().status_code(), Some(503));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
