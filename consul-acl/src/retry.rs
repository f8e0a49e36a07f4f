//! Bounded retry for agent calls.
//!
//! The agent is a local, low-latency endpoint, so failed attempts are
//! retried immediately: there is no backoff and no jitter. The only knob is
//! the attempt budget, which comes from each desired token.
//!
//! # Example
//!
//! ```rust,no_run
//! use consul_acl::retry::{with_retry_if, RetryConfig};
//!
//! #[derive(Debug)]
//! enum CallError {
//!     Transient,
//!     Permanent,
//! }
//!
//! async fn example() -> Result<(), CallError> {
//!     let config = RetryConfig::new(3);
//!
//!     with_retry_if(
//!         &config,
//!         || async { Err(CallError::Transient) },
//!         |err| matches!(err, CallError::Transient),
//!     )
//!     .await
//! }
//! ```

use serde::{Deserialize, Serialize};

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl RetryConfig {
    /// Create a configuration with the given attempt budget.
    ///
    /// A budget of zero is clamped to a single attempt; callers that need
    /// to reject it do so while validating their input.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Create a configuration that never retries.
    pub fn no_retry() -> Self {
        Self { max_attempts: 1 }
    }
}

/// Execute a function with retries.
///
/// The function is called up to `max_attempts` times; every error is
/// treated as transient.
///
/// # Returns
///
/// The first successful result, or the last error if every attempt fails
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Debug,
{
    with_retry_if(config, f, |_| true).await
}

/// Execute a function with retries and a predicate for retryable errors.
///
/// The function is called up to `max_attempts` times. Errors for which
/// `is_retryable` returns `false` are returned immediately; otherwise the
/// last error is returned once the budget is spent.
///
/// # Returns
///
/// The first successful result, or the error that ended the loop
pub async fn with_retry_if<F, Fut, T, E, P>(
    config: &RetryConfig,
    mut f: F,
    mut is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Debug,
    P: FnMut(&E) -> bool,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match f().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if !is_retryable(&e) => {
                tracing::debug!(
                    error = ?e,
                    "Error is not retryable, returning immediately"
                );
                return Err(e);
            }
            Err(e) if attempt >= max_attempts => {
                tracing::error!(
                    attempts = attempt,
                    error = ?e,
                    "All retry attempts exhausted"
                );
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(
                    attempt = attempt,
                    max_attempts = max_attempts,
                    error = ?e,
                    "Attempt failed, retrying"
                );
            }
        }
    }
}
