//! Bounded retry with exponential backoff.
//!
//! The retry loop itself is agnostic of what failed: it runs an operation up
//! to `max_retries + 1` times and hands back the last error untouched. Callers
//! that know some failures are terminal (a 404 will stay a 404) pass a
//! predicate to [`retry_if`] so those short-circuit after one attempt.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Default retry configuration
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1000;
pub const DEFAULT_MAX_DELAY_MS: u64 = 10_000;

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first call
    pub max_retries: u32,
    /// Initial delay between retries (doubles each attempt)
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with custom settings
    pub fn new(max_retries: u32, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(initial_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
        }
    }

    /// A config that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Total number of attempts this config allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Calculate the delay to wait after the given (0-based) failed attempt.
    ///
    /// `min(initial_delay * 2^attempt, max_delay)`. If `max_delay` is below
    /// `initial_delay` every delay is clamped to `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Result of a single attempt inside the retry loop.
#[derive(Debug)]
pub enum AttemptOutcome<T, E> {
    Success(T),
    Failure { error: E, attempt: u32 },
}

impl<T, E> AttemptOutcome<T, E> {
    /// Tag a raw result with the (0-based) attempt index that produced it.
    pub fn from_result(result: Result<T, E>, attempt: u32) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(error) => Self::Failure { error, attempt },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Execute an async operation, retrying every failure.
///
/// # Returns
/// The first successful result, or the error from the final attempt.
///
/// # Example
/// ```ignore
/// let body = with_retry(&RetryConfig::default(), || async {
///     client.get(url).send().await?.text().await
/// })
/// .await?;
/// ```
pub async fn with_retry<T, E, F, Fut>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_if(config, operation, |_| true).await
}

/// Execute an async operation, retrying failures for which `should_retry`
/// returns `true`.
///
/// A failure rejected by `should_retry` is returned immediately without
/// sleeping. Every failed attempt is logged with its 1-based attempt number.
///
/// # Errors
/// Returns the last error observed, unchanged.
pub async fn retry_if<T, E, F, Fut, P>(
    config: &RetryConfig,
    mut operation: F,
    mut should_retry: P,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: FnMut(&E) -> bool,
{
    let mut attempt = 0u32;

    loop {
        match AttemptOutcome::from_result(operation().await, attempt) {
            AttemptOutcome::Success(value) => {
                if attempt > 0 {
                    tracing::info!("Operation succeeded after {} retries", attempt);
                }
                return Ok(value);
            }
            AttemptOutcome::Failure { error, attempt } => {
                tracing::warn!(
                    attempt = attempt + 1,
                    max_attempts = config.max_attempts(),
                    error = %error,
                    "Attempt failed"
                );

                if !should_retry(&error) {
                    tracing::debug!("Non-retryable error: {}", error);
                    return Err(error);
                }

                if attempt >= config.max_retries {
                    tracing::error!("All {} attempts exhausted", config.max_attempts());
                    return Err(error);
                }

                let delay = config.delay_for_attempt(attempt);
                tracing::info!(
                    "Retry attempt {} of {}, waiting {:?}",
                    attempt + 1,
                    config.max_retries,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }

        attempt += 1;
    }
}
