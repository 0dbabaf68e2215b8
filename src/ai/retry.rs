//! Retrying executor for idempotent generative API calls.
//!
//! Wraps a single remote call in a bounded retry loop: rate-limited
//! failures back off and retry, everything else propagates immediately.
//! Waits are cooperative and observe a cancellation token, so a caller
//! navigating away aborts before the next request is issued.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::ai::backoff;
use crate::error::AiError;

/// Suspension point used for backoff waits and pipeline pauses.
///
/// Injected so tests can assert requested delays without real timers.
#[async_trait]
pub trait Sleep: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleep on the tokio timer.
#[derive(Debug, Default)]
pub struct TokioSleep;

#[async_trait]
impl Sleep for TokioSleep {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Executes one remote call with rate-limit retries.
///
/// Every wrapped operation must be safely re-issuable; both classification
/// and view generation are read-only requests upstream.
#[derive(Clone)]
pub struct RetryExecutor {
    sleep: Arc<dyn Sleep>,
}

impl RetryExecutor {
    pub fn new() -> Self {
        Self::with_sleep(Arc::new(TokioSleep))
    }

    pub fn with_sleep(sleep: Arc<dyn Sleep>) -> Self {
        Self { sleep }
    }

    /// Invoke `operation`, retrying rate-limited failures with exponential
    /// backoff up to [`backoff::MAX_ATTEMPTS`] retries.
    ///
    /// Terminal errors propagate on the first occurrence with zero delay.
    /// A rate-limited failure that survives the whole budget becomes
    /// [`AiError::Exhausted`]. Cancellation during a backoff wait yields
    /// [`AiError::Cancelled`] without issuing another request.
    pub async fn execute<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, AiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AiError>>,
    {
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(AiError::Cancelled);
            }

            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if backoff::should_retry(&err) => {
                    if attempt >= backoff::MAX_ATTEMPTS {
                        tracing::warn!(
                            attempts = attempt,
                            "rate limit persisted through all retries, giving up"
                        );
                        return Err(AiError::Exhausted { attempts: attempt });
                    }

                    let wait = backoff::delay(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts = backoff::MAX_ATTEMPTS,
                        delay_ms = wait.as_millis() as u64,
                        error = %err,
                        "rate limited, backing off before retry"
                    );

                    tokio::select! {
                        _ = cancel.cancelled() => return Err(AiError::Cancelled),
                        _ = self.sleep.sleep(wait) => {}
                    }

                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new()
    }
}
