//! Backoff policy for rate-limited generative API calls.
//!
//! Pure functions only: classification of an error as retryable, and the
//! delay for a given attempt. The retry loop itself lives in
//! [`retry`](crate::ai::retry).

use std::time::Duration;

use crate::error::AiError;

/// First retry delay.
pub const BASE_DELAY_MS: u64 = 5_000;

/// Growth factor between consecutive delays.
pub const MULTIPLIER: f64 = 1.5;

/// Maximum number of retries after the initial call.
pub const MAX_ATTEMPTS: u32 = 5;

/// Whether an error is a rate-limit signal worth retrying.
///
/// Missing credentials and other terminal failures are never retried.
pub fn should_retry(err: &AiError) -> bool {
    match err {
        AiError::RateLimited(_) => true,
        // Some gateways bury the quota signal in an opaque error body.
        AiError::Remote(message) => {
            message.contains("429")
                || message.contains("RESOURCE_EXHAUSTED")
                || message.contains("quota")
        }
        _ => false,
    }
}

/// Delay before retry number `attempt` (0-based).
///
/// Exponential: 5000ms, 7500ms, 11250ms, 16875ms, 25312ms.
pub fn delay(attempt: u32) -> Duration {
    let millis = BASE_DELAY_MS as f64 * MULTIPLIER.powi(attempt as i32);
    Duration::from_millis(millis as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_follows_exact_formula() {
        for attempt in 0..MAX_ATTEMPTS {
            let expected = (5000.0 * 1.5f64.powi(attempt as i32)) as u64;
            assert_eq!(delay(attempt), Duration::from_millis(expected));
        }
    }

    #[test]
    fn test_delay_schedule() {
        let millis: Vec<u64> = (0..MAX_ATTEMPTS)
            .map(|a| delay(a).as_millis() as u64)
            .collect();
        assert_eq!(millis, vec![5000, 7500, 11250, 16875, 25312]);
    }

    #[test]
    fn test_rate_limited_is_retryable() {
        assert!(should_retry(&AiError::RateLimited("HTTP 429".into())));
    }

    #[test]
    fn test_quota_markers_in_remote_errors_are_retryable() {
        assert!(should_retry(&AiError::Remote(
            "RESOURCE_EXHAUSTED: daily limit".into()
        )));
        assert!(should_retry(&AiError::Remote("quota exceeded".into())));
        assert!(should_retry(&AiError::Remote("status 429".into())));
    }

    #[test]
    fn test_terminal_errors_are_not_retryable() {
        assert!(!should_retry(&AiError::NotConfigured));
        assert!(!should_retry(&AiError::Remote("connection refused".into())));
        assert!(!should_retry(&AiError::InvalidResponse("empty body".into())));
        assert!(!should_retry(&AiError::Cancelled));
        assert!(!should_retry(&AiError::Exhausted { attempts: 5 }));
    }
}
